use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::analytics::fetch_snapshot;
use crate::error::ForecastError;
use crate::forecast::PredictProfitInput;
use crate::types::BotModel;

const RECENT_NOTIFICATIONS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct TradingDataQuery {
    pub model: Option<String>,
}

pub async fn get_trading_data(
    State(state): State<AppState>,
    Query(query): Query<TradingDataQuery>,
) -> impl IntoResponse {
    let model = match query.model.as_deref().map(str::parse::<BotModel>) {
        Some(Ok(model)) => model,
        _ => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid model specified"}))).into_response();
        }
    };

    let settings = state.settings.models.get(model);
    match fetch_snapshot(state.api.as_ref(), model, settings).await {
        Ok(snapshot) => {
            state
                .notifications
                .observe(model, snapshot.stats.total_trades)
                .await;
            Json(snapshot).into_response()
        }
        Err(e) => {
            error!("API_ERROR ({}): {}", model, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": format!("Failed to fetch data from {} API. Check server logs for details.", model)
                })),
            )
                .into_response()
        }
    }
}

pub async fn post_predict_profit(
    State(state): State<AppState>,
    Json(input): Json<PredictProfitInput>,
) -> impl IntoResponse {
    let Some(forecaster) = &state.forecaster else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Profit forecasting is not configured"})),
        )
            .into_response();
    };

    match forecaster.predict(&input).await {
        Ok(output) => {
            info!("Forecast for {} returned {} points", input.duration, output.prediction.len());
            Json(output).into_response()
        }
        Err(ForecastError::InvalidHistory(e)) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": e}))).into_response()
        }
        Err(e) => {
            error!("Profit forecast failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}

pub async fn get_notifications(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "count": state.notifications.unread_count().await,
        "recent": state.notifications.get_recent(RECENT_NOTIFICATIONS).await,
    }))
}

pub async fn post_clear_notifications(State(state): State<AppState>) -> impl IntoResponse {
    state.notifications.clear().await;
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
