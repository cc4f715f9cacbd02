use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{BotApi, Endpoint};
use crate::config::ModelsSettings;
use crate::error::UpstreamError;
use crate::types::BotModel;

/// Basic-Auth client for the ChatGPT and Gemini bot APIs.
#[derive(Debug, Clone)]
pub struct BotApiClient {
    client: Client,
    models: ModelsSettings,
}

impl BotApiClient {
    pub fn new(models: ModelsSettings, timeout: Duration) -> Result<Self, UpstreamError> {
        // Every poll must see fresh numbers.
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, models })
    }

    fn request(&self, model: BotModel, endpoint: Endpoint) -> RequestBuilder {
        let settings = self.models.get(model);
        let url = format!("{}{}", settings.base_url.trim_end_matches('/'), endpoint.path());

        let request = self.client.get(url);
        if settings.password.is_empty() {
            request
        } else {
            request.basic_auth(&settings.username, Some(&settings.password))
        }
    }
}

#[async_trait]
impl BotApi for BotApiClient {
    async fn fetch_json(&self, model: BotModel, endpoint: Endpoint) -> Result<Value, UpstreamError> {
        let response = self.request(model, endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.text().await?;
        debug!("{} {} returned {} bytes", model, endpoint, body.len());

        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    fn client_with_password(password: &str) -> BotApiClient {
        let mut models = ModelsSettings::default();
        models.gemini.base_url = "http://bot.local:8073/api/v1/".to_string();
        models.gemini.username = "user".to_string();
        models.gemini.password = password.to_string();
        BotApiClient::new(models, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_url_joins_base_and_path() {
        let client = client_with_password("");
        let request = client.request(BotModel::Gemini, Endpoint::Trades).build().unwrap();

        assert_eq!(request.url().as_str(), "http://bot.local:8073/api/v1/trades");
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_request_carries_basic_auth() {
        let client = client_with_password("pass");
        let request = client.request(BotModel::Gemini, Endpoint::Status).build().unwrap();

        assert_eq!(request.headers()[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    /// Serves a fake bot API on an ephemeral port and returns its base URL.
    async fn spawn_bot(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    fn client_for(base_url: String) -> BotApiClient {
        let mut models = ModelsSettings::default();
        models.chatgpt.base_url = base_url;
        BotApiClient::new(models, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_error_status_and_bad_json() {
        use axum::http::StatusCode;
        use axum::routing::get;

        let router = axum::Router::new()
            .route("/api/v1/status", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }))
            .route("/api/v1/trades", get(|| async { "not json" }));
        let client = client_for(spawn_bot(router).await);

        let status = client.fetch_json(BotModel::ChatGpt, Endpoint::Status).await;
        assert!(
            matches!(status, Err(UpstreamError::Status { status: 503, ref reason }) if reason == "Service Unavailable"),
            "{:?}",
            status
        );

        let trades = client.fetch_json(BotModel::ChatGpt, Endpoint::Trades).await;
        assert!(matches!(trades, Err(UpstreamError::Decode(_))), "{:?}", trades);
    }

    #[tokio::test]
    async fn test_success_returns_payload() {
        use axum::routing::get;
        use axum::Json;

        let router = axum::Router::new().route(
            "/api/v1/trades",
            get(|| async { Json(serde_json::json!({"trades": [{"pair": "BTC/USDT"}]})) }),
        );
        let client = client_for(spawn_bot(router).await);

        let payload = client.fetch_json(BotModel::ChatGpt, Endpoint::Trades).await.unwrap();
        assert_eq!(payload["trades"][0]["pair"], "BTC/USDT");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let mut models = ModelsSettings::default();
        models.chatgpt.base_url = "http://127.0.0.1:1/api/v1".to_string();
        let client = BotApiClient::new(models, Duration::from_secs(2)).unwrap();

        let result = client.fetch_json(BotModel::ChatGpt, Endpoint::Status).await;
        assert!(matches!(result, Err(UpstreamError::Transport(_))));
    }
}
