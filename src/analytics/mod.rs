pub mod aggregate;
pub mod charts;
pub mod normalizer;

pub use aggregate::*;
pub use charts::*;
pub use normalizer::*;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{ModelApiSettings, OpenTradeSource};
use crate::error::SnapshotError;
use crate::forecast::HistoryPoint;
use crate::types::{BotModel, ChartPoint, Trade};
use crate::upstream::{BotApi, Endpoint};

/// Everything the dashboard shows for one bot, rebuilt on every poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSnapshot {
    pub model: BotModel,
    pub fetched_at: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit_ratio: Decimal,
    #[serde(flatten)]
    pub stats: AggregateStats,
    pub open_trades: Vec<Trade>,
    pub closed_trades: Vec<Trade>,
    pub trade_history_for_charts: Vec<ChartPoint>,
    pub cumulative_profit_history: Vec<ChartPoint>,
}

impl TradingSnapshot {
    /// Cumulative profit by close date, the input of the profit forecast.
    pub fn forecast_history(&self) -> Vec<HistoryPoint> {
        self.cumulative_profit_history
            .iter()
            .map(|point| HistoryPoint {
                date: point.date.clone(),
                cumulative_profit: point.cumulative_profit.unwrap_or(point.profit),
            })
            .collect()
    }
}

/// Account-level figures some bots report under `bots.status[0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotSummary {
    pub starting_balance: Option<Decimal>,
    pub profit_ratio: Decimal,
}

impl BotSummary {
    pub fn from_payload(summary: &Value) -> Self {
        let status = summary
            .pointer("/bots/status")
            .and_then(Value::as_array)
            .and_then(|items| items.first());

        match status {
            Some(status) => Self {
                starting_balance: status
                    .get("starting_balance")
                    .filter(|v| !v.is_null())
                    .map(|v| decimal_or_zero(Some(v))),
                profit_ratio: decimal_or_zero(status.get("profit_ratio")),
            },
            None => Self::default(),
        }
    }
}

/// Pure transformation of the two upstream payloads into a snapshot.
pub fn build_snapshot(
    model: BotModel,
    summary: &Value,
    trades_payload: &Value,
    source: OpenTradeSource,
    now: DateTime<Utc>,
) -> Result<TradingSnapshot, SnapshotError> {
    let NormalizedTrades { mut open, mut closed } = collect_trades(summary, trades_payload, source, now)?;
    sort_open_trades(&mut open);
    sort_closed_trades(&mut closed);

    let stats = aggregate(&closed)?;
    let trade_history_for_charts = trade_history(&closed);
    let cumulative_profit_history = cumulative_history(&trade_history_for_charts)?;

    let bot = BotSummary::from_payload(summary);
    let total_balance = bot
        .starting_balance
        .unwrap_or(Decimal::ZERO)
        .checked_add(stats.pnl)
        .ok_or_else(|| SnapshotError::overflow("total balance"))?;

    Ok(TradingSnapshot {
        model,
        fetched_at: now,
        total_balance,
        profit_ratio: bot.profit_ratio,
        stats,
        open_trades: open,
        closed_trades: closed,
        trade_history_for_charts,
        cumulative_profit_history,
    })
}

/// Fetch both endpoints concurrently and build the snapshot.
///
/// Upstream failures degrade to empty payloads so the dashboard shows "no
/// data" instead of an error; only a malformed payload is reported.
pub async fn fetch_snapshot(
    api: &dyn BotApi,
    model: BotModel,
    settings: &ModelApiSettings,
) -> Result<TradingSnapshot, SnapshotError> {
    let summary_endpoint = settings.summary_endpoint.endpoint();
    let (summary, trades) = tokio::join!(
        api.fetch_json(model, summary_endpoint),
        api.fetch_json(model, Endpoint::Trades),
    );

    let summary = summary.unwrap_or_else(|e| {
        warn!("{} {} unavailable, using empty summary: {}", model, summary_endpoint, e);
        json!({})
    });
    let trades = trades.unwrap_or_else(|e| {
        warn!("{} {} unavailable, using empty trade list: {}", model, Endpoint::Trades, e);
        json!({ "trades": [] })
    });

    let snapshot = build_snapshot(model, &summary, &trades, settings.open_trade_source, Utc::now())?;
    debug!(
        "{} snapshot: {} open, {} closed, pnl {}",
        model,
        snapshot.open_trades.len(),
        snapshot.closed_trades.len(),
        snapshot.stats.pnl
    );
    Ok(snapshot)
}
