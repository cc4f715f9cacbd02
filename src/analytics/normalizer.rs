use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::config::OpenTradeSource;
use crate::error::SnapshotError;
use crate::types::{Side, Trade, TradeStatus};

/// A trade record as served by `/trades` or the summary endpoint.
///
/// Every field is optional and loosely typed; the bots have changed field
/// types between releases and a single odd value must not drop the record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrade {
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default)]
    pub is_short: Option<Value>,
    #[serde(default)]
    pub open_date_ts: Option<Value>,
    #[serde(default)]
    pub open_date: Option<Value>,
    /// Presence decides the status: null or missing means still open.
    #[serde(default)]
    pub close_date_ts: Option<Value>,
    #[serde(default)]
    pub close_date: Option<Value>,
    #[serde(default)]
    pub profit_ratio: Option<Value>,
    #[serde(default)]
    pub profit_abs: Option<Value>,
    #[serde(default)]
    pub open_rate: Option<Value>,
    #[serde(default)]
    pub close_rate: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub orders: Option<Value>,
}

impl RawTrade {
    pub fn is_closed(&self) -> bool {
        self.close_date_ts.is_some()
    }
}

/// An order record from the summary payload's `orders` view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrder {
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default)]
    pub ft_order_side: Option<String>,
    #[serde(default)]
    pub order_timestamp: Option<Value>,
    #[serde(default)]
    pub safe_price: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub is_open: Option<Value>,
}

/// Normalized trades split by status, in upstream order.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTrades {
    pub open: Vec<Trade>,
    pub closed: Vec<Trade>,
}

pub fn normalize_trade(raw: &RawTrade, now: DateTime<Utc>) -> Result<Trade, SnapshotError> {
    let side = if is_true(raw.is_short.as_ref()) { Side::Sell } else { Side::Buy };
    let open_date = first_timestamp(&[&raw.open_date_ts, &raw.open_date]).unwrap_or(now);

    if raw.is_closed() {
        let close_date = first_timestamp(&[&raw.close_date_ts, &raw.close_date]).unwrap_or(now);
        let profit_percentage = decimal_or_zero(raw.profit_ratio.as_ref())
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| SnapshotError::overflow("profit_ratio"))?;
        Ok(Trade {
            asset: asset_name(raw.pair.as_deref()),
            side,
            status: TradeStatus::Closed,
            profit_percentage: Some(profit_percentage),
            profit_abs: Some(decimal_or_zero(raw.profit_abs.as_ref())),
            open_date,
            close_date: Some(close_date),
            open_rate: decimal_or_zero(raw.open_rate.as_ref()),
            close_rate: decimal_or_zero(raw.close_rate.as_ref()),
            amount: decimal_or_zero(raw.amount.as_ref()),
        })
    } else {
        Ok(Trade {
            asset: asset_name(raw.pair.as_deref()),
            side,
            status: TradeStatus::Open,
            profit_percentage: None,
            profit_abs: None,
            open_date,
            close_date: None,
            open_rate: decimal_or_zero(raw.open_rate.as_ref()),
            close_rate: decimal_or_zero(raw.close_rate.as_ref()),
            amount: decimal_or_zero(raw.amount.as_ref()),
        })
    }
}

/// Order records only describe open positions.
pub fn normalize_order(raw: &RawOrder, now: DateTime<Utc>) -> Trade {
    let side = match raw.ft_order_side.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("sell") => Side::Sell,
        _ => Side::Buy,
    };

    Trade {
        asset: asset_name(raw.pair.as_deref()),
        side,
        status: TradeStatus::Open,
        profit_percentage: None,
        profit_abs: None,
        open_date: first_timestamp(&[&raw.order_timestamp]).unwrap_or(now),
        close_date: None,
        open_rate: decimal_or_zero(raw.safe_price.as_ref()),
        close_rate: Decimal::ZERO,
        amount: decimal_or_zero(raw.amount.as_ref()),
    }
}

/// Normalize both payloads, taking open positions from `source`.
pub fn collect_trades(
    summary: &Value,
    trades_payload: &Value,
    source: OpenTradeSource,
    now: DateTime<Utc>,
) -> Result<NormalizedTrades, SnapshotError> {
    let history = parse_records::<RawTrade>(array_field(trades_payload, "trades")?, "trades")?;

    let mut normalized = NormalizedTrades::default();
    for raw in &history {
        let trade = normalize_trade(raw, now)?;
        if trade.is_closed() {
            normalized.closed.push(trade);
        } else if source == OpenTradeSource::Trades {
            normalized.open.push(trade);
        }
    }

    match source {
        OpenTradeSource::Trades => {}
        OpenTradeSource::StatusTrades => {
            let records = parse_records::<RawTrade>(summary_trades(summary)?, "status trades")?;
            for raw in records.iter().filter(|raw| !raw.is_closed()) {
                normalized.open.push(normalize_trade(raw, now)?);
            }
        }
        OpenTradeSource::StatusOrders => {
            let orders = summary_orders(summary)?;
            normalized.open.extend(
                orders
                    .iter()
                    .filter(|order| !is_false(order.is_open.as_ref()))
                    .map(|order| normalize_order(order, now)),
            );
        }
    }

    Ok(normalized)
}

/// `field` of an object payload as an array. Missing or null is empty; any
/// other non-array value is a shape error.
pub fn array_field<'a>(payload: &'a Value, field: &str) -> Result<&'a [Value], SnapshotError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(SnapshotError::UnexpectedShape(format!(
            "`{}` is {} instead of an array",
            field,
            type_name(other)
        ))),
    }
}

fn summary_trades(summary: &Value) -> Result<&[Value], SnapshotError> {
    match summary {
        Value::Array(items) => Ok(items),
        other => array_field(other, "trades"),
    }
}

/// Top-level `orders`, or the orders nested in each summary trade.
fn summary_orders(summary: &Value) -> Result<Vec<RawOrder>, SnapshotError> {
    let top_level = array_field(summary, "orders")?;
    if !top_level.is_empty() {
        return parse_records::<RawOrder>(top_level, "orders");
    }

    let mut orders = Vec::new();
    for parent in parse_records::<RawTrade>(summary_trades(summary)?, "status trades")? {
        let nested = match &parent.orders {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => {
                return Err(SnapshotError::UnexpectedShape(format!(
                    "nested `orders` is {} instead of an array",
                    type_name(other)
                )))
            }
        };
        for mut order in parse_records::<RawOrder>(nested, "orders")? {
            if order.pair.is_none() {
                order.pair = parent.pair.clone();
            }
            orders.push(order);
        }
    }
    Ok(orders)
}

fn parse_records<T: for<'de> Deserialize<'de>>(
    items: &[Value],
    what: &str,
) -> Result<Vec<T>, SnapshotError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(SnapshotError::UnexpectedShape(format!(
                    "{} record {} is {} instead of an object",
                    what,
                    i,
                    type_name(item)
                )));
            }
            serde_json::from_value(item.clone())
                .map_err(|e| SnapshotError::UnexpectedShape(format!("{} record {}: {}", what, i, e)))
        })
        .collect()
}

fn asset_name(pair: Option<&str>) -> String {
    match pair {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => "N/A".to_string(),
    }
}

fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn is_false(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(false)))
}

/// Numbers or numeric strings; anything else counts as zero.
pub fn decimal_or_zero(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Some(Value::String(s)) => Decimal::from_str(s.trim())
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().and_then(Decimal::from_f64)),
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}

fn first_timestamp(candidates: &[&Option<Value>]) -> Option<DateTime<Utc>> {
    candidates
        .iter()
        .find_map(|candidate| candidate.as_ref().and_then(parse_timestamp))
}

/// Epoch milliseconds (number or numeric string), RFC 3339, or
/// `YYYY-MM-DD[ HH:MM:SS[.f]]` taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(millis) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(millis).single();
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
