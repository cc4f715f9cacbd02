use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

/// A trade in the shape the dashboard renders, independent of which upstream
/// endpoint it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub asset: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub status: TradeStatus,
    /// Null while the trade is open.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub profit_percentage: Option<Decimal>,
    /// Null while the trade is open.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub profit_abs: Option<Decimal>,
    pub open_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub open_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub close_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    /// Realized profit, zero for open trades.
    pub fn realized_profit(&self) -> Decimal {
        self.profit_abs.unwrap_or(Decimal::ZERO)
    }

    /// Capital committed at entry, `None` on overflow.
    pub fn invested(&self) -> Option<Decimal> {
        self.amount.checked_mul(self.open_rate)
    }
}

/// One bar/area point of the trade history charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub name: String,
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit: Decimal,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cumulative_profit: Option<Decimal>,
}
