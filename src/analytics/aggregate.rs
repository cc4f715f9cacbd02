use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SnapshotError;
use crate::types::Trade;

/// Summary statistics over realized (closed) trades.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    /// Fraction in `[0, 1]`, zero when there are no trades.
    #[serde(with = "rust_decimal::serde::float")]
    pub win_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub biggest_win: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub percentage_profit: Decimal,
}

/// Aggregate the closed trades in `trades`; open trades are ignored.
///
/// Sums that leave the `Decimal` range are reported instead of panicking.
pub fn aggregate(trades: &[Trade]) -> Result<AggregateStats, SnapshotError> {
    let closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();

    let total_trades = closed.len() as u64;
    let winning_trades = closed.iter().filter(|t| t.realized_profit() > Decimal::ZERO).count() as u64;
    let losing_trades = total_trades - winning_trades;

    let pnl = closed
        .iter()
        .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.realized_profit()))
        .ok_or_else(|| SnapshotError::overflow("total profit"))?;
    let biggest_win = closed
        .iter()
        .map(|t| t.realized_profit())
        .fold(Decimal::ZERO, Decimal::max);
    let total_invested = closed
        .iter()
        .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.invested()?))
        .ok_or_else(|| SnapshotError::overflow("total invested"))?;

    let win_rate = if total_trades == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(winning_trades) / Decimal::from(total_trades)
    };

    let percentage_profit = if total_invested.is_zero() {
        Decimal::ZERO
    } else {
        pnl.checked_div(total_invested)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| SnapshotError::overflow("percentage profit"))?
    };

    Ok(AggregateStats {
        total_trades,
        winning_trades,
        losing_trades,
        win_rate,
        pnl,
        biggest_win,
        percentage_profit,
    })
}
