use rust_decimal::Decimal;

use crate::error::SnapshotError;
use crate::types::{ChartPoint, Trade};

/// Newest first by open date.
pub fn sort_open_trades(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.open_date.cmp(&a.open_date));
}

/// Newest first by close date.
pub fn sort_closed_trades(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.close_date.cmp(&a.close_date));
}

/// Per-trade profit series, oldest to newest.
///
/// `closed_newest_first` is the display order produced by
/// [`sort_closed_trades`].
pub fn trade_history(closed_newest_first: &[Trade]) -> Vec<ChartPoint> {
    closed_newest_first
        .iter()
        .rev()
        .enumerate()
        .map(|(index, trade)| ChartPoint {
            name: format!("Trade {}", index + 1),
            date: trade
                .close_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            profit: trade.realized_profit(),
            cumulative_profit: None,
        })
        .collect()
}

/// Running total of `points`, starting at the first point's profit.
pub fn cumulative_history(points: &[ChartPoint]) -> Result<Vec<ChartPoint>, SnapshotError> {
    let mut running = Decimal::ZERO;
    points
        .iter()
        .map(|point| {
            running = running
                .checked_add(point.profit)
                .ok_or_else(|| SnapshotError::overflow("cumulative profit"))?;
            Ok(ChartPoint {
                cumulative_profit: Some(running),
                ..point.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, TradeStatus};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn closed_on(day: u32, profit: Decimal) -> Trade {
        let date = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        Trade {
            asset: format!("PAIR{}", day),
            side: Side::Buy,
            status: TradeStatus::Closed,
            profit_percentage: Some(Decimal::ZERO),
            profit_abs: Some(profit),
            open_date: date,
            close_date: Some(date),
            open_rate: dec!(1),
            close_rate: dec!(1),
            amount: dec!(1),
        }
    }

    #[test]
    fn test_series_run_oldest_to_newest() {
        let mut trades = vec![closed_on(2, dec!(-40)), closed_on(1, dec!(100)), closed_on(3, dec!(25))];
        sort_closed_trades(&mut trades);
        assert_eq!(trades[0].asset, "PAIR3");

        let history = trade_history(&trades);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].name, "Trade 1");
        assert_eq!(history[0].date, "2024-03-01");
        assert_eq!(history[0].profit, dec!(100));
        assert_eq!(history[2].name, "Trade 3");
        assert_eq!(history[2].profit, dec!(25));
    }

    #[test]
    fn test_cumulative_is_running_sum() {
        let mut trades: Vec<Trade> = (1..=6)
            .map(|day| closed_on(day, Decimal::from(day as i64 * 7 - 20)))
            .collect();
        sort_closed_trades(&mut trades);

        let history = trade_history(&trades);
        let cumulative = cumulative_history(&history).unwrap();

        assert_eq!(cumulative[0].cumulative_profit, Some(cumulative[0].profit));
        for i in 1..cumulative.len() {
            let previous = cumulative[i - 1].cumulative_profit.unwrap();
            assert_eq!(cumulative[i].cumulative_profit, Some(previous + cumulative[i].profit));
            assert_eq!(cumulative[i].name, history[i].name);
        }
    }

    #[test]
    fn test_empty_series() {
        assert!(trade_history(&[]).is_empty());
        assert!(cumulative_history(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_open_trades_newest_first() {
        let mut trades = vec![closed_on(1, dec!(0)), closed_on(5, dec!(0)), closed_on(3, dec!(0))];
        sort_open_trades(&mut trades);
        let order: Vec<_> = trades.iter().map(|t| t.asset.as_str()).collect();
        assert_eq!(order, vec!["PAIR5", "PAIR3", "PAIR1"]);
    }
}
