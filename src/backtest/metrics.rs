//! Performance metrics for a replay.

use crate::utils::decimal::safe_div;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A point on the equity curve, recorded at the end of each replayed date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total_equity: Decimal,
    /// Fraction below the running peak
    pub drawdown: Decimal,
    pub position_count: usize,
}

impl EquityPoint {
    pub fn new(
        date: NaiveDate,
        cash: Decimal,
        positions_value: Decimal,
        position_count: usize,
        peak_equity: Decimal,
    ) -> Self {
        let total_equity = cash + positions_value;
        let drawdown = if peak_equity > total_equity {
            safe_div(peak_equity - total_equity, peak_equity)
        } else {
            Decimal::ZERO
        };

        Self {
            date,
            cash,
            positions_value,
            total_equity,
            drawdown,
            position_count,
        }
    }
}

/// Replay activity counters fed into [`BacktestMetrics::calculate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityCounts {
    pub rebalances: u64,
    pub rebalances_skipped: u64,
    pub orders: u64,
    pub traded_notional: Decimal,
}

/// Summary statistics for a replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // Returns
    /// Final equity minus initial equity
    pub total_return: Decimal,
    /// Total return as percentage
    pub total_return_pct: Decimal,
    pub final_equity: Decimal,

    // Risk
    /// Maximum peak-to-trough drawdown fraction
    pub max_drawdown: Decimal,

    // Activity
    pub rebalances: u64,
    pub rebalances_skipped: u64,
    pub orders: u64,
    pub traded_notional: Decimal,
    /// Traded notional over average equity
    pub turnover: Decimal,

    // Time
    pub trading_days: usize,
}

impl BacktestMetrics {
    /// Calculate metrics from the equity curve and activity counters.
    pub fn calculate(
        equity_curve: &[EquityPoint],
        initial_equity: Decimal,
        activity: ActivityCounts,
    ) -> Self {
        let Some(last) = equity_curve.last() else {
            return Self::empty(initial_equity);
        };

        let total_return = last.total_equity - initial_equity;
        let total_return_pct = safe_div(total_return, initial_equity) * dec!(100);

        let equity_sum: Decimal = equity_curve.iter().map(|p| p.total_equity).sum();
        let average_equity = safe_div(equity_sum, Decimal::from(equity_curve.len()));

        Self {
            total_return,
            total_return_pct,
            final_equity: last.total_equity,
            max_drawdown: calculate_max_drawdown(equity_curve, initial_equity),
            rebalances: activity.rebalances,
            rebalances_skipped: activity.rebalances_skipped,
            orders: activity.orders,
            traded_notional: activity.traded_notional,
            turnover: safe_div(activity.traded_notional, average_equity),
            trading_days: equity_curve.len(),
        }
    }

    /// Metrics for a replay with no recorded dates.
    pub fn empty(initial_equity: Decimal) -> Self {
        Self {
            total_return: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            final_equity: initial_equity,
            max_drawdown: Decimal::ZERO,
            rebalances: 0,
            rebalances_skipped: 0,
            orders: 0,
            traded_notional: Decimal::ZERO,
            turnover: Decimal::ZERO,
            trading_days: 0,
        }
    }

    /// Format metrics as a summary string.
    pub fn summary(&self) -> String {
        format!(
            r#"═══════════════════════════════════════════════
BACKTEST RESULTS ({} trading days)
═══════════════════════════════════════════════
RETURNS
  Total Return:      ${:.2} ({:.2}%)
  Final Equity:      ${:.2}

RISK
  Max Drawdown:      {:.2}%

ACTIVITY
  Rebalances:        {} ({} skipped)
  Orders:            {}
  Traded Notional:   ${:.2}
  Turnover:          {:.2}x
═══════════════════════════════════════════════"#,
            self.trading_days,
            self.total_return,
            self.total_return_pct,
            self.final_equity,
            self.max_drawdown * dec!(100),
            self.rebalances,
            self.rebalances_skipped,
            self.orders,
            self.traded_notional,
            self.turnover,
        )
    }
}

/// Maximum drawdown, with the initial equity as the starting peak.
fn calculate_max_drawdown(equity_curve: &[EquityPoint], initial_equity: Decimal) -> Decimal {
    let mut peak = initial_equity;
    let mut max_dd = Decimal::ZERO;

    for point in equity_curve {
        if point.total_equity > peak {
            peak = point.total_equity;
        } else {
            let dd = safe_div(peak - point.total_equity, peak);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn point(day: u32, equity: Decimal, peak: Decimal) -> EquityPoint {
        EquityPoint::new(d(day), equity, Decimal::ZERO, 0, peak)
    }

    #[test]
    fn test_equity_point_drawdown() {
        let point = EquityPoint::new(d(1), dec!(9000), dec!(500), 2, dec!(10000));

        assert_eq!(point.total_equity, dec!(9500));
        assert_eq!(point.drawdown, dec!(0.05));
    }

    #[test]
    fn test_new_high_has_no_drawdown() {
        let point = point(1, dec!(10500), dec!(10000));
        assert_eq!(point.drawdown, Decimal::ZERO);
    }

    #[test]
    fn test_max_drawdown_calculation() {
        let curve = vec![
            point(1, dec!(10000), dec!(10000)),
            point(2, dec!(10500), dec!(10500)),
            point(3, dec!(9450), dec!(10500)),
            point(4, dec!(11000), dec!(11000)),
        ];

        // 10500 -> 9450
        assert_eq!(calculate_max_drawdown(&curve, dec!(10000)), dec!(0.1));
    }

    #[test]
    fn test_calculate() {
        let curve = vec![
            point(1, dec!(10000), dec!(10000)),
            point(2, dec!(9000), dec!(10000)),
            point(3, dec!(11000), dec!(11000)),
        ];
        let activity = ActivityCounts {
            rebalances: 1,
            rebalances_skipped: 2,
            orders: 4,
            traded_notional: dec!(20000),
        };

        let metrics = BacktestMetrics::calculate(&curve, dec!(10000), activity);

        assert_eq!(metrics.total_return, dec!(1000));
        assert_eq!(metrics.total_return_pct, dec!(10));
        assert_eq!(metrics.final_equity, dec!(11000));
        assert_eq!(metrics.max_drawdown, dec!(0.1));
        assert_eq!(metrics.turnover, dec!(2));
        assert_eq!(metrics.trading_days, 3);
        assert_eq!(metrics.orders, 4);
    }

    #[test]
    fn test_empty_curve() {
        let metrics = BacktestMetrics::calculate(&[], dec!(10000), ActivityCounts::default());
        assert_eq!(metrics.final_equity, dec!(10000));
        assert_eq!(metrics.total_return, Decimal::ZERO);
        assert_eq!(metrics.trading_days, 0);
    }

    #[test]
    fn test_metrics_summary() {
        let activity = ActivityCounts {
            rebalances: 3,
            ..ActivityCounts::default()
        };
        let curve = vec![point(1, dec!(10500), dec!(10500))];
        let summary = BacktestMetrics::calculate(&curve, dec!(10000), activity).summary();

        assert!(summary.contains("500.00"));
        assert!(summary.contains("Max Drawdown"));
        assert!(summary.contains("Rebalances:        3"));
    }
}
