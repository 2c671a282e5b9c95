//! Simulated account used during replay.
//!
//! Fills every intent in full at the intent's sizing price and marks
//! holdings to the latest finished close.

use crate::market::{DailyBar, Security};
use crate::portfolio::{OrderIntent, OrderSink, PortfolioProvider, PortfolioSnapshot};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct PaperState {
    cash: Decimal,
    positions: HashMap<Security, Decimal>,
    marks: HashMap<Security, Decimal>,
    fills: u64,
    traded_notional: Decimal,
}

impl PaperState {
    fn positions_value(&self) -> Decimal {
        self.positions
            .iter()
            .map(|(security, qty)| {
                let mark = self.marks.get(security).copied().unwrap_or(Decimal::ZERO);
                *qty * mark
            })
            .sum()
    }
}

/// Cash plus signed positions. Shorts credit cash on entry.
#[derive(Debug, Default)]
pub struct PaperPortfolio {
    state: RwLock<PaperState>,
}

impl PaperPortfolio {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            state: RwLock::new(PaperState {
                cash: initial_cash,
                ..PaperState::default()
            }),
        }
    }

    // Poisoning is ignored: no method panics while holding the lock.
    fn read(&self) -> RwLockReadGuard<'_, PaperState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PaperState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Update the mark for a security from a finished bar.
    pub fn mark(&self, bar: &DailyBar) {
        if bar.is_finished && bar.close > Decimal::ZERO {
            self.write().marks.insert(bar.security.clone(), bar.close);
        }
    }

    /// Fill an intent in full at its sizing price.
    pub fn apply(&self, intent: &OrderIntent) {
        let mut state = self.write();

        state.cash -= intent.volume * intent.price;
        state.traded_notional += intent.notional();
        state.fills += 1;
        state.marks.entry(intent.security.clone()).or_insert(intent.price);

        let qty = state.positions.entry(intent.security.clone()).or_insert(Decimal::ZERO);
        *qty += intent.volume;
        if qty.is_zero() {
            state.positions.remove(&intent.security);
        }

        debug!(%intent, cash = %state.cash, "Paper fill");
    }

    pub fn cash(&self) -> Decimal {
        self.read().cash
    }

    pub fn position(&self, security: &Security) -> Decimal {
        self.read()
            .positions
            .get(security)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of non-flat positions.
    pub fn position_count(&self) -> usize {
        self.read().positions.len()
    }

    /// Marked value of all positions (shorts count negative).
    pub fn positions_value(&self) -> Decimal {
        self.read().positions_value()
    }

    pub fn equity(&self) -> Decimal {
        let state = self.read();
        state.cash + state.positions_value()
    }

    pub fn fills(&self) -> u64 {
        self.read().fills
    }

    pub fn traded_notional(&self) -> Decimal {
        self.read().traded_notional
    }
}

impl PortfolioProvider for PaperPortfolio {
    fn snapshot(&self) -> PortfolioSnapshot {
        let state = self.read();
        PortfolioSnapshot {
            equity: state.cash + state.positions_value(),
            positions: state.positions.clone(),
        }
    }
}

#[async_trait]
impl OrderSink for PaperPortfolio {
    async fn submit(&self, intent: &OrderIntent) -> anyhow::Result<()> {
        self.apply(intent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::IntentKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn intent(security: &str, volume: Decimal, price: Decimal) -> OrderIntent {
        OrderIntent {
            security: Security::new(security),
            volume,
            target_quantity: volume,
            price,
            kind: IntentKind::Rebalance,
        }
    }

    fn bar(security: &str, close: Decimal) -> DailyBar {
        DailyBar::finished(security, close, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
    }

    #[test]
    fn test_long_and_short_fills_keep_equity() {
        let paper = PaperPortfolio::new(dec!(1000));
        paper.apply(&intent("A", dec!(5), dec!(100)));
        paper.apply(&intent("B", dec!(-5), dec!(100)));

        assert_eq!(paper.cash(), dec!(1000));
        assert_eq!(paper.position(&Security::new("A")), dec!(5));
        assert_eq!(paper.position(&Security::new("B")), dec!(-5));
        assert_eq!(paper.equity(), dec!(1000));
        assert_eq!(paper.fills(), 2);
        assert_eq!(paper.traded_notional(), dec!(1000));
    }

    #[test]
    fn test_marking_moves_equity() {
        let paper = PaperPortfolio::new(dec!(1000));
        paper.apply(&intent("A", dec!(5), dec!(100)));
        paper.apply(&intent("B", dec!(-5), dec!(100)));

        paper.mark(&bar("A", dec!(110)));
        paper.mark(&bar("B", dec!(90)));

        // Long gains 50, short gains 50
        assert_eq!(paper.positions_value(), dec!(100));
        assert_eq!(paper.equity(), dec!(1100));
    }

    #[test]
    fn test_unfinished_bar_does_not_mark() {
        let paper = PaperPortfolio::new(dec!(1000));
        paper.apply(&intent("A", dec!(5), dec!(100)));
        paper.mark(&bar("A", dec!(200)).in_progress());
        assert_eq!(paper.equity(), dec!(1000));
    }

    #[test]
    fn test_closing_fill_removes_position() {
        let paper = PaperPortfolio::new(dec!(1000));
        paper.apply(&intent("A", dec!(5), dec!(100)));
        paper.apply(&intent("A", dec!(-5), dec!(120)));

        assert_eq!(paper.position_count(), 0);
        assert_eq!(paper.cash(), dec!(1100));
        assert!(paper.snapshot().positions.is_empty());
    }

    #[tokio::test]
    async fn test_sink_applies_intents() {
        let paper = PaperPortfolio::new(dec!(1000));
        paper.submit(&intent("A", dec!(2), dec!(50))).await.unwrap();

        let snapshot = paper.snapshot();
        assert_eq!(snapshot.equity, dec!(1000));
        assert_eq!(snapshot.quantity(&Security::new("A")), dec!(2));
    }
}
