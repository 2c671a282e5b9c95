//! The momentum rebalancing engine.
//!
//! Owns every per-security map and funnels each finished bar through:
//! window update → day-boundary check → rank → select → diff.
//! A rebalance runs to completion before the next bar is applied.

mod actor;

pub use actor::{spawn_engine, EngineHandle};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::market::{DailyBar, Security};
use crate::portfolio::{PortfolioProvider, PortfolioSnapshot};
use crate::strategy::{
    LatestPriceCache, MomentumRanker, OrderPlan, PortfolioRebalancer, PriceWindowStore,
    QuintileSelection, RebalanceScheduler, TargetWeights,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of a completed rebalance.
#[derive(Debug, Clone)]
pub struct RebalanceReport {
    pub date: NaiveDate,
    /// Equity the targets were sized against
    pub equity: Decimal,
    pub scores: HashMap<Security, Decimal>,
    pub selection: QuintileSelection,
    pub weights: TargetWeights,
    pub plan: OrderPlan,
}

/// What happened when a rebalance fired.
#[derive(Debug, Clone)]
pub enum RebalanceOutcome {
    /// Too few full windows; nothing was traded.
    Skipped {
        date: NaiveDate,
        scored: usize,
        required: usize,
    },
    Completed(RebalanceReport),
}

impl RebalanceOutcome {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Skipped { date, .. } => *date,
            Self::Completed(report) => report.date,
        }
    }

    pub fn report(&self) -> Option<&RebalanceReport> {
        match self {
            Self::Skipped { .. } => None,
            Self::Completed(report) => Some(report),
        }
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub bars_processed: u64,
    pub bars_ignored: u64,
    pub rebalances: u64,
    pub rebalances_skipped: u64,
    pub intents_emitted: u64,
}

/// Single-writer owner of windows, prices, and scheduler state.
#[derive(Debug)]
pub struct MomentumEngine {
    store: PriceWindowStore,
    prices: LatestPriceCache,
    scheduler: RebalanceScheduler,
    ranker: MomentumRanker,
    rebalancer: PortfolioRebalancer,
    stats: EngineStats,
}

impl MomentumEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let universe = config.securities();
        let m = &config.momentum;
        let r = &config.rebalance;

        info!(
            securities = universe.len(),
            lookback = m.lookback_period,
            skip = m.skip_period,
            quintiles = m.quintile_count,
            formula = ?m.formula,
            schedule = ?r.schedule,
            min_notional = %r.minimum_trade_notional,
            "Momentum engine initialized"
        );

        Ok(Self {
            store: PriceWindowStore::new(&universe, m.lookback_period),
            prices: LatestPriceCache::new(),
            scheduler: RebalanceScheduler::new(r.schedule),
            ranker: MomentumRanker::new(m.lookback_period, m.skip_period, m.quintile_count, m.formula),
            rebalancer: PortfolioRebalancer::new(
                m.quintile_count,
                r.minimum_trade_notional,
                r.quantity_step,
            ),
            stats: EngineStats::default(),
        })
    }

    /// Apply one bar. Returns the rebalance outcome if this bar opened a
    /// rebalance day.
    ///
    /// Bars for securities outside the universe are rejected even when
    /// unfinished; unfinished bars are otherwise ignored.
    pub fn on_bar(
        &mut self,
        bar: &DailyBar,
        portfolio: &dyn PortfolioProvider,
    ) -> Result<Option<RebalanceOutcome>> {
        if !self.store.contains(&bar.security) {
            return Err(EngineError::UnknownSecurity(bar.security.to_string()));
        }
        if !bar.is_finished {
            self.stats.bars_ignored += 1;
            return Ok(None);
        }

        self.prices.update(&bar.security, bar.close);
        self.store.add(&bar.security, bar.close)?;
        self.stats.bars_processed += 1;

        debug!(security = %bar.security, close = %bar.close, date = %bar.date, "Bar applied");

        match self.scheduler.observe(bar.date) {
            Some(trigger) => Ok(Some(self.rebalance(trigger.date, portfolio))),
            None => Ok(None),
        }
    }

    /// Rank, select, and diff against a fresh portfolio snapshot.
    pub fn rebalance(&mut self, date: NaiveDate, portfolio: &dyn PortfolioProvider) -> RebalanceOutcome {
        let Some(ranking) = self.ranker.rank(&self.store) else {
            let scored = self.ranker.score_all(&self.store).len();
            let required = self.ranker.min_scored();
            info!(%date, scored, required, "Insufficient data, rebalance skipped");
            self.stats.rebalances_skipped += 1;
            return RebalanceOutcome::Skipped { date, scored, required };
        };

        let Some(selection) = self.rebalancer.select(&ranking) else {
            let required = self.ranker.min_scored();
            info!(%date, scored = ranking.len(), required, "Insufficient data, rebalance skipped");
            self.stats.rebalances_skipped += 1;
            return RebalanceOutcome::Skipped { date, scored: ranking.len(), required };
        };

        let weights = TargetWeights::equal_weight(&selection);
        let snapshot: PortfolioSnapshot = portfolio.snapshot();
        let plan = self.rebalancer.plan_orders(&weights, &snapshot, &self.prices);

        info!(
            %date,
            scored = ranking.len(),
            long = selection.long.len(),
            short = selection.short.len(),
            equity = %snapshot.equity,
            orders = plan.orders.len(),
            filtered = plan.filtered,
            unpriced = plan.unpriced.len(),
            "Rebalance computed"
        );

        self.stats.rebalances += 1;
        self.stats.intents_emitted += plan.orders.len() as u64;

        RebalanceOutcome::Completed(RebalanceReport {
            date,
            equity: snapshot.equity,
            scores: ranking.scores().clone(),
            selection,
            weights,
            plan,
        })
    }

    /// Clear windows, prices, and scheduler state. The universe is kept.
    pub fn reset(&mut self) {
        self.store.clear();
        self.prices.clear();
        self.scheduler.reset();
        self.stats = EngineStats::default();
        info!("Engine state reset");
    }

    pub fn store(&self) -> &PriceWindowStore {
        &self.store
    }

    pub fn latest_prices(&self) -> &LatestPriceCache {
        &self.prices
    }

    pub fn scheduler(&self) -> &RebalanceScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}
