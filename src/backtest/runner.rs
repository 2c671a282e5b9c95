//! Historical replay through the momentum engine.
//!
//! Bars are fed in date order to a [`MomentumEngine`]; every emitted intent is
//! filled in full by a [`PaperPortfolio`], and one equity point is recorded per
//! replayed date.

use crate::backtest::metrics::{ActivityCounts, BacktestMetrics, EquityPoint};
use crate::backtest::{BarLoader, PaperPortfolio};
use crate::config::Config;
use crate::engine::{EngineStats, MomentumEngine, RebalanceOutcome};
use crate::portfolio::OrderSink;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{debug, info};

/// Complete result of a replay.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub metrics: BacktestMetrics,
    /// Empty unless `backtest.record_equity_curve` is set
    pub equity_curve: Vec<EquityPoint>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bars_processed: usize,
    /// Dates on which a rebalance completed
    pub rebalance_dates: Vec<NaiveDate>,
    pub engine_stats: EngineStats,
}

impl BacktestResult {
    /// Export equity curve to CSV.
    pub fn equity_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use std::io::Write;

        let path = path.as_ref();
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writeln!(file, "date,cash,positions_value,total_equity,drawdown,positions")?;

        for point in &self.equity_curve {
            writeln!(
                file,
                "{},{},{},{},{},{}",
                point.date.format("%Y-%m-%d"),
                point.cash,
                point.positions_value,
                point.total_equity,
                point.drawdown,
                point.position_count,
            )?;
        }

        Ok(())
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        format!(
            "{}\n\nBacktest Period: {} to {}\nBars: {}\nRebalance Dates: {}",
            self.metrics.summary(),
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.bars_processed,
            self.rebalance_dates.len(),
        )
    }
}

/// Replays a [`BarLoader`]'s data with a fixed configuration.
pub struct BacktestRunner<L: BarLoader> {
    loader: L,
    config: Config,
}

impl<L: BarLoader> BacktestRunner<L> {
    pub fn new(loader: L, config: Config) -> Self {
        Self { loader, config }
    }

    /// Replay every bar the loader holds.
    pub async fn run(&self) -> Result<BacktestResult> {
        let (start, end) = self
            .loader
            .available_range()
            .context("No data available for backtest")?;
        self.run_range(start, end).await
    }

    /// Replay bars dated within `[start, end]`.
    pub async fn run_range(&self, start: NaiveDate, end: NaiveDate) -> Result<BacktestResult> {
        info!(%start, %end, "Starting backtest");

        let bars = self.loader.load_bars(start, end)?;
        if bars.is_empty() {
            anyhow::bail!("No data available for the specified date range");
        }
        info!("Loaded {} bars", bars.len());

        let mut engine = MomentumEngine::new(&self.config)?;
        let initial_equity = self.config.backtest.initial_equity;
        let paper = PaperPortfolio::new(initial_equity);

        let mut equity_curve = Vec::new();
        let mut peak_equity = initial_equity;
        let mut current_day: Option<NaiveDate> = None;
        let mut rebalance_dates = Vec::new();

        for (i, bar) in bars.iter().enumerate() {
            if let Some(day) = current_day.filter(|day| *day != bar.date) {
                equity_curve.push(close_day(day, &paper, &mut peak_equity));
            }
            current_day = Some(bar.date);

            paper.mark(bar);

            if let Some(RebalanceOutcome::Completed(report)) = engine.on_bar(bar, &paper)? {
                for intent in &report.plan.orders {
                    paper.submit(intent).await?;
                }
                rebalance_dates.push(report.date);
                debug!(
                    date = %report.date,
                    orders = report.plan.orders.len(),
                    equity = %paper.equity(),
                    "Rebalance filled"
                );
            }

            if i % 1000 == 0 {
                debug!(
                    "Progress: {}/{} ({:.1}%), Equity: ${:.2}",
                    i,
                    bars.len(),
                    (i as f64 / bars.len() as f64) * 100.0,
                    paper.equity()
                );
            }
        }

        if let Some(day) = current_day {
            equity_curve.push(close_day(day, &paper, &mut peak_equity));
        }

        let engine_stats = engine.stats();
        let activity = ActivityCounts {
            rebalances: engine_stats.rebalances,
            rebalances_skipped: engine_stats.rebalances_skipped,
            orders: paper.fills(),
            traded_notional: paper.traded_notional(),
        };
        let metrics = BacktestMetrics::calculate(&equity_curve, initial_equity, activity);

        info!(
            total_return = %metrics.total_return,
            max_drawdown = %metrics.max_drawdown,
            rebalances = metrics.rebalances,
            orders = metrics.orders,
            "Backtest complete"
        );

        if !self.config.backtest.record_equity_curve {
            equity_curve.clear();
        }

        Ok(BacktestResult {
            metrics,
            equity_curve,
            start,
            end,
            bars_processed: bars.len(),
            rebalance_dates,
            engine_stats,
        })
    }
}

fn close_day(day: NaiveDate, paper: &PaperPortfolio, peak_equity: &mut Decimal) -> EquityPoint {
    let equity = paper.equity();
    if equity > *peak_equity {
        *peak_equity = equity;
    }
    EquityPoint::new(
        day,
        paper.cash(),
        paper.positions_value(),
        paper.position_count(),
        *peak_equity,
    )
}
