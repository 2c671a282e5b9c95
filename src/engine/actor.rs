//! Single-writer actor around [`MomentumEngine`].
//!
//! Bars from any number of feed tasks are serialized through one channel, so
//! window updates and the scheduler's day-transition check never race, and a
//! rebalance finishes (including intent hand-off) before the next bar applies.

use super::{EngineStats, MomentumEngine, RebalanceOutcome};
use crate::error::{EngineError, Result};
use crate::market::DailyBar;
use crate::portfolio::{OrderSink, PortfolioProvider};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

enum EngineCommand {
    Bar(DailyBar),
    Reset(oneshot::Sender<()>),
}

/// Cloneable handle used by feed tasks to push bars into the engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Queue a bar. Fails once the engine has stopped.
    pub async fn submit_bar(&self, bar: DailyBar) -> Result<()> {
        self.tx
            .send(EngineCommand::Bar(bar))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Reset engine state after every previously queued bar has been applied.
    pub async fn reset(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Reset(ack_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        ack_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on the current tokio runtime.
///
/// The task ends with the final stats once every handle is dropped, or with
/// an error on the first bar for a security outside the universe.
///
/// Intents go to the sink in plan order. The first rejected intent aborts the
/// rest of that plan; intents already accepted are not recalled, and the
/// engine keeps processing bars.
pub fn spawn_engine(
    mut engine: MomentumEngine,
    portfolio: Arc<dyn PortfolioProvider>,
    sink: Arc<dyn OrderSink>,
    buffer: usize,
) -> (EngineHandle, JoinHandle<Result<EngineStats>>) {
    let (tx, mut rx) = mpsc::channel(buffer.max(1));

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                EngineCommand::Bar(bar) => {
                    let outcome = match engine.on_bar(&bar, portfolio.as_ref()) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(error = %e, security = %bar.security, "Engine stopped");
                            return Err(e);
                        }
                    };

                    if let Some(RebalanceOutcome::Completed(report)) = outcome {
                        for (i, intent) in report.plan.orders.iter().enumerate() {
                            if let Err(e) = sink.submit(intent).await {
                                warn!(
                                    error = %e,
                                    %intent,
                                    date = %report.date,
                                    unsent = report.plan.orders.len() - i,
                                    "Order sink rejected intent, rest of plan dropped"
                                );
                                break;
                            }
                        }
                    }
                }
                EngineCommand::Reset(ack) => {
                    engine.reset();
                    let _ = ack.send(());
                }
            }
        }

        let stats = engine.stats();
        info!(?stats, "Engine channel closed");
        Ok(stats)
    });

    (EngineHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::portfolio::{ChannelOrderSink, OrderIntent, OrderSide, PortfolioSnapshot};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn engine() -> MomentumEngine {
        let mut config = Config::with_universe(["A", "B", "C", "D"]);
        config.momentum.lookback_period = 1;
        config.momentum.skip_period = 0;
        config.momentum.quintile_count = 2;
        config.rebalance.minimum_trade_notional = Decimal::ZERO;
        MomentumEngine::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_feeds_emit_one_rebalance() {
        let (sink, mut intents) = ChannelOrderSink::new();
        let portfolio = Arc::new(PortfolioSnapshot::new(dec!(1000)));
        let (handle, task) = spawn_engine(engine(), portfolio, Arc::new(sink), 16);

        // Scores (p[0] - p[1]) / p[1] on 2/28 -> 2/29: A 0.2, B 0.1, C -0.1, D -0.2
        for (s, p) in [("A", dec!(120)), ("B", dec!(110)), ("C", dec!(90)), ("D", dec!(80))] {
            handle.submit_bar(DailyBar::finished(s, p, d(2, 28))).await.unwrap();
        }
        for s in ["A", "B", "C", "D"] {
            handle.submit_bar(DailyBar::finished(s, dec!(100), d(2, 29))).await.unwrap();
        }

        // One feed task per security, all delivering the 1st concurrently.
        // Whichever bar arrives first shifts only its own window, and the
        // shifted score keeps its rank: A 0.190, B 0.099, C -0.099, D -0.2
        let mut feeds = Vec::new();
        for (s, p) in [("A", dec!(84)), ("B", dec!(91)), ("C", dec!(111)), ("D", dec!(125))] {
            let h = handle.clone();
            feeds.push(tokio::spawn(async move {
                h.submit_bar(DailyBar::finished(s, p, d(3, 1))).await
            }));
        }
        for feed in feeds {
            feed.await.unwrap().unwrap();
        }

        drop(handle);
        let stats = task.await.unwrap().unwrap();

        assert_eq!(stats.bars_processed, 12);
        assert_eq!(stats.rebalances, 1);
        assert_eq!(stats.rebalances_skipped, 0);
        assert_eq!(stats.intents_emitted, 4);

        let mut received = Vec::new();
        while let Ok(intent) = intents.try_recv() {
            received.push(intent);
        }
        let order: Vec<(&str, OrderSide)> = received
            .iter()
            .map(|i| (i.security.as_str(), i.side()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("A", OrderSide::Buy),
                ("B", OrderSide::Buy),
                ("D", OrderSide::Sell),
                ("C", OrderSide::Sell),
            ]
        );
    }

    /// Rejects every intent and counts the attempts.
    #[derive(Default)]
    struct RejectingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrderSink for RejectingSink {
        async fn submit(&self, _intent: &OrderIntent) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("venue unavailable")
        }
    }

    #[tokio::test]
    async fn test_sink_error_drops_rest_of_plan() {
        let sink = Arc::new(RejectingSink::default());
        let portfolio = Arc::new(PortfolioSnapshot::new(dec!(1000)));
        let (handle, task) = spawn_engine(engine(), portfolio, sink.clone(), 16);

        for (s, p) in [("A", dec!(120)), ("B", dec!(110)), ("C", dec!(90)), ("D", dec!(80))] {
            handle.submit_bar(DailyBar::finished(s, p, d(2, 28))).await.unwrap();
        }
        for s in ["A", "B", "C", "D"] {
            handle.submit_bar(DailyBar::finished(s, dec!(100), d(2, 29))).await.unwrap();
        }
        handle.submit_bar(DailyBar::finished("A", dec!(100), d(3, 1))).await.unwrap();
        // The engine keeps running after the rejection.
        handle.submit_bar(DailyBar::finished("B", dec!(100), d(3, 1))).await.unwrap();
        handle.submit_bar(DailyBar::finished("A", dec!(100), d(3, 4))).await.unwrap();

        drop(handle);
        let stats = task.await.unwrap().unwrap();

        assert_eq!(stats.rebalances, 1);
        assert_eq!(stats.intents_emitted, 4);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.bars_processed, 11);
    }

    #[tokio::test]
    async fn test_unknown_security_stops_engine() {
        let (sink, _intents) = ChannelOrderSink::new();
        let portfolio = Arc::new(PortfolioSnapshot::new(dec!(1000)));
        let (handle, task) = spawn_engine(engine(), portfolio, Arc::new(sink), 4);

        handle.submit_bar(DailyBar::finished("ZZZ", dec!(1), d(3, 4))).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(EngineError::UnknownSecurity(_))));
        assert!(matches!(
            handle.submit_bar(DailyBar::finished("A", dec!(1), d(3, 5))).await,
            Err(EngineError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_reset_through_handle() {
        let (sink, _intents) = ChannelOrderSink::new();
        let portfolio = Arc::new(PortfolioSnapshot::new(dec!(1000)));
        let (handle, task) = spawn_engine(engine(), portfolio, Arc::new(sink), 4);

        handle.submit_bar(DailyBar::finished("A", dec!(1), d(3, 4))).await.unwrap();
        handle.reset().await.unwrap();

        drop(handle);
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats, EngineStats::default());
    }
}
