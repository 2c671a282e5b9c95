//! Collaborator contracts: portfolio queries in, order intents out.
//!
//! The engine never mutates positions or equity. It reads a snapshot from a
//! [`PortfolioProvider`] and hands [`OrderIntent`]s to an [`OrderSink`].

use crate::market::Security;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::info;

/// Point-in-time view of the account, taken once per rebalance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Total portfolio equity
    pub equity: Decimal,
    /// Signed held quantity per security (negative = short)
    pub positions: HashMap<Security, Decimal>,
}

impl PortfolioSnapshot {
    pub fn new(equity: Decimal) -> Self {
        Self {
            equity,
            positions: HashMap::new(),
        }
    }

    /// Add a held position.
    pub fn with_position(mut self, security: impl Into<Security>, quantity: Decimal) -> Self {
        self.positions.insert(security.into(), quantity);
        self
    }

    /// Held quantity, zero when flat.
    pub fn quantity(&self, security: &Security) -> Decimal {
        self.positions
            .get(security)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Securities with a non-zero position, sorted by identifier.
    pub fn held_securities(&self) -> Vec<&Security> {
        let mut held: Vec<&Security> = self
            .positions
            .iter()
            .filter(|(_, qty)| !qty.is_zero())
            .map(|(s, _)| s)
            .collect();
        held.sort();
        held
    }
}

/// Synchronous accessor for current equity and holdings.
#[cfg_attr(test, mockall::automock)]
pub trait PortfolioProvider: Send + Sync {
    /// Equity and positions, read atomically.
    fn snapshot(&self) -> PortfolioSnapshot;
}

impl PortfolioProvider for PortfolioSnapshot {
    fn snapshot(&self) -> PortfolioSnapshot {
        self.clone()
    }
}

/// Trade direction derived from the sign of an order volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Why an intent was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    /// Move toward a long/short target weight
    Rebalance,
    /// Close a holding that has no target
    Liquidate,
}

/// A signed order volume handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub security: Security,
    /// Positive buys, negative sells
    pub volume: Decimal,
    /// Position the order is meant to reach
    pub target_quantity: Decimal,
    /// Latest price the order was sized with
    pub price: Decimal,
    pub kind: IntentKind,
}

impl OrderIntent {
    pub fn side(&self) -> OrderSide {
        if self.volume.is_sign_negative() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }

    /// Absolute order value at the sizing price.
    pub fn notional(&self) -> Decimal {
        self.volume.abs() * self.price
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {} (target {})",
            self.side(),
            self.volume.abs(),
            self.security,
            self.price,
            self.target_quantity
        )
    }
}

/// Receives order intents. No retries, no fill tracking.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit(&self, intent: &OrderIntent) -> anyhow::Result<()>;
}

/// Forwards intents over a channel to whatever executes them.
#[derive(Debug, Clone)]
pub struct ChannelOrderSink {
    tx: mpsc::UnboundedSender<OrderIntent>,
}

impl ChannelOrderSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrderIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OrderSink for ChannelOrderSink {
    async fn submit(&self, intent: &OrderIntent) -> anyhow::Result<()> {
        self.tx
            .send(intent.clone())
            .map_err(|_| anyhow::anyhow!("order intent receiver dropped"))
    }
}

/// Logs intents without executing them (dry run).
#[derive(Debug, Clone, Default)]
pub struct LoggingOrderSink;

#[async_trait]
impl OrderSink for LoggingOrderSink {
    async fn submit(&self, intent: &OrderIntent) -> anyhow::Result<()> {
        info!(
            security = %intent.security,
            side = %intent.side(),
            volume = %intent.volume,
            price = %intent.price,
            kind = ?intent.kind,
            "Order intent"
        );
        Ok(())
    }
}
