//! # Momentum Factor Engine
//!
//! A cross-sectional momentum rebalancing engine: ranks a fixed universe by
//! trailing return once a month, goes long the top quintile and short the
//! bottom, and emits the order intents that move the book there.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `market`: Security identifiers and daily bars
//! - `strategy`: Price windows, ranking, scheduling, and target diffing
//! - `portfolio`: Portfolio snapshot and order sink contracts
//! - `engine`: The single-writer engine and its async actor
//! - `backtest`: Historical replay against a paper portfolio
//! - `utils`: Shared decimal arithmetic

pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod market;
pub mod portfolio;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use engine::{EngineHandle, MomentumEngine, RebalanceOutcome, RebalanceReport};
pub use error::{EngineError, Result};
pub use market::{DailyBar, Security};
pub use portfolio::{OrderIntent, OrderSink, PortfolioProvider, PortfolioSnapshot};
