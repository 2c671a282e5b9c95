//! Backtesting module for replaying historical daily closes.
//!
//! This module provides:
//! - Historical bar loading (CSV import)
//! - A paper portfolio that fills intents at their sizing price
//! - A date-ordered replay through the momentum engine
//! - Performance metrics calculation
//!
//! # Example
//!
//! ```rust,ignore
//! use momentum_factor_engine::backtest::{BacktestRunner, CsvBarLoader};
//!
//! let loader = CsvBarLoader::new("data/closes.csv")?;
//! let runner = BacktestRunner::new(loader, config);
//!
//! let result = runner.run().await?;
//! println!("Return: {:.2}%", result.metrics.total_return_pct);
//! ```

mod data;
mod metrics;
mod paper;
mod runner;

pub use data::{BarLoader, CsvBarLoader};
pub use metrics::{ActivityCounts, BacktestMetrics, EquityPoint};
pub use paper::PaperPortfolio;
pub use runner::{BacktestResult, BacktestRunner};
