//! Configuration management for the momentum engine.
//!
//! Loads settings from an optional config file and environment variables.
//! Values are supplied once at startup and are immutable thereafter.

use crate::error::{EngineError, Result as EngineResult};
use crate::market::Security;
use crate::strategy::{MomentumFormula, RebalanceSchedule};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Securities the engine tracks and may trade
    #[serde(default)]
    pub universe: UniverseConfig,
    /// Momentum scoring parameters
    #[serde(default)]
    pub momentum: MomentumConfig,
    /// Rebalance timing and order filtering
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    /// Replay settings used by the `backtest` command
    #[serde(default)]
    pub backtest: BacktestConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Security identifiers, fixed for the lifetime of the engine
    #[serde(default)]
    pub securities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Trailing daily observations used to compute momentum
    #[serde(default = "default_lookback_period")]
    pub lookback_period: usize,
    /// Offset into the lookback window used as the second reference point
    #[serde(default = "default_skip_period")]
    pub skip_period: usize,
    /// Number of equal-sized buckets the ranked universe is split into
    #[serde(default = "default_quintile_count")]
    pub quintile_count: usize,
    /// Which window indices the score compares
    #[serde(default)]
    pub formula: MomentumFormula,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// When a rebalance fires
    #[serde(default)]
    pub schedule: RebalanceSchedule,
    /// Smallest order value (|qty| * price) worth executing
    #[serde(default = "default_minimum_trade_notional")]
    pub minimum_trade_notional: Decimal,
    /// Lot size target quantities are rounded toward zero to (0 = no rounding)
    #[serde(default)]
    pub quantity_step: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash for the paper portfolio
    #[serde(default = "default_initial_equity")]
    pub initial_equity: Decimal,
    /// Record one equity point per replayed date
    #[serde(default = "default_true")]
    pub record_equity_curve: bool,
}

// Default value functions
fn default_lookback_period() -> usize {
    252 // ~12 months of trading days
}

fn default_skip_period() -> usize {
    21 // ~1 month of trading days
}

fn default_quintile_count() -> usize {
    5
}

fn default_minimum_trade_notional() -> Decimal {
    Decimal::new(200, 0) // $200
}

fn default_initial_equity() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from `config.*` in the working directory and
    /// `MFE__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from the given file stem/path plus the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref().to_string_lossy().into_owned();
        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("MFE")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("universe.securities"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Build a configuration for the given universe with default parameters.
    pub fn with_universe<I, S>(securities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            universe: UniverseConfig {
                securities: securities.into_iter().map(Into::into).collect(),
            },
            ..Self::default()
        }
    }

    /// Universe as typed identifiers, in configured order.
    pub fn securities(&self) -> Vec<Security> {
        self.universe
            .securities
            .iter()
            .map(|s| Security::new(s.trim()))
            .collect()
    }

    /// Validate configuration values.
    ///
    /// Any failure here is fatal: the engine must not start.
    pub fn validate(&self) -> EngineResult<()> {
        if self.universe.securities.is_empty() {
            return Err(EngineError::Config("universe must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for id in &self.universe.securities {
            let id = id.trim();
            if id.is_empty() {
                return Err(EngineError::Config("empty security identifier".into()));
            }
            if !seen.insert(id) {
                return Err(EngineError::Config(format!("duplicate security: {id}")));
            }
        }

        let m = &self.momentum;
        if m.lookback_period == 0 {
            return Err(EngineError::Config("lookback_period must be > 0".into()));
        }
        if m.skip_period >= m.lookback_period {
            return Err(EngineError::Config(format!(
                "skip_period ({}) must be < lookback_period ({})",
                m.skip_period, m.lookback_period
            )));
        }
        if m.quintile_count < 2 {
            return Err(EngineError::Config(
                "quintile_count must be >= 2: a single bucket would put the same securities in both the long and short legs".into(),
            ));
        }

        let r = &self.rebalance;
        if r.minimum_trade_notional < Decimal::ZERO {
            return Err(EngineError::Config(
                "minimum_trade_notional must be >= 0".into(),
            ));
        }
        if r.quantity_step < Decimal::ZERO {
            return Err(EngineError::Config("quantity_step must be >= 0".into()));
        }

        if self.backtest.initial_equity <= Decimal::ZERO {
            return Err(EngineError::Config("initial_equity must be > 0".into()));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            universe: UniverseConfig::default(),
            momentum: MomentumConfig::default(),
            rebalance: RebalanceConfig::default(),
            backtest: BacktestConfig::default(),
        }
    }
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback_period: default_lookback_period(),
            skip_period: default_skip_period(),
            quintile_count: default_quintile_count(),
            formula: MomentumFormula::default(),
        }
    }
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            schedule: RebalanceSchedule::default(),
            minimum_trade_notional: default_minimum_trade_notional(),
            quantity_step: Decimal::ZERO,
        }
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_equity: default_initial_equity(),
            record_equity_curve: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn valid_config() -> Config {
        Config::with_universe(["AAPL", "MSFT", "IBM", "ORCL", "INTC"])
    }

    #[test]
    fn test_default_config_needs_universe() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_parameters() {
        let config = valid_config();
        assert_eq!(config.momentum.lookback_period, 252);
        assert_eq!(config.momentum.skip_period, 21);
        assert_eq!(config.momentum.quintile_count, 5);
        assert_eq!(config.rebalance.minimum_trade_notional, dec!(200));
        assert_eq!(config.rebalance.schedule, RebalanceSchedule::FirstCalendarDay);
        assert_eq!(config.momentum.formula, MomentumFormula::SourceParity);
    }

    #[test]
    fn test_rejects_skip_not_below_lookback() {
        let mut config = valid_config();
        config.momentum.skip_period = 252;
        assert!(config.validate().is_err());

        config.momentum.skip_period = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_quintile_count() {
        let mut config = valid_config();
        config.momentum.quintile_count = 0;
        assert!(config.validate().is_err());

        config.momentum.quintile_count = 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("same securities in both the long and short legs"));
    }

    #[test]
    fn test_rejects_duplicate_and_empty_securities() {
        let config = Config::with_universe(["AAPL", "AAPL"]);
        assert!(config.validate().is_err());

        let config = Config::with_universe(["AAPL", " "]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_notional() {
        let mut config = valid_config();
        config.rebalance.minimum_trade_notional = dec!(-1);
        assert!(config.validate().is_err());

        config.rebalance.minimum_trade_notional = Decimal::ZERO;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
[universe]
securities = ["A", "B", "C"]

[momentum]
lookback_period = 4
skip_period = 1
quintile_count = 5
formula = "skip_recent"

[rebalance]
schedule = "first_trading_day_of_month"
minimum_trade_notional = "50"
"#
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.universe.securities, vec!["A", "B", "C"]);
        assert_eq!(config.momentum.lookback_period, 4);
        assert_eq!(config.momentum.formula, MomentumFormula::SkipRecent);
        assert_eq!(
            config.rebalance.schedule,
            RebalanceSchedule::FirstTradingDayOfMonth
        );
        assert_eq!(config.rebalance.minimum_trade_notional, dec!(50));
        assert_eq!(config.backtest.initial_equity, dec!(100000));
    }
}
