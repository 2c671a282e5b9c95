//! Momentum strategy building blocks.
//!
//! Contains the core logic for:
//! - Rolling price windows and the latest-price cache
//! - Momentum scoring and cross-sectional ranking
//! - Month-boundary rebalance scheduling
//! - Quintile selection, target weights, and the order diff
//! - The minimum-notional trade filter

mod filter;
mod ranker;
mod rebalancer;
mod scheduler;
mod window;

pub use filter::should_trade;
pub use ranker::{MomentumFormula, MomentumRanker, Ranking, ScoredSecurity};
pub use rebalancer::{OrderPlan, PortfolioRebalancer, QuintileSelection, TargetWeights};
pub use scheduler::{
    transition, RebalanceSchedule, RebalanceScheduler, RebalanceTrigger, SchedulerState,
};
pub use window::{LatestPriceCache, PriceWindow, PriceWindowStore};
