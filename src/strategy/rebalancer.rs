//! Quintile selection, equal-weight targets, and the current→target diff.

use crate::market::Security;
use crate::portfolio::{IntentKind, OrderIntent, PortfolioSnapshot};
use crate::strategy::filter::should_trade;
use crate::strategy::ranker::{Ranking, ScoredSecurity};
use crate::strategy::window::LatestPriceCache;
use crate::utils::decimal::round_toward_zero_to_lot;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Long and short legs picked from a ranking.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuintileSelection {
    /// Highest scores first
    pub long: Vec<ScoredSecurity>,
    /// Lowest scores first
    pub short: Vec<ScoredSecurity>,
}

impl QuintileSelection {
    pub fn long_securities(&self) -> Vec<&Security> {
        self.long.iter().map(|s| &s.security).collect()
    }

    pub fn short_securities(&self) -> Vec<&Security> {
        self.short.iter().map(|s| &s.security).collect()
    }
}

/// Signed target weights. Securities not listed are targeted at zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetWeights {
    /// Longs (descending score) then shorts (ascending score)
    entries: Vec<(Security, Decimal)>,
}

impl TargetWeights {
    /// `+1/|long|` for each long, `-1/|short|` for each short.
    pub fn equal_weight(selection: &QuintileSelection) -> Self {
        let mut entries = Vec::with_capacity(selection.long.len() + selection.short.len());

        if !selection.long.is_empty() {
            let w = Decimal::ONE / Decimal::from(selection.long.len());
            entries.extend(selection.long.iter().map(|s| (s.security.clone(), w)));
        }
        if !selection.short.is_empty() {
            let w = -Decimal::ONE / Decimal::from(selection.short.len());
            entries.extend(selection.short.iter().map(|s| (s.security.clone(), w)));
        }

        Self { entries }
    }

    pub fn get(&self, security: &Security) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|(s, _)| s == security)
            .map(|(_, w)| *w)
    }

    pub fn contains(&self, security: &Security) -> bool {
        self.entries.iter().any(|(s, _)| s == security)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Security, Decimal)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn long_sum(&self) -> Decimal {
        self.entries
            .iter()
            .map(|(_, w)| *w)
            .filter(|w| *w > Decimal::ZERO)
            .sum()
    }

    pub fn short_sum(&self) -> Decimal {
        self.entries
            .iter()
            .map(|(_, w)| *w)
            .filter(|w| *w < Decimal::ZERO)
            .sum()
    }

    pub fn to_map(&self) -> HashMap<Security, Decimal> {
        self.entries.iter().cloned().collect()
    }
}

/// Intents for one cycle plus what was left out.
#[derive(Debug, Clone, Default)]
pub struct OrderPlan {
    /// Liquidations first, then longs, then shorts
    pub orders: Vec<OrderIntent>,
    /// Securities skipped for lack of a usable price
    pub unpriced: Vec<Security>,
    /// Changes dropped by the minimum-notional filter
    pub filtered: usize,
}

/// Turns a ranking into target weights and the orders that reach them.
#[derive(Debug, Clone)]
pub struct PortfolioRebalancer {
    quintile_count: usize,
    minimum_trade_notional: Decimal,
    quantity_step: Decimal,
}

impl PortfolioRebalancer {
    pub fn new(
        quintile_count: usize,
        minimum_trade_notional: Decimal,
        quantity_step: Decimal,
    ) -> Self {
        Self {
            quintile_count,
            minimum_trade_notional,
            quantity_step,
        }
    }

    /// Pick the top and bottom `scored / quintile_count` securities.
    ///
    /// Returns `None` when the ranking holds fewer than
    /// `2 * quintile_count` securities.
    pub fn select(&self, ranking: &Ranking) -> Option<QuintileSelection> {
        if self.quintile_count == 0 || ranking.len() < 2 * self.quintile_count {
            return None;
        }

        let q = ranking.len() / self.quintile_count;
        Some(QuintileSelection {
            long: ranking.top(q).to_vec(),
            short: ranking.bottom(q).to_vec(),
        })
    }

    /// Target quantity for a weight at the given equity and price.
    pub fn target_quantity(&self, weight: Decimal, equity: Decimal, price: Decimal) -> Decimal {
        round_toward_zero_to_lot(weight * equity / price, self.quantity_step)
    }

    /// Diff the snapshot against the targets.
    ///
    /// Held securities without a target are closed. Securities without a
    /// positive latest price are skipped entirely for this cycle.
    pub fn plan_orders(
        &self,
        targets: &TargetWeights,
        portfolio: &PortfolioSnapshot,
        prices: &LatestPriceCache,
    ) -> OrderPlan {
        let mut plan = OrderPlan::default();

        for security in portfolio.held_securities() {
            if targets.contains(security) {
                continue;
            }
            let Some(price) = prices.sizing_price(security) else {
                warn!(%security, "No price for held security, liquidation skipped");
                plan.unpriced.push(security.clone());
                continue;
            };

            let held = portfolio.quantity(security);
            self.push_if_tradeable(&mut plan, security, Decimal::ZERO, held, price, IntentKind::Liquidate);
        }

        for (security, weight) in targets.iter() {
            let Some(price) = prices.sizing_price(security) else {
                warn!(%security, %weight, "No price for target, skipped this cycle");
                plan.unpriced.push(security.clone());
                continue;
            };

            let target = self.target_quantity(*weight, portfolio.equity, price);
            let held = portfolio.quantity(security);
            self.push_if_tradeable(&mut plan, security, target, held, price, IntentKind::Rebalance);
        }

        plan
    }

    fn push_if_tradeable(
        &self,
        plan: &mut OrderPlan,
        security: &Security,
        target: Decimal,
        held: Decimal,
        price: Decimal,
        kind: IntentKind,
    ) {
        let delta = target - held;
        if !should_trade(delta, price, self.minimum_trade_notional) {
            if !delta.is_zero() {
                debug!(
                    %security,
                    %delta,
                    notional = %(delta.abs() * price),
                    "Below minimum trade notional"
                );
                plan.filtered += 1;
            }
            return;
        }

        plan.orders.push(OrderIntent {
            security: security.clone(),
            volume: delta,
            target_quantity: target,
            price,
            kind,
        });
    }
}
