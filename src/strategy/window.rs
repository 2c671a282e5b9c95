//! Rolling per-security price history and latest-price cache.

use crate::error::{EngineError, Result};
use crate::market::Security;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Fixed-capacity FIFO buffer of closing prices, oldest first.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: VecDeque<Decimal>,
    capacity: usize,
}

impl PriceWindow {
    /// Create an empty window holding at most `capacity` prices.
    pub fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a price, evicting the oldest entry first when at capacity.
    pub fn push(&mut self, price: Decimal) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.prices.len() == self.capacity
    }

    /// Price at `index`, where 0 is the oldest stored price.
    pub fn price_at(&self, index: usize) -> Option<Decimal> {
        self.prices.get(index).copied()
    }

    /// Contents oldest to newest.
    pub fn to_vec(&self) -> Vec<Decimal> {
        self.prices.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.prices.clear();
    }
}

/// One rolling window per universe member.
///
/// The universe is fixed at construction; any access for a security outside
/// it is an integration error.
#[derive(Debug, Clone)]
pub struct PriceWindowStore {
    windows: HashMap<Security, PriceWindow>,
    /// Universe in configured order
    order: Vec<Security>,
    capacity: usize,
}

impl PriceWindowStore {
    /// Create a store for `universe` with windows of `lookback_period + 1` prices.
    pub fn new(universe: &[Security], lookback_period: usize) -> Self {
        let capacity = lookback_period + 1;
        let windows = universe
            .iter()
            .map(|s| (s.clone(), PriceWindow::new(capacity)))
            .collect();

        Self {
            windows,
            order: universe.to_vec(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, security: &Security) -> bool {
        self.windows.contains_key(security)
    }

    /// Append a closing price for `security`.
    pub fn add(&mut self, security: &Security, price: Decimal) -> Result<()> {
        self.windows
            .get_mut(security)
            .ok_or_else(|| EngineError::UnknownSecurity(security.to_string()))?
            .push(price);
        Ok(())
    }

    /// True once the window holds exactly `capacity` prices.
    pub fn is_full(&self, security: &Security) -> Result<bool> {
        Ok(self.window(security)?.is_full())
    }

    /// Window contents oldest to newest.
    pub fn snapshot(&self, security: &Security) -> Result<Vec<Decimal>> {
        Ok(self.window(security)?.to_vec())
    }

    pub fn window(&self, security: &Security) -> Result<&PriceWindow> {
        self.windows
            .get(security)
            .ok_or_else(|| EngineError::UnknownSecurity(security.to_string()))
    }

    /// Iterate windows in universe order.
    pub fn iter(&self) -> impl Iterator<Item = (&Security, &PriceWindow)> {
        self.order
            .iter()
            .filter_map(move |s| self.windows.get(s).map(|w| (s, w)))
    }

    /// Number of securities whose window is full.
    pub fn full_count(&self) -> usize {
        self.windows.values().filter(|w| w.is_full()).count()
    }

    /// Empty every window, keeping the universe.
    pub fn clear(&mut self) {
        for window in self.windows.values_mut() {
            window.clear();
        }
    }
}

/// Most recent close per security, used only for sizing.
///
/// Kept apart from the momentum windows so sizing prices can be refreshed
/// independently of the history used for scoring.
#[derive(Debug, Clone, Default)]
pub struct LatestPriceCache {
    prices: HashMap<Security, Decimal>,
}

impl LatestPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, security: &Security, price: Decimal) {
        self.prices.insert(security.clone(), price);
    }

    pub fn get(&self, security: &Security) -> Option<Decimal> {
        self.prices.get(security).copied()
    }

    /// Latest price if it is usable for sizing (present and positive).
    pub fn sizing_price(&self, security: &Security) -> Option<Decimal> {
        self.get(security).filter(|p| *p > Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn clear(&mut self) {
        self.prices.clear();
    }
}
