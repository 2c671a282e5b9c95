//! Trailing-return scoring and cross-sectional ranking.

use crate::market::Security;
use crate::strategy::window::{PriceWindow, PriceWindowStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Which two window indices the momentum score compares.
///
/// Index 0 is the oldest stored price and index `lookback` the newest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumFormula {
    /// `(p[skip] - p[lookback]) / p[lookback]`.
    ///
    /// `p[skip]` is the older of the two points, so this compares a price
    /// near the start of the window against the newest close, relative to the
    /// newest close. Default, for parity with the strategy this engine replaces.
    #[default]
    SourceParity,
    /// `(p[lookback - skip] - p[0]) / p[0]`: a year of return ending `skip`
    /// days before the newest close.
    SkipRecent,
}

impl MomentumFormula {
    /// Score a full window. Returns `None` if the denominator is not positive
    /// or the window is shorter than `lookback + 1`.
    pub fn score(&self, window: &PriceWindow, lookback: usize, skip: usize) -> Option<Decimal> {
        let (numerator_idx, base_idx) = match self {
            Self::SourceParity => (skip, lookback),
            Self::SkipRecent => (lookback.checked_sub(skip)?, 0),
        };

        let base = window.price_at(base_idx)?;
        let reference = window.price_at(numerator_idx)?;
        if base <= Decimal::ZERO {
            return None;
        }

        Some((reference - base) / base)
    }
}

/// A scored security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSecurity {
    pub security: Security,
    pub score: Decimal,
}

/// Ranked output of one scoring pass.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    scores: HashMap<Security, Decimal>,
    /// Highest score first; ties by ascending security id
    descending: Vec<ScoredSecurity>,
    /// Exact reverse of `descending`, so top and bottom slices never overlap
    ascending: Vec<ScoredSecurity>,
}

impl Ranking {
    fn from_scored(scored: Vec<ScoredSecurity>) -> Self {
        let mut descending = scored.clone();
        descending.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.security.cmp(&b.security))
        });

        let ascending: Vec<ScoredSecurity> = descending.iter().rev().cloned().collect();

        let scores = descending
            .iter()
            .map(|s| (s.security.clone(), s.score))
            .collect();

        Self {
            scores,
            descending,
            ascending,
        }
    }

    pub fn len(&self) -> usize {
        self.descending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descending.is_empty()
    }

    pub fn score(&self, security: &Security) -> Option<Decimal> {
        self.scores.get(security).copied()
    }

    pub fn scores(&self) -> &HashMap<Security, Decimal> {
        &self.scores
    }

    pub fn descending(&self) -> &[ScoredSecurity] {
        &self.descending
    }

    pub fn ascending(&self) -> &[ScoredSecurity] {
        &self.ascending
    }

    /// The `n` highest-scoring securities.
    pub fn top(&self, n: usize) -> &[ScoredSecurity] {
        &self.descending[..n.min(self.descending.len())]
    }

    /// The `n` lowest-scoring securities.
    pub fn bottom(&self, n: usize) -> &[ScoredSecurity] {
        &self.ascending[..n.min(self.ascending.len())]
    }
}

/// Computes momentum scores for every full window and orders the universe.
#[derive(Debug, Clone)]
pub struct MomentumRanker {
    lookback_period: usize,
    skip_period: usize,
    quintile_count: usize,
    formula: MomentumFormula,
}

impl MomentumRanker {
    pub fn new(
        lookback_period: usize,
        skip_period: usize,
        quintile_count: usize,
        formula: MomentumFormula,
    ) -> Self {
        Self {
            lookback_period,
            skip_period,
            quintile_count,
            formula,
        }
    }

    pub fn quintile_count(&self) -> usize {
        self.quintile_count
    }

    /// Minimum number of scored securities for a ranking to be usable.
    pub fn min_scored(&self) -> usize {
        2 * self.quintile_count
    }

    /// Score every full window. Securities with incomplete history are left out.
    pub fn score_all(&self, store: &PriceWindowStore) -> Vec<ScoredSecurity> {
        store
            .iter()
            .filter(|(_, window)| window.is_full())
            .filter_map(|(security, window)| {
                match self
                    .formula
                    .score(window, self.lookback_period, self.skip_period)
                {
                    Some(score) => Some(ScoredSecurity {
                        security: security.clone(),
                        score,
                    }),
                    None => {
                        debug!(%security, "Non-positive reference price, not scored");
                        None
                    }
                }
            })
            .collect()
    }

    /// Rank the universe. Returns `None` when fewer than
    /// `2 * quintile_count` securities can be scored.
    pub fn rank(&self, store: &PriceWindowStore) -> Option<Ranking> {
        let scored = self.score_all(store);
        if scored.len() < self.min_scored() {
            debug!(
                scored = scored.len(),
                required = self.min_scored(),
                "Not enough full windows to rank"
            );
            return None;
        }

        Some(Ranking::from_scored(scored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn window(prices: &[Decimal]) -> PriceWindow {
        let mut w = PriceWindow::new(prices.len());
        for p in prices {
            w.push(*p);
        }
        w
    }

    fn store_with(prices: &[(&str, Vec<Decimal>)], lookback: usize) -> PriceWindowStore {
        let universe: Vec<Security> = prices.iter().map(|(s, _)| Security::new(*s)).collect();
        let mut store = PriceWindowStore::new(&universe, lookback);
        for (s, series) in prices {
            for p in series {
                store.add(&Security::new(*s), *p).unwrap();
            }
        }
        store
    }

    // =========================================================================
    // Formula Tests
    // =========================================================================

    #[test]
    fn test_source_parity_formula() {
        // lookback 4, skip 1: (p[1] - p[4]) / p[4]
        let w = window(&[dec!(90), dec!(120), dec!(95), dec!(97), dec!(100)]);
        let score = MomentumFormula::SourceParity.score(&w, 4, 1).unwrap();
        assert_eq!(score, dec!(0.2));
    }

    #[test]
    fn test_skip_recent_formula() {
        // lookback 4, skip 1: (p[3] - p[0]) / p[0]
        let w = window(&[dec!(100), dec!(120), dec!(95), dec!(110), dec!(50)]);
        let score = MomentumFormula::SkipRecent.score(&w, 4, 1).unwrap();
        assert_eq!(score, dec!(0.1));
    }

    #[test]
    fn test_formula_rejects_non_positive_base() {
        let w = window(&[dec!(1), dec!(2), dec!(0)]);
        assert_eq!(MomentumFormula::SourceParity.score(&w, 2, 1), None);
    }

    // =========================================================================
    // Ranking Tests
    // =========================================================================

    #[test]
    fn test_incomplete_windows_excluded() {
        let store = store_with(
            &[
                ("A", vec![dec!(1), dec!(2), dec!(3)]),
                ("B", vec![dec!(1), dec!(2)]),
            ],
            2,
        );
        let ranker = MomentumRanker::new(2, 1, 2, MomentumFormula::SourceParity);
        let scored = ranker.score_all(&store);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].security.as_str(), "A");
    }

    #[test]
    fn test_rank_skipped_when_insufficient() {
        let store = store_with(
            &[
                ("A", vec![dec!(1), dec!(2), dec!(3)]),
                ("B", vec![dec!(1), dec!(2), dec!(3)]),
                ("C", vec![dec!(1), dec!(2), dec!(3)]),
            ],
            2,
        );
        let ranker = MomentumRanker::new(2, 1, 2, MomentumFormula::SourceParity);
        assert!(ranker.rank(&store).is_none());
    }

    #[test]
    fn test_rank_orders_both_directions() {
        // lookback 1, skip 0: (p[0] - p[1]) / p[1]
        let store = store_with(
            &[
                ("A", vec![dec!(110), dec!(100)]), // 0.1
                ("B", vec![dec!(90), dec!(100)]),  // -0.1
                ("C", vec![dec!(130), dec!(100)]), // 0.3
                ("D", vec![dec!(100), dec!(100)]), // 0
            ],
            1,
        );
        let ranker = MomentumRanker::new(1, 0, 2, MomentumFormula::SourceParity);
        let ranking = ranker.rank(&store).unwrap();

        let desc: Vec<&str> = ranking.descending().iter().map(|s| s.security.as_str()).collect();
        let asc: Vec<&str> = ranking.ascending().iter().map(|s| s.security.as_str()).collect();
        assert_eq!(desc, vec!["C", "A", "D", "B"]);
        assert_eq!(asc, vec!["B", "D", "A", "C"]);
        assert_eq!(ranking.score(&Security::new("C")), Some(dec!(0.3)));
        assert_eq!(ranking.top(1)[0].security.as_str(), "C");
        assert_eq!(ranking.bottom(1)[0].security.as_str(), "B");
    }

    #[test]
    fn test_ties_broken_by_security_id() {
        // Insert in reverse id order to show the tie-break is not insertion order.
        let store = store_with(
            &[
                ("D", vec![dec!(100), dec!(100)]),
                ("C", vec![dec!(100), dec!(100)]),
                ("B", vec![dec!(100), dec!(100)]),
                ("A", vec![dec!(100), dec!(100)]),
            ],
            1,
        );
        let ranker = MomentumRanker::new(1, 0, 2, MomentumFormula::SourceParity);
        let ranking = ranker.rank(&store).unwrap();

        let desc: Vec<&str> = ranking.descending().iter().map(|s| s.security.as_str()).collect();
        let asc: Vec<&str> = ranking.ascending().iter().map(|s| s.security.as_str()).collect();
        assert_eq!(desc, vec!["A", "B", "C", "D"]);
        assert_eq!(asc, vec!["D", "C", "B", "A"]);

        // Equal scores still give disjoint extremes.
        assert_eq!(ranking.top(2)[1].security.as_str(), "B");
        assert_eq!(ranking.bottom(2)[1].security.as_str(), "C");
    }

    #[test]
    fn test_top_and_bottom_clamp() {
        let ranking = Ranking::default();
        assert!(ranking.top(3).is_empty());
        assert!(ranking.bottom(3).is_empty());
    }
}
