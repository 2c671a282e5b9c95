//! Market data types consumed by the engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a tradable instrument.
///
/// Ordering is lexicographic on the identifier and is used as the
/// deterministic tie-break when ranking equal momentum scores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Security(String);

impl Security {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Security {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Security {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A daily bar delivered by the external feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    pub security: Security,
    pub close: Decimal,
    /// Exchange-local calendar date of the bar.
    pub date: NaiveDate,
    /// Only finished bars mutate engine state.
    pub is_finished: bool,
}

impl DailyBar {
    /// Create a finished bar.
    pub fn finished(security: impl Into<Security>, close: Decimal, date: NaiveDate) -> Self {
        Self {
            security: security.into(),
            close,
            date,
            is_finished: true,
        }
    }

    /// Mark the bar as still forming.
    pub fn in_progress(mut self) -> Self {
        self.is_finished = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_security_ordering_is_lexicographic() {
        let mut ids = vec![Security::new("MSFT"), Security::new("AAPL"), Security::new("IBM")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "AAPL");
        assert_eq!(ids[2].to_string(), "MSFT");
    }

    #[test]
    fn test_bar_builders() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bar = DailyBar::finished("AAPL", dec!(185.5), date);
        assert!(bar.is_finished);
        assert_eq!(bar.security, Security::from("AAPL"));

        let forming = bar.in_progress();
        assert!(!forming.is_finished);
    }
}
