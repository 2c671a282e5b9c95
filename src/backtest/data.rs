//! Historical daily bar loading for replay.

use crate::market::{DailyBar, Security};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::Path;

/// Trait for loading historical daily bars.
pub trait BarLoader: Send + Sync {
    /// All bars dated within `[start, end]`, ordered by date.
    fn load_bars(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyBar>>;

    /// First and last date in the data.
    fn available_range(&self) -> Option<(NaiveDate, NaiveDate)>;

    /// All securities that appear in the data, sorted.
    fn available_symbols(&self) -> Vec<String>;
}

/// CSV bar loader.
///
/// Expected CSV format (header optional):
/// ```csv
/// date,symbol,close
/// 2024-01-02,AAPL,185.64
/// ```
#[derive(Debug, Clone)]
pub struct CsvBarLoader {
    /// Sorted by date; input order kept within a date
    bars: Vec<DailyBar>,
    symbols: Vec<String>,
}

impl CsvBarLoader {
    /// Load bars from a CSV file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

        Self::from_csv_content(&content)
    }

    /// Load bars from CSV content.
    pub fn from_csv_content(content: &str) -> Result<Self> {
        let mut bars = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            if line_num == 0 && line.trim_start().starts_with("date") {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            let bar = parse_row(line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            bars.push(bar);
        }

        if bars.is_empty() {
            anyhow::bail!("CSV file contains no data rows");
        }

        Ok(Self::from_bars(bars))
    }

    /// Create a loader from in-memory bars.
    pub fn from_bars(mut bars: Vec<DailyBar>) -> Self {
        // Stable: same-date bars keep their delivery order.
        bars.sort_by_key(|b| b.date);

        let symbols: BTreeSet<String> = bars.iter().map(|b| b.security.to_string()).collect();

        Self {
            bars,
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl BarLoader for CsvBarLoader {
    fn load_bars(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyBar>> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }

    fn available_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.bars.first()?;
        let last = self.bars.last()?;
        Some((first.date, last.date))
    }

    fn available_symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }
}

fn parse_row(line: &str) -> Result<DailyBar> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        anyhow::bail!("Expected 3 columns (date,symbol,close), got {}", parts.len());
    }

    let date = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {}", parts[0]))?;
    if parts[1].is_empty() {
        anyhow::bail!("Empty symbol");
    }
    let close: Decimal = parts[2]
        .parse()
        .with_context(|| format!("Invalid close: {}", parts[2]))?;

    Ok(DailyBar::finished(Security::new(parts[1]), close, date))
}
