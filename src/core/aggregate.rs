// logtally - core/aggregate.rs
//
// Reduces a record set into summary statistics: per-level counts and the
// covered time range. Order-independent; the only order-dependent output
// is the first-seen ordering of level groups, which only affects display.

use crate::core::model::Record;
use crate::util::constants;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Earliest and latest timestamp of a non-empty record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,
}

impl TimeRange {
    fn widen(self, ts: NaiveDateTime) -> Self {
        Self {
            earliest: self.earliest.min(ts),
            latest: self.latest.max(ts),
        }
    }
}

/// Per-level counts keyed by the exact (case-sensitive) level token,
/// iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelCounts {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl LevelCounts {
    pub fn increment(&mut self, level: &str) {
        match self.index.get(level) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(level.to_string(), self.entries.len());
                self.entries.push((level.to_string(), 1));
            }
        }
    }

    /// Count for an exact level token (0 if never seen).
    pub fn get(&self, level: &str) -> usize {
        self.index
            .get(level)
            .map(|&slot| self.entries[slot].1)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(level, n)| (level.as_str(), *n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregated statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub levels: LevelCounts,
    /// `None` when no records were aggregated.
    pub range: Option<TimeRange>,
}

impl Summary {
    /// Records whose level token is exactly `Error`.
    pub fn error_count(&self) -> usize {
        self.levels.get(constants::ERROR_LEVEL_TOKEN)
    }

    /// Records whose level token is exactly `Warning`.
    pub fn warning_count(&self) -> usize {
        self.levels.get(constants::WARNING_LEVEL_TOKEN)
    }

    pub fn has_data(&self) -> bool {
        self.range.is_some()
    }
}

/// Reduces a record collection to a `Summary`.
pub trait Aggregator: Send + Sync {
    fn aggregate(&self, records: &[Record]) -> Summary;
}

/// Groups by level token and tracks min/max timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelAggregator;

impl Aggregator for LevelAggregator {
    fn aggregate(&self, records: &[Record]) -> Summary {
        let mut summary = Summary::default();
        for record in records {
            summary.total += 1;
            summary.levels.increment(record.level());
            let ts = record.timestamp();
            summary.range = Some(match summary.range {
                Some(range) => range.widen(ts),
                None => TimeRange {
                    earliest: ts,
                    latest: ts,
                },
            });
        }

        tracing::debug!(
            total = summary.total,
            levels = summary.levels.len(),
            errors = summary.error_count(),
            warnings = summary.warning_count(),
            "Aggregation complete"
        );
        summary
    }
}
