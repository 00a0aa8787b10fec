// logtally - core/report.rs
//
// Report rendering. Turns a `Summary` plus generation time into the
// textual report written by the persisting stage.

use crate::core::aggregate::{LevelCounts, Summary, TimeRange};
use crate::util::constants;
use chrono::NaiveDateTime;
use std::fmt::Write as _;

/// Immutable result of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    generated_at: NaiveDateTime,
    total: usize,
    levels: LevelCounts,
    range: Option<TimeRange>,
    body: String,
}

impl AnalysisReport {
    pub fn new(summary: Summary, generated_at: NaiveDateTime, body: String) -> Self {
        Self {
            generated_at,
            total: summary.total,
            levels: summary.levels,
            range: summary.range,
            body,
        }
    }

    pub fn generated_at(&self) -> NaiveDateTime {
        self.generated_at
    }

    /// Number of records the report covers.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn levels(&self) -> &LevelCounts {
        &self.levels
    }

    pub fn earliest(&self) -> Option<NaiveDateTime> {
        self.range.map(|r| r.earliest)
    }

    pub fn latest(&self) -> Option<NaiveDateTime> {
        self.range.map(|r| r.latest)
    }

    /// Rendered report text.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Formats a summary as report text.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, summary: &Summary, generated_at: NaiveDateTime) -> String;
}

/// Plain-text layout with one line per level in first-seen order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReportRenderer;

impl ReportRenderer for TextReportRenderer {
    fn render(&self, summary: &Summary, generated_at: NaiveDateTime) -> String {
        let fmt = |ts: NaiveDateTime| ts.format(constants::REPORT_DATE_FORMAT).to_string();

        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "Log Analysis Report as of {}", fmt(generated_at));
        match summary.range {
            Some(range) => {
                let _ = writeln!(
                    out,
                    "Time Range: from {} to {}",
                    fmt(range.earliest),
                    fmt(range.latest)
                );
            }
            None => out.push_str("Time Range: No logs available\n"),
        }
        let _ = writeln!(out, "Total Errors: {}", summary.error_count());
        let _ = writeln!(out, "Total Warnings: {}", summary.warning_count());
        out.push_str("Log Level Distribution:\n");
        for (level, count) in summary.levels.iter() {
            let _ = writeln!(out, "- {level}: {count}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{Aggregator, LevelAggregator};
    use crate::core::model::Record;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_render_layout() {
        let records = vec![
            Record::builder(ts("2024-01-01 10:00:00"), "Error").build(),
            Record::builder(ts("2024-01-01 10:05:00"), "Info").build(),
            Record::builder(ts("2024-01-01 10:10:00"), "Error").build(),
        ];
        let summary = LevelAggregator.aggregate(&records);
        let text = TextReportRenderer.render(&summary, ts("2024-02-01 08:30:00"));
        assert_eq!(
            text,
            "Log Analysis Report as of 2024-02-01 08:30:00\n\
             Time Range: from 2024-01-01 10:00:00 to 2024-01-01 10:10:00\n\
             Total Errors: 2\n\
             Total Warnings: 0\n\
             Log Level Distribution:\n\
             - Error: 2\n\
             - Info: 1\n"
        );
    }

    #[test]
    fn test_render_empty_summary() {
        let text = TextReportRenderer.render(&Summary::default(), ts("2024-02-01 08:30:00"));
        assert!(text.contains("Time Range: No logs available\n"));
        assert!(text.contains("Total Errors: 0\n"));
        assert!(text.ends_with("Log Level Distribution:\n"));
        assert!(!text.contains("0001-01-01"));
    }

    #[test]
    fn test_report_snapshot_carries_summary() {
        let records = vec![Record::builder(ts("2024-01-01 10:00:00"), "Warning").build()];
        let summary = LevelAggregator.aggregate(&records);
        let body = TextReportRenderer.render(&summary, ts("2024-02-01 08:30:00"));
        let report = AnalysisReport::new(summary, ts("2024-02-01 08:30:00"), body);
        assert_eq!(report.total(), 1);
        assert_eq!(report.levels().get("Warning"), 1);
        assert_eq!(report.earliest(), Some(ts("2024-01-01 10:00:00")));
        assert_eq!(report.latest(), report.earliest());
        assert!(report.body().starts_with("Log Analysis Report as of"));
    }
}
