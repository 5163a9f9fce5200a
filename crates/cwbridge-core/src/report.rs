//! Run summary
//!
//! Collects what happened to every enumerated metric and renders it as a
//! table once the run is over.

use crate::identity::MetricIdentity;
use crate::window::TimeWindow;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

/// Why an enumerated metric produced no request
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SkipReason {
    /// No rule pattern matches the canonical name
    #[strum(serialize = "no matching rule")]
    NoMatchingRule,
    /// The winning rule lists no statistics
    #[strum(serialize = "no statistics")]
    NoStatistics,
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub window: TimeWindow,
    pub metrics_seen: usize,
    pub metrics_matched: usize,
    pub skipped: Vec<(MetricIdentity, SkipReason)>,
    /// Metrics whose statistics could not be fetched, with the error
    pub failures: Vec<(MetricIdentity, String)>,
    pub points_emitted: usize,
    pub points_rejected: usize,
    /// Whether the checkpoint was advanced to the window end
    pub checkpoint_saved: bool,
}

impl RunReport {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            metrics_seen: 0,
            metrics_matched: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
            points_emitted: 0,
            points_rejected: 0,
            checkpoint_saved: false,
        }
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|(_, r)| *r == reason).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.points_rejected == 0
    }

    /// Render the summary table, followed by a failure table if any metric
    /// failed.
    pub fn render(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new("Run"), Cell::new("Value")]);

        let rows: [(&str, String); 8] = [
            ("Window", self.window.to_string()),
            ("Metrics seen", self.metrics_seen.to_string()),
            ("Metrics matched", self.metrics_matched.to_string()),
            (
                "Skipped (no matching rule)",
                self.skipped_for(SkipReason::NoMatchingRule).to_string(),
            ),
            (
                "Skipped (no statistics)",
                self.skipped_for(SkipReason::NoStatistics).to_string(),
            ),
            ("Failed", self.failures.len().to_string()),
            ("Points emitted", self.points_emitted.to_string()),
            ("Points rejected", self.points_rejected.to_string()),
        ];
        for (label, value) in rows {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        }

        let mut out = table.to_string();

        if !self.failures.is_empty() {
            let mut failures = Table::new();
            failures
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![Cell::new("Metric"), Cell::new("Error")]);
            for (identity, error) in &self.failures {
                failures.add_row(vec![Cell::new(identity), Cell::new(error)]);
            }
            out.push('\n');
            out.push_str(&failures.to_string());
        }

        out
    }

    /// Print the summary to stdout
    pub fn print_summary(&self) {
        println!("\n=== aws-metrics run ===\n");
        println!("{}", self.render());
    }
}
