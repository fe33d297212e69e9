//! Run-wide aggregation of decisions into report groups.
//!
//! [`ReportAggregator`] owns all report state for a run. Decisions arrive one
//! at a time in query order; each one lands in the group named by its tag.
//! Rows whose candidate file name differs from the query file name are
//! conflicts: they are highlighted and counted per group.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Decision, DecisionTag};

/// Column headers of a report row, in cell order.
pub const COLUMNS: [&str; 8] = [
    "query",
    "candidate",
    "score",
    "width",
    "height",
    "channels",
    "reason",
    "trusted",
];

/// One recorded decision, flattened for report sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub query_path: PathBuf,
    pub candidate_path: PathBuf,
    pub score: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub filename_matches: bool,
    /// Set for conflicts (`!filename_matches`).
    pub highlighted: bool,
    /// Equal decision or promoted singleton.
    pub trusted: bool,
}

impl ReportRow {
    fn from_decision(query: &Path, decision: &Decision) -> Option<Self> {
        let result = decision.result()?;
        let filename_matches = result.filename_matches();
        Some(Self {
            query_path: query.to_path_buf(),
            candidate_path: result.candidate.clone(),
            score: result.score,
            width: result.dimensions.map(|d| d.width),
            height: result.dimensions.map(|d| d.height),
            channels: result.dimensions.map(|d| d.channels),
            reason: result.reason.clone(),
            filename_matches,
            highlighted: !filename_matches,
            trusted: decision.is_trusted(),
        })
    }

    /// Rendered cell values, aligned with [`COLUMNS`].
    pub fn cells(&self) -> [String; 8] {
        fn opt<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        [
            self.query_path.display().to_string(),
            self.candidate_path.display().to_string(),
            self.score.map(|s| format!("{s:.10}")).unwrap_or_default(),
            opt(self.width),
            opt(self.height),
            opt(self.channels),
            self.reason.clone().unwrap_or_default(),
            if self.trusted { "yes" } else { "no" }.to_string(),
        ]
    }
}

/// All rows of one decision tag, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportGroup {
    pub tag: DecisionTag,
    pub rows: Vec<ReportRow>,
    /// Running number of conflicts; sinks stamp it on the first row.
    pub conflicts: usize,
    /// Display width hint per column of [`COLUMNS`].
    #[serde(default)]
    pub column_widths: Vec<usize>,
}

impl ReportGroup {
    fn new(tag: DecisionTag) -> Self {
        Self {
            tag,
            rows: Vec::new(),
            conflicts: 0,
            column_widths: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.tag.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn compute_column_widths(&mut self) {
        let mut widths: Vec<usize> = COLUMNS.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row.cells()) {
                *width = (*width).max(cell.chars().count());
            }
        }
        self.column_widths = widths;
    }
}

/// Where a recorded decision ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Appended as row `index` of `group`; `conflicts` is the group's running
    /// conflict count after this row.
    Row {
        group: DecisionTag,
        index: usize,
        conflicts: usize,
    },
    /// The query had no candidates; only the unmatched counter moved.
    Unmatched,
}

/// Finished report of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub generated_at: String,
    pub version: String,
    /// Equal, similar, mismatch and failure groups, always in that order.
    pub groups: Vec<ReportGroup>,
    pub total_queries: usize,
    pub unmatched: usize,
    pub unmatched_queries: Vec<PathBuf>,
}

impl MatchReport {
    pub fn group(&self, tag: DecisionTag) -> Option<&ReportGroup> {
        self.groups.iter().find(|g| g.tag == tag)
    }

    pub fn total_conflicts(&self) -> usize {
        self.groups.iter().map(|g| g.conflicts).sum()
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }
}

/// Accumulates decisions across a run.
///
/// # Examples
///
/// ```
/// use skinmatch_core::{ReportAggregator, DecisionTag};
///
/// let aggregator = ReportAggregator::new();
/// let report = aggregator.finalize();
/// assert_eq!(report.groups.len(), 4);
/// assert_eq!(report.row_count(), 0);
/// assert!(report.group(DecisionTag::None).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    groups: [ReportGroup; 4],
    unmatched: Vec<PathBuf>,
    total: usize,
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self {
            groups: DecisionTag::GROUPED.map(ReportGroup::new),
            unmatched: Vec::new(),
            total: 0,
        }
    }

    fn slot(tag: DecisionTag) -> Option<usize> {
        DecisionTag::GROUPED.iter().position(|t| *t == tag)
    }

    /// Records the decision for `query`.
    pub fn record(&mut self, query: &Path, decision: &Decision) -> Recorded {
        self.total += 1;

        let Some(slot) = Self::slot(decision.tag()) else {
            self.unmatched.push(query.to_path_buf());
            return Recorded::Unmatched;
        };
        let Some(row) = ReportRow::from_decision(query, decision) else {
            self.unmatched.push(query.to_path_buf());
            return Recorded::Unmatched;
        };

        let group = &mut self.groups[slot];
        if row.highlighted {
            group.conflicts += 1;
        }
        group.rows.push(row);

        Recorded::Row {
            group: group.tag,
            index: group.rows.len() - 1,
            conflicts: group.conflicts,
        }
    }

    /// Group holding decisions tagged `tag`; `None` for [`DecisionTag::None`].
    pub fn group(&self, tag: DecisionTag) -> Option<&ReportGroup> {
        Self::slot(tag).map(|slot| &self.groups[slot])
    }

    /// Number of queries that found no candidates at all.
    pub fn unmatched(&self) -> usize {
        self.unmatched.len()
    }

    /// Number of decisions recorded so far.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Closes the run and returns the report with column-width hints.
    pub fn finalize(self) -> MatchReport {
        let mut groups = Vec::from(self.groups);
        for group in &mut groups {
            group.compute_column_widths();
        }

        MatchReport {
            generated_at: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            groups,
            total_queries: self.total,
            unmatched: self.unmatched.len(),
            unmatched_queries: self.unmatched,
        }
    }
}

/// Destination for report rows and the finished report.
///
/// `row_recorded` is called as each row is appended, so a sink can write
/// incrementally; `conflicts` is the group's running count to stamp on that
/// group's first row. `finish` receives the finalized report.
pub trait ReportSink {
    type Error: std::fmt::Display;

    fn row_recorded(
        &mut self,
        _group: DecisionTag,
        _row: &ReportRow,
        _conflicts: usize,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn finish(&mut self, report: &MatchReport) -> Result<(), Self::Error>;
}

/// Sink that keeps the finished report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub streamed: Vec<(DecisionTag, ReportRow, usize)>,
    pub report: Option<MatchReport>,
}

impl ReportSink for MemorySink {
    type Error = std::convert::Infallible;

    fn row_recorded(
        &mut self,
        group: DecisionTag,
        row: &ReportRow,
        conflicts: usize,
    ) -> Result<(), Self::Error> {
        self.streamed.push((group, row.clone(), conflicts));
        Ok(())
    }

    fn finish(&mut self, report: &MatchReport) -> Result<(), Self::Error> {
        self.report = Some(report.clone());
        Ok(())
    }
}
