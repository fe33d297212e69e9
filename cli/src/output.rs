//! Report rendering and the file/stdout report sink.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skinmatch_core::{COLUMNS, DecisionTag, MatchReport, ReportGroup, ReportRow, ReportSink};
use tracing::debug;

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Markdown,
    Table,
}

/// Formats a finished report in the requested output format.
pub fn format_report(report: &MatchReport, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(report_to_markdown(report)),
        OutputFormat::Table => Ok(report_to_table(report)),
    }
}

/// Conflict stamp carried by the first row of a group only.
fn conflict_stamp(group: &ReportGroup, index: usize) -> String {
    if index == 0 {
        group.conflicts.to_string()
    } else {
        String::new()
    }
}

fn escape_markdown(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn report_to_markdown(report: &MatchReport) -> String {
    let mut out = String::new();

    out.push_str("# Skinmatch Report\n\n");
    out.push_str(&format!("- **Generated:** {}\n", report.generated_at));
    out.push_str(&format!("- **Version:** {}\n", report.version));
    out.push_str(&format!("- **Queries:** {}\n", report.total_queries));
    out.push_str(&format!("- **Unmatched:** {}\n", report.unmatched));
    out.push_str(&format!("- **Conflicts:** {}\n", report.total_conflicts()));

    for group in report.groups.iter().filter(|g| !g.is_empty()) {
        out.push_str(&format!(
            "\n## {} ({} rows, {} conflicts)\n\n",
            group.name(),
            group.rows.len(),
            group.conflicts
        ));

        out.push_str(&format!("| ! | {} | conflicts |\n", COLUMNS.join(" | ")));
        out.push_str(&format!("|---|{}---|\n", "---|".repeat(COLUMNS.len())));
        for (index, row) in group.rows.iter().enumerate() {
            let cells: Vec<String> = row.cells().iter().map(|c| escape_markdown(c)).collect();
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                if row.highlighted { "!" } else { "" },
                cells.join(" | "),
                conflict_stamp(group, index)
            ));
        }
    }

    if !report.unmatched_queries.is_empty() {
        out.push_str("\n## Unmatched\n\n");
        for query in &report.unmatched_queries {
            out.push_str(&format!("- `{}`\n", query.display()));
        }
    }

    out
}

fn table_line(group: &ReportGroup, marker: &str, cells: &[String], stamp: &str) -> String {
    let mut line = format!("{marker:<1}");
    for (column, cell) in cells.iter().enumerate() {
        let width = group
            .column_widths
            .get(column)
            .copied()
            .unwrap_or(COLUMNS[column].len());
        line.push_str(&format!(" {cell:<width$}"));
    }
    if !stamp.is_empty() {
        line.push_str(&format!("  {stamp}"));
    }
    line.trim_end().to_string()
}

fn report_to_table(report: &MatchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "queries={} unmatched={} conflicts={} generated={}\n",
        report.total_queries,
        report.unmatched,
        report.total_conflicts(),
        report.generated_at
    ));

    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    for group in report.groups.iter().filter(|g| !g.is_empty()) {
        out.push_str(&format!(
            "\n[{}] {} row(s), {} conflict(s)\n",
            group.name(),
            group.rows.len(),
            group.conflicts
        ));
        out.push_str(&table_line(group, "", &header, "conflicts"));
        out.push('\n');
        for (index, row) in group.rows.iter().enumerate() {
            let marker = if row.highlighted { "!" } else { "" };
            out.push_str(&table_line(
                group,
                marker,
                &row.cells(),
                &conflict_stamp(group, index),
            ));
            out.push('\n');
        }
    }

    if !report.unmatched_queries.is_empty() {
        out.push_str(&format!("\n[unmatched] {} query(s)\n", report.unmatched));
        for query in &report.unmatched_queries {
            out.push_str(&format!("  {}\n", query.display()));
        }
    }

    out
}

/// Sink writing the rendered report to a file, or to stdout when no path is
/// set.
#[derive(Debug)]
pub struct ReportWriter {
    format: OutputFormat,
    output: Option<PathBuf>,
    rows: usize,
}

impl ReportWriter {
    pub fn new(format: OutputFormat, output: Option<PathBuf>) -> Self {
        Self {
            format,
            output,
            rows: 0,
        }
    }

    /// Rows streamed so far.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl ReportSink for ReportWriter {
    type Error = String;

    fn row_recorded(
        &mut self,
        group: DecisionTag,
        row: &ReportRow,
        conflicts: usize,
    ) -> Result<(), Self::Error> {
        self.rows += 1;
        debug!(
            group = %group,
            query = %row.query_path.display(),
            candidate = %row.candidate_path.display(),
            highlighted = row.highlighted,
            conflicts,
            "Row recorded"
        );
        Ok(())
    }

    fn finish(&mut self, report: &MatchReport) -> Result<(), Self::Error> {
        let rendered = format_report(report, self.format)?;
        let Some(path) = &self.output else {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    format!(
                        "Failed to create output directory '{}': {err}",
                        parent.display()
                    )
                })?;
            }
        }
        fs::write(path, rendered)
            .map_err(|err| format!("Failed to write '{}': {err}", path.display()))
    }
}
