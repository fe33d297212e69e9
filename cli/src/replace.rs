//! Copies trusted matches over the images they replace.

use std::fs;
use std::path::PathBuf;

use skinmatch_core::MatchReport;
use tracing::{info, warn};

/// One planned overwrite: `source` is copied onto `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub target: PathBuf,
    pub source: PathBuf,
}

/// Trusted rows of every group, in report order.
///
/// Rows pointing a file at itself are skipped.
pub fn plan(report: &MatchReport) -> Vec<Replacement> {
    report
        .groups
        .iter()
        .flat_map(|group| &group.rows)
        .filter(|row| row.trusted && row.query_path != row.candidate_path)
        .map(|row| Replacement {
            target: row.query_path.clone(),
            source: row.candidate_path.clone(),
        })
        .collect()
}

/// Applies the replacements and returns how many files were written.
///
/// With `dry_run` nothing is touched; each planned copy is only logged.
pub fn apply(replacements: &[Replacement], dry_run: bool) -> Result<usize, String> {
    let mut written = 0usize;
    for replacement in replacements {
        if dry_run {
            info!(
                target_path = %replacement.target.display(),
                source_path = %replacement.source.display(),
                "Would replace"
            );
            continue;
        }

        if !replacement.source.is_file() {
            warn!(
                source_path = %replacement.source.display(),
                "Replacement source vanished, skipping"
            );
            continue;
        }
        fs::copy(&replacement.source, &replacement.target).map_err(|err| {
            format!(
                "Failed to copy '{}' to '{}': {err}",
                replacement.source.display(),
                replacement.target.display()
            )
        })?;
        info!(
            target_path = %replacement.target.display(),
            source_path = %replacement.source.display(),
            "Replaced"
        );
        written += 1;
    }
    Ok(written)
}
