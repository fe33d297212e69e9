//! Run configuration loaded from YAML.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change. Command-line flags override whatever the file sets.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! query_roots:
//!   - legacy/icons
//! res_dir: app/src/main/res
//! candidate_roots:
//!   - new-art
//! extensions: [png, jpg]
//! matching:
//!   capacity: 10
//!   jobs: 4
//!   parallel_candidates: false
//! oracle:
//!   kind: pixel
//!   timeout_ms: 5000
//! report:
//!   format: table
//!   output: skinmatch-report.txt
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skinmatch_core::{
    DEFAULT_CAPACITY, DEFAULT_EXTENSIONS, MatchError, MatchOptions, resource_roots,
};
use skinmatch_oracle::OracleKind;
use thiserror::Error;

use crate::output::OutputFormat;

pub const CONFIG_VERSION: &str = "1.0";

/// Errors raised while reading or writing a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Candidate ranking and scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Similar candidates kept per query.
    pub capacity: usize,
    /// Worker threads across queries; unset runs sequentially.
    pub jobs: Option<usize>,
    /// Compare each query against its candidates in parallel.
    pub parallel_candidates: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            jobs: None,
            parallel_candidates: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub kind: OracleKind,
    /// Per-comparison limit in milliseconds.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: OutputFormat,
    /// Report destination; stdout when unset.
    pub output: Option<PathBuf>,
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub version: String,
    /// Trees of images to be replaced.
    pub query_roots: Vec<PathBuf>,
    /// Android `res` directory whose drawable and mipmap folders are added
    /// to the query roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_dir: Option<PathBuf>,
    /// Trees of replacement art.
    pub candidate_roots: Vec<PathBuf>,
    /// File extensions considered images, without the dot.
    pub extensions: Vec<String>,
    pub matching: MatchingConfig,
    pub oracle: OracleConfig,
    pub report: ReportConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            query_roots: Vec::new(),
            res_dir: None,
            candidate_roots: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            matching: MatchingConfig::default(),
            oracle: OracleConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            capacity: self.matching.capacity,
            parallel_candidates: self.matching.parallel_candidates,
            jobs: self.matching.jobs,
        }
    }

    /// Explicit query roots followed by the folders found under `res_dir`.
    pub fn resolved_query_roots(&self) -> Result<Vec<PathBuf>, MatchError> {
        let mut roots = self.query_roots.clone();
        if let Some(res_dir) = &self.res_dir {
            roots.extend(resource_roots(res_dir)?);
        }
        Ok(roots)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.oracle.timeout_ms.map(Duration::from_millis)
    }

    /// Checks the settings a run cannot start without.
    pub fn validate(&self) -> Result<(), String> {
        if self.query_roots.is_empty() && self.res_dir.is_none() {
            return Err(
                "no query roots given (use --query, --res-dir or query_roots)".to_string(),
            );
        }
        if self.candidate_roots.is_empty() {
            return Err("no candidate roots given (use --candidates or candidate_roots)".to_string());
        }
        if self.matching.capacity == 0 {
            return Err("capacity must be at least 1".to_string());
        }
        if self.matching.jobs == Some(0) {
            return Err("jobs must be at least 1".to_string());
        }
        if self.oracle.timeout_ms == Some(0) {
            return Err("timeout_ms must be at least 1".to_string());
        }
        if self.extensions.is_empty() {
            return Err("at least one image extension is required".to_string());
        }
        Ok(())
    }
}
