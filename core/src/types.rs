//! Comparison and decision types shared across the matching engine.
//!
//! A [`ComparisonResult`] is produced once per oracle call. The results of one
//! query are reduced into a single [`Decision`], which is the only value the
//! report layer ever sees.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pixel shape of an image, reported by the oracle for diagnostics.
///
/// # Examples
///
/// ```
/// use skinmatch_core::Dimensions;
///
/// let dims = Dimensions::new(48, 32, 4);
/// assert_eq!(dims.to_string(), "48x32x4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    /// Channel count (e.g. 3 for RGB, 4 for RGBA).
    pub channels: u8,
}

impl Dimensions {
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Outcome class of one oracle invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStatus {
    /// The oracle produced a dissimilarity score.
    Success,
    /// The images have incompatible shapes (size or channel count).
    DimensionMismatch,
    /// The oracle could not compare the images at all.
    OracleFailure,
}

impl fmt::Display for CompareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::DimensionMismatch => write!(f, "dimension_mismatch"),
            Self::OracleFailure => write!(f, "oracle_failure"),
        }
    }
}

/// Result of comparing one query image with one candidate image.
///
/// Only [`CompareStatus::Success`] results carry a score; every other status
/// holds `None` and never takes part in ranking. Values are built through the
/// constructors, and deserialization rejects records that break that rule.
///
/// # Examples
///
/// ```
/// use skinmatch_core::{ComparisonResult, CompareStatus, Dimensions};
///
/// let hit = ComparisonResult::success("ui/a.png", "art/a.png", 0.0, Dimensions::new(8, 8, 4));
/// assert!(hit.is_exact());
///
/// let miss = ComparisonResult::mismatch("ui/a.png", "art/b.png", None, "8x8x4 vs 16x8x4");
/// assert_eq!(miss.status(), CompareStatus::DimensionMismatch);
/// assert_eq!(miss.score(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ComparisonRecord")]
pub struct ComparisonResult {
    pub(crate) query: PathBuf,
    pub(crate) candidate: PathBuf,
    pub(crate) score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) dimensions: Option<Dimensions>,
    pub(crate) status: CompareStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
}

/// Wire form of [`ComparisonResult`], checked before conversion.
#[derive(Deserialize)]
struct ComparisonRecord {
    query: PathBuf,
    candidate: PathBuf,
    score: Option<f64>,
    #[serde(default)]
    dimensions: Option<Dimensions>,
    status: CompareStatus,
    #[serde(default)]
    reason: Option<String>,
}

impl TryFrom<ComparisonRecord> for ComparisonResult {
    type Error = String;

    fn try_from(record: ComparisonRecord) -> Result<Self, Self::Error> {
        match (record.status, record.score) {
            (CompareStatus::Success, None) => {
                return Err("success result without a score".to_string());
            }
            (CompareStatus::DimensionMismatch | CompareStatus::OracleFailure, Some(_)) => {
                return Err(format!("{} result must not carry a score", record.status));
            }
            _ => {}
        }

        Ok(Self {
            query: record.query,
            candidate: record.candidate,
            score: record.score,
            dimensions: record.dimensions,
            status: record.status,
            reason: record.reason,
        })
    }
}

impl ComparisonResult {
    /// A scored comparison. `score` is a dissimilarity in `[0, 1]`.
    pub fn success(
        query: impl Into<PathBuf>,
        candidate: impl Into<PathBuf>,
        score: f64,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            query: query.into(),
            candidate: candidate.into(),
            score: Some(score),
            dimensions: Some(dimensions),
            status: CompareStatus::Success,
            reason: None,
        }
    }

    /// The two images cannot be compared because their shapes differ.
    pub fn mismatch(
        query: impl Into<PathBuf>,
        candidate: impl Into<PathBuf>,
        dimensions: Option<Dimensions>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            candidate: candidate.into(),
            score: None,
            dimensions,
            status: CompareStatus::DimensionMismatch,
            reason: Some(reason.into()),
        }
    }

    /// The oracle failed on this pair.
    pub fn failure(
        query: impl Into<PathBuf>,
        candidate: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            candidate: candidate.into(),
            score: None,
            dimensions: None,
            status: CompareStatus::OracleFailure,
            reason: Some(reason.into()),
        }
    }

    pub fn query(&self) -> &Path {
        &self.query
    }

    pub fn candidate(&self) -> &Path {
        &self.candidate
    }

    /// Dissimilarity in `[0, 1]`; `Some` only for successful comparisons.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn status(&self) -> CompareStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns `true` for a successful comparison with a score of exactly 0.
    pub fn is_exact(&self) -> bool {
        self.status == CompareStatus::Success && self.score == Some(0.0)
    }

    /// Returns `true` when the final path segments of query and candidate
    /// are identical (case-sensitive).
    pub fn filename_matches(&self) -> bool {
        match (self.query.file_name(), self.candidate.file_name()) {
            (Some(query), Some(candidate)) => query == candidate,
            _ => false,
        }
    }
}

/// Classification of a reduced query outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTag {
    Equal,
    Similar,
    Mismatch,
    Failure,
    None,
}

impl DecisionTag {
    /// Tags that own a report group, in report order.
    pub const GROUPED: [DecisionTag; 4] = [
        DecisionTag::Equal,
        DecisionTag::Similar,
        DecisionTag::Mismatch,
        DecisionTag::Failure,
    ];

    /// Group name used by report sinks.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Similar => "similar",
            Self::Mismatch => "mismatch",
            Self::Failure => "failure",
            Self::None => "none",
        }
    }
}

impl fmt::Display for DecisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single reduced outcome for one query image.
///
/// Decisions are only produced by bucket reduction
/// ([`Buckets::reduce`](crate::Buckets::reduce)); the tag always reflects the
/// bucket contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    tag: DecisionTag,
    result: Option<ComparisonResult>,
    promoted: bool,
}

impl Decision {
    pub(crate) fn new(tag: DecisionTag, result: ComparisonResult, promoted: bool) -> Self {
        Self {
            tag,
            result: Some(result),
            promoted,
        }
    }

    pub(crate) fn none() -> Self {
        Self {
            tag: DecisionTag::None,
            result: None,
            promoted: false,
        }
    }

    pub fn tag(&self) -> DecisionTag {
        self.tag
    }

    /// The comparison that justifies this decision, absent for
    /// [`DecisionTag::None`].
    pub fn result(&self) -> Option<&ComparisonResult> {
        self.result.as_ref()
    }

    /// `true` when a lone similar or mismatched candidate was promoted.
    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    /// Equal decisions and promoted singletons are handled the same way
    /// downstream: the matched candidate is taken as the replacement.
    pub fn is_trusted(&self) -> bool {
        self.tag == DecisionTag::Equal || self.promoted
    }
}
