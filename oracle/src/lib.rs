//! Similarity oracles for skinmatch runs.
//!
//! The matching engine in `skinmatch-core` only sees the
//! [`Oracle`] trait. This crate provides the concrete strategies, selected
//! at runtime through [`OracleKind`]:
//!
//! - [`PixelOracle`]: mean absolute pixel difference; differently shaped
//!   images are reported as dimension mismatches.
//! - [`HashOracle`]: 64-bit difference hash, size independent.
//! - [`SsimOracle`]: one minus the mean structural similarity; shape and
//!   color type must agree.
//! - [`HistogramOracle`]: luma histogram distance, size independent.
//! - [`MetadataOracle`]: header-only check of format, size and file name.
//! - [`TimeoutOracle`]: wraps any oracle with a per-call time limit.
//!
//! Pixel-based oracles keep recently decoded query images so a query is
//! decoded once per run rather than once per candidate.

mod decode;
mod hash;
mod histogram;
mod metadata;
mod pixel;
mod ssim;
mod timeout;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skinmatch_core::Oracle;

pub use hash::{HashOracle, dhash};
pub use histogram::HistogramOracle;
pub use metadata::MetadataOracle;
pub use pixel::PixelOracle;
pub use ssim::SsimOracle;
pub use timeout::TimeoutOracle;

/// Available comparison strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// Per-pixel difference (the default).
    #[default]
    Pixel,
    /// Perceptual difference hash.
    Hash,
    /// Structural similarity.
    Ssim,
    /// Luma histogram distance.
    Histogram,
    /// Format, size and file name only.
    Metadata,
}

impl fmt::Display for OracleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixel => write!(f, "pixel"),
            Self::Hash => write!(f, "hash"),
            Self::Ssim => write!(f, "ssim"),
            Self::Histogram => write!(f, "histogram"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

impl OracleKind {
    /// Builds the oracle, optionally bounded by a per-call timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use skinmatch_oracle::OracleKind;
    ///
    /// let plain = OracleKind::Pixel.build(None);
    /// let bounded = OracleKind::Hash.build(Some(Duration::from_secs(2)));
    /// # let _ = (plain, bounded);
    /// ```
    pub fn build(self, timeout: Option<Duration>) -> Box<dyn Oracle> {
        match (self, timeout) {
            (kind, Some(timeout)) => Box::new(TimeoutOracle::new(kind.shared(), timeout)),
            (Self::Pixel, None) => Box::new(PixelOracle::new()),
            (Self::Hash, None) => Box::new(HashOracle::new()),
            (Self::Ssim, None) => Box::new(SsimOracle::new()),
            (Self::Histogram, None) => Box::new(HistogramOracle::new()),
            (Self::Metadata, None) => Box::new(MetadataOracle::new()),
        }
    }

    fn shared(self) -> Arc<dyn Oracle> {
        match self {
            Self::Pixel => Arc::new(PixelOracle::new()),
            Self::Hash => Arc::new(HashOracle::new()),
            Self::Ssim => Arc::new(SsimOracle::new()),
            Self::Histogram => Arc::new(HistogramOracle::new()),
            Self::Metadata => Arc::new(MetadataOracle::new()),
        }
    }
}
