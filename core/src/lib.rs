//! Matching and classification engine for image re-skinning.
//!
//! For every image of a *query* tree this crate finds the best-matching
//! images of a *candidate* tree, classifies the match and aggregates the run
//! into a reviewable report:
//!
//! - [`TreeWalker`]: lazy, restartable, extension-filtered file enumeration;
//!   [`resource_roots`] finds the drawable and mipmap roots of a `res` tree.
//! - [`RankedList`]: bounded, always-sorted top-K container.
//! - [`Buckets`]: per-query equal/similar/mismatch/failure accumulators and
//!   the reduction to one [`Decision`].
//! - [`QueryMatchTask`]: one query image against the candidate tree.
//! - [`CollectionMatchTask`]: the whole query tree, sequential or on a
//!   worker pool, always emitting in query order.
//! - [`ReportAggregator`]: groups decisions and counts filename conflicts.
//!
//! Similarity scoring is not part of this crate: callers inject an
//! [`Oracle`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use skinmatch_core::*;
//!
//! let oracle = |query: &Path, candidate: &Path| {
//!     // Stand-in for a real pixel comparison.
//!     ComparisonResult::success(query, candidate, 0.5, Dimensions::new(32, 32, 4))
//! };
//!
//! let task = CollectionMatchTask::new(
//!     TreeWalker::new(["res/drawable"]).unwrap(),
//!     TreeWalker::new(["new-art"]).unwrap(),
//!     Box::new(oracle),
//!     MatchOptions::default(),
//! );
//! let mut sink = MemorySink::default();
//! let report = task.run_into(ReportAggregator::new(), &mut sink).unwrap();
//! println!("{} conflicts", report.total_conflicts());
//! ```

mod bucket;
mod collection;
mod error;
mod ranked;
mod report;
mod task;
mod types;
mod walk;

pub use bucket::{BucketCounts, Buckets};
pub use collection::{CancelToken, CollectionMatchTask, QueryOutcome};
pub use error::{MatchError, Result};
pub use ranked::{Comparator, DEFAULT_CAPACITY, RankedList, by_score, score_list};
pub use report::{
    COLUMNS, MatchReport, MemorySink, Recorded, ReportAggregator, ReportGroup, ReportRow,
    ReportSink,
};
pub use task::{MatchOptions, Oracle, QueryMatchTask};
pub use types::{CompareStatus, ComparisonResult, Decision, DecisionTag, Dimensions};
pub use walk::{DEFAULT_EXTENSIONS, TreeWalker, resource_roots};
