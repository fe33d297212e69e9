//! Per-query result buckets and the reduction to a single [`Decision`].
//!
//! Every comparison of one query image lands in exactly one of four buckets:
//!
//! | status | score | bucket |
//! |---|---|---|
//! | success | 0 | `equal` (unbounded) |
//! | success | > 0 | `similar` (ranked, bounded) |
//! | dimension mismatch | – | `mismatch` (first kept) |
//! | oracle failure | – | `failure` (first kept) |
//!
//! [`Buckets::reduce`] then picks one bucket by the fixed priority
//! equal > similar > mismatch > failure and ignores the others.

use tracing::warn;

use crate::ranked::{RankedList, score_list};
use crate::{CompareStatus, ComparisonResult, Decision, DecisionTag};

/// Number of results routed to each bucket, including those not retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub equal: usize,
    pub similar: usize,
    pub mismatch: usize,
    pub failure: usize,
}

impl BucketCounts {
    pub fn total(&self) -> usize {
        self.equal + self.similar + self.mismatch + self.failure
    }
}

/// The four accumulators for one query image.
#[derive(Debug, Clone)]
pub struct Buckets {
    equal: Vec<ComparisonResult>,
    similar: RankedList<ComparisonResult>,
    mismatch: Option<ComparisonResult>,
    failure: Option<ComparisonResult>,
    counts: BucketCounts,
}

impl Buckets {
    /// Creates empty buckets; `capacity` bounds the similar bucket.
    pub fn new(capacity: usize) -> Self {
        Self {
            equal: Vec::new(),
            similar: score_list(capacity),
            mismatch: None,
            failure: None,
            counts: BucketCounts::default(),
        }
    }

    /// Routes one comparison into its bucket.
    pub fn route(&mut self, result: ComparisonResult) {
        match result.status {
            CompareStatus::Success => match result.score {
                Some(score) if score == 0.0 => {
                    self.counts.equal += 1;
                    self.equal.push(result);
                }
                Some(score) if score.is_finite() && score > 0.0 && score <= 1.0 => {
                    self.counts.similar += 1;
                    self.similar.insert(result);
                }
                score => {
                    warn!(
                        query = %result.query.display(),
                        candidate = %result.candidate.display(),
                        ?score,
                        "Oracle reported success with a score outside [0, 1]"
                    );
                    let reason = match score {
                        Some(score) => format!("score {score} outside [0, 1]"),
                        None => "success without score".to_string(),
                    };
                    self.keep_failure(ComparisonResult::failure(
                        result.query,
                        result.candidate,
                        reason,
                    ));
                }
            },
            CompareStatus::DimensionMismatch => {
                self.counts.mismatch += 1;
                if self.mismatch.is_none() {
                    self.mismatch = Some(result);
                }
            }
            CompareStatus::OracleFailure => self.keep_failure(result),
        }
    }

    fn keep_failure(&mut self, result: ComparisonResult) {
        self.counts.failure += 1;
        if self.failure.is_none() {
            self.failure = Some(result);
        }
    }

    /// Number of results routed into each bucket, retained or not.
    pub fn counts(&self) -> BucketCounts {
        self.counts
    }

    /// Ranked similar entries, best first.
    pub fn similar(&self) -> &RankedList<ComparisonResult> {
        &self.similar
    }

    /// Reduces the buckets to exactly one [`Decision`].
    ///
    /// A similar or mismatch bucket that received exactly one result while
    /// every other bucket stayed empty is promoted: with nothing else
    /// resembling the query, the lone candidate is taken as the match.
    pub fn reduce(self) -> Decision {
        let counts = self.counts;

        if let Some(first) = self.equal.into_iter().next() {
            return Decision::new(DecisionTag::Equal, first, false);
        }

        let mut similar = self.similar.into_vec();
        if !similar.is_empty() {
            let promoted = counts.similar == 1 && counts.total() == 1;
            let best = similar.swap_remove(0);
            return Decision::new(DecisionTag::Similar, best, promoted);
        }

        if let Some(mismatch) = self.mismatch {
            let promoted = counts.mismatch == 1 && counts.total() == 1;
            return Decision::new(DecisionTag::Mismatch, mismatch, promoted);
        }

        if let Some(failure) = self.failure {
            return Decision::new(DecisionTag::Failure, failure, false);
        }

        Decision::none()
    }
}
