//! Matching one query image against a candidate tree.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::bucket::Buckets;
use crate::ranked::DEFAULT_CAPACITY;
use crate::walk::TreeWalker;
use crate::{ComparisonResult, Decision};

/// Similarity capability injected into matching tasks.
///
/// Implementations return a normalized dissimilarity in `[0, 1]` (0 means
/// identical) or a mismatch/failure status. Any
/// `Fn(&Path, &Path) -> ComparisonResult` closure is an oracle.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use skinmatch_core::{ComparisonResult, Dimensions, Oracle};
///
/// let same_name = |query: &Path, candidate: &Path| {
///     let score = if query.file_name() == candidate.file_name() { 0.0 } else { 1.0 };
///     ComparisonResult::success(query, candidate, score, Dimensions::new(1, 1, 1))
/// };
/// let result = same_name.compare(Path::new("a/x.png"), Path::new("b/x.png"));
/// assert!(result.is_exact());
/// ```
pub trait Oracle: Send + Sync {
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult;
}

impl<F> Oracle for F
where
    F: Fn(&Path, &Path) -> ComparisonResult + Send + Sync,
{
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
        self(query, candidate)
    }
}

/// Tuning knobs shared by query and collection tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Capacity of the ranked similar bucket.
    pub capacity: usize,
    /// Scan the candidates of each query on the rayon pool.
    pub parallel_candidates: bool,
    /// Worker count for query-level parallelism (`None` or 1 = sequential).
    pub jobs: Option<usize>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            parallel_candidates: false,
            jobs: None,
        }
    }
}

/// Resolves one query image against every file of a candidate tree.
pub struct QueryMatchTask<'a, O: ?Sized> {
    query: PathBuf,
    candidates: &'a TreeWalker,
    oracle: &'a O,
    options: MatchOptions,
}

impl<'a, O: Oracle + ?Sized> QueryMatchTask<'a, O> {
    pub fn new(
        query: impl Into<PathBuf>,
        candidates: &'a TreeWalker,
        oracle: &'a O,
        options: MatchOptions,
    ) -> Self {
        Self {
            query: query.into(),
            candidates,
            oracle,
            options,
        }
    }

    pub fn query(&self) -> &Path {
        &self.query
    }

    /// Scans every candidate and returns the filled buckets.
    pub fn scan(&self) -> Buckets {
        if self.options.parallel_candidates {
            return self.scan_parallel();
        }

        let mut buckets = Buckets::new(self.options.capacity);
        for candidate in self.candidates.walk() {
            buckets.route(self.oracle.compare(&self.query, &candidate));
        }
        buckets
    }

    // Oracle calls run on the rayon pool; routing stays on this thread in
    // traversal order, so ranking and first-found entries match a sequential
    // scan exactly, ties included.
    fn scan_parallel(&self) -> Buckets {
        let candidates: Vec<PathBuf> = self.candidates.walk().collect();
        let results: Vec<ComparisonResult> = candidates
            .par_iter()
            .map(|candidate| self.oracle.compare(&self.query, candidate))
            .collect();

        let mut buckets = Buckets::new(self.options.capacity);
        for result in results {
            buckets.route(result);
        }
        buckets
    }

    /// Runs the scan and reduces it to a single [`Decision`].
    pub fn start(&self) -> Decision {
        let buckets = self.scan();
        let counts = buckets.counts();
        let decision = buckets.reduce();
        debug!(
            query = %self.query.display(),
            equal = counts.equal,
            similar = counts.similar,
            mismatch = counts.mismatch,
            failure = counts.failure,
            decision = %decision.tag(),
            promoted = decision.is_promoted(),
            "Query resolved"
        );
        decision
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::fs;

    use super::*;
    use crate::{DecisionTag, Dimensions};

    /// Oracle answering from a table keyed by candidate file name.
    pub(crate) struct TableOracle {
        pub(crate) entries: HashMap<String, Outcome>,
    }

    #[derive(Clone, Copy)]
    pub(crate) enum Outcome {
        Score(f64),
        Mismatch,
        Fail,
    }

    impl TableOracle {
        pub(crate) fn new(entries: &[(&str, Outcome)]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(name, outcome)| (name.to_string(), *outcome))
                    .collect(),
            }
        }
    }

    impl Oracle for TableOracle {
        fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
            let name = candidate.file_name().unwrap().to_string_lossy().into_owned();
            match self.entries.get(&name) {
                Some(Outcome::Score(score)) => {
                    ComparisonResult::success(query, candidate, *score, Dimensions::new(4, 4, 4))
                }
                Some(Outcome::Mismatch) => ComparisonResult::mismatch(
                    query,
                    candidate,
                    Some(Dimensions::new(4, 8, 4)),
                    "4x4x4 vs 4x8x4",
                ),
                Some(Outcome::Fail) | None => {
                    ComparisonResult::failure(query, candidate, "unreadable")
                }
            }
        }
    }

    pub(crate) fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
        dir
    }

    fn decide(files: &[&str], oracle: &TableOracle, options: MatchOptions) -> Decision {
        let dir = tree(files);
        let walker = TreeWalker::new([dir.path()]).unwrap();
        QueryMatchTask::new("query/a.png", &walker, oracle, options).start()
    }

    fn capacity(capacity: usize) -> MatchOptions {
        MatchOptions {
            capacity,
            ..MatchOptions::default()
        }
    }

    fn candidate_name(decision: &Decision) -> String {
        decision
            .result()
            .and_then(|r| r.candidate.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_similar_picks_lowest_score_with_k2() {
        let oracle = TableOracle::new(&[("b.png", Outcome::Score(0.3)), ("c.png", Outcome::Score(0.1))]);
        let decision = decide(&["b.png", "c.png"], &oracle, capacity(2));
        assert_eq!(decision.tag(), DecisionTag::Similar);
        assert_eq!(candidate_name(&decision), "c.png");
        assert_eq!(decision.result().and_then(|r| r.score), Some(0.1));
    }

    #[test]
    fn test_k1_evicts_worse_candidate() {
        let oracle = TableOracle::new(&[("b.png", Outcome::Score(0.3)), ("c.png", Outcome::Score(0.1))]);
        let dir = tree(&["b.png", "c.png"]);
        let walker = TreeWalker::new([dir.path()]).unwrap();
        let task = QueryMatchTask::new("query/a.png", &walker, &oracle, capacity(1));

        let buckets = task.scan();
        assert_eq!(buckets.similar().len(), 1);
        assert_eq!(
            buckets.similar().best().and_then(|r| r.candidate.file_name()),
            Some(std::ffi::OsStr::new("c.png"))
        );
        assert_eq!(candidate_name(&task.start()), "c.png");
    }

    #[test]
    fn test_dimension_mismatch_singleton_is_promoted() {
        let oracle = TableOracle::new(&[("y.png", Outcome::Mismatch)]);
        let decision = decide(&["y.png"], &oracle, MatchOptions::default());
        assert_eq!(decision.tag(), DecisionTag::Mismatch);
        assert!(decision.is_promoted());
        assert_eq!(candidate_name(&decision), "y.png");
    }

    #[test]
    fn test_empty_candidate_tree_yields_none() {
        let oracle = TableOracle::new(&[]);
        let decision = decide(&["readme.txt"], &oracle, MatchOptions::default());
        assert_eq!(decision.tag(), DecisionTag::None);
        assert!(decision.result().is_none());
    }

    #[test]
    fn test_oracle_failure_does_not_abort_scan() {
        let oracle = TableOracle::new(&[
            ("a_broken.png", Outcome::Fail),
            ("b_ok.png", Outcome::Score(0.0)),
        ]);
        let decision = decide(&["a_broken.png", "b_ok.png"], &oracle, MatchOptions::default());
        assert_eq!(decision.tag(), DecisionTag::Equal);
        assert_eq!(candidate_name(&decision), "b_ok.png");
    }

    #[test]
    fn test_parallel_scan_matches_sequential_scan() {
        let mut entries = Vec::new();
        let mut files = Vec::new();
        for i in 0..40 {
            files.push(format!("dir{}/c{i:02}.png", i % 3));
            let outcome = match i % 5 {
                0 => Outcome::Mismatch,
                1 => Outcome::Fail,
                _ => Outcome::Score(((i * 7) % 40) as f64 / 50.0 + 0.01),
            };
            entries.push((format!("c{i:02}.png"), outcome));
        }
        let oracle = TableOracle {
            entries: entries.into_iter().collect(),
        };
        let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let dir = tree(&file_refs);
        let walker = TreeWalker::new([dir.path()]).unwrap();

        let sequential = QueryMatchTask::new("q.png", &walker, &oracle, capacity(5)).scan();
        let parallel = QueryMatchTask::new(
            "q.png",
            &walker,
            &oracle,
            MatchOptions {
                capacity: 5,
                parallel_candidates: true,
                jobs: None,
            },
        )
        .scan();

        assert_eq!(parallel.counts(), sequential.counts());
        let seq_scores: Vec<_> = sequential.similar().iter().filter_map(|r| r.score).collect();
        let par_scores: Vec<_> = parallel.similar().iter().filter_map(|r| r.score).collect();
        assert_eq!(par_scores, seq_scores);
        assert_eq!(parallel.reduce(), sequential.reduce());
    }

    #[test]
    fn test_parallel_scan_keeps_sequential_tie_break() {
        let names: Vec<String> = (0..24).map(|i| format!("t{i:02}.png")).collect();
        let entries: Vec<(&str, Outcome)> = names
            .iter()
            .map(|n| (n.as_str(), Outcome::Score(0.2)))
            .collect();
        let oracle = TableOracle::new(&entries);
        let file_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = tree(&file_refs);
        let walker = TreeWalker::new([dir.path()]).unwrap();

        // Ties insert ahead of equals until the list fills, then are rejected.
        for (k, best) in [(1, "t00.png"), (2, "t01.png"), (5, "t04.png"), (30, "t23.png")] {
            let sequential = QueryMatchTask::new("q.png", &walker, &oracle, capacity(k)).start();
            let parallel = QueryMatchTask::new(
                "q.png",
                &walker,
                &oracle,
                MatchOptions {
                    capacity: k,
                    parallel_candidates: true,
                    jobs: None,
                },
            )
            .start();
            assert_eq!(candidate_name(&sequential), best, "k={k}");
            assert_eq!(candidate_name(&parallel), best, "k={k}");
            assert_eq!(parallel, sequential);
        }
    }

    #[test]
    fn test_closure_oracle_is_accepted() {
        let dir = tree(&["same.png"]);
        let walker = TreeWalker::new([dir.path()]).unwrap();
        let oracle = |query: &Path, candidate: &Path| {
            ComparisonResult::success(query, candidate, 0.0, Dimensions::new(1, 1, 3))
        };
        let decision =
            QueryMatchTask::new("ui/same.png", &walker, &oracle, MatchOptions::default()).start();
        assert_eq!(decision.tag(), DecisionTag::Equal);
        assert!(decision.result().unwrap().filename_matches());
    }
}
