//! Matching a whole query tree against candidate trees.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MatchError, Result};
use crate::report::{Recorded, ReportAggregator, ReportSink};
use crate::task::{MatchOptions, Oracle, QueryMatchTask};
use crate::walk::TreeWalker;
use crate::{Decision, MatchReport};

/// Decision reached for one query image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: PathBuf,
    pub decision: Decision,
}

/// Shared flag for aborting a run between queries.
///
/// A query that has started always runs to completion; queries not yet
/// started when the token fires are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one [`QueryMatchTask`] per query image.
///
/// Outcomes are always emitted in query traversal order, whether queries run
/// on the calling thread or on a worker pool.
pub struct CollectionMatchTask<O: ?Sized> {
    queries: TreeWalker,
    candidates: TreeWalker,
    options: MatchOptions,
    cancel: CancelToken,
    oracle: Box<O>,
}

impl<O: Oracle + ?Sized> CollectionMatchTask<O> {
    pub fn new(
        queries: TreeWalker,
        candidates: TreeWalker,
        oracle: Box<O>,
        options: MatchOptions,
    ) -> Self {
        Self {
            queries,
            candidates,
            options,
            cancel: CancelToken::new(),
            oracle,
        }
    }

    /// Uses `cancel` to abort the run between queries.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn decide(&self, query: &Path) -> Decision {
        QueryMatchTask::new(query, &self.candidates, &*self.oracle, self.options).start()
    }

    /// Runs the whole query tree and collects the outcomes.
    pub fn run(&self) -> Result<Vec<QueryOutcome>> {
        let mut outcomes = Vec::new();
        self.run_with(|outcome| {
            outcomes.push(outcome);
            Ok(())
        })?;
        Ok(outcomes)
    }

    /// Runs the whole query tree, handing each outcome to `emit` in query
    /// order. An error from `emit` stops the run.
    pub fn run_with<F>(&self, mut emit: F) -> Result<()>
    where
        F: FnMut(QueryOutcome) -> Result<()>,
    {
        let started = Instant::now();
        let queries: Vec<PathBuf> = self.queries.walk().collect();
        let jobs = self
            .options
            .jobs
            .filter(|jobs| *jobs > 1)
            .map(|jobs| jobs.min(queries.len().max(1)));

        info!(
            queries = queries.len(),
            query_roots = ?self.queries.roots(),
            candidate_roots = ?self.candidates.roots(),
            jobs = jobs.unwrap_or(1),
            "Starting match run"
        );

        let emitted = match jobs {
            Some(jobs) if jobs > 1 => self.run_parallel(&queries, jobs, &mut emit)?,
            _ => self.run_sequential(&queries, &mut emit)?,
        };

        info!(
            emitted,
            cancelled = self.cancel.is_cancelled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Match run finished"
        );
        Ok(())
    }

    fn run_sequential<F>(&self, queries: &[PathBuf], emit: &mut F) -> Result<usize>
    where
        F: FnMut(QueryOutcome) -> Result<()>,
    {
        let mut emitted = 0;
        for query in queries {
            if self.cancel.is_cancelled() {
                debug!(remaining = queries.len() - emitted, "Run cancelled");
                break;
            }
            let decision = self.decide(query);
            emit(QueryOutcome {
                query: query.clone(),
                decision,
            })?;
            emitted += 1;
        }
        Ok(emitted)
    }

    // Workers send finished outcomes tagged with their query index; this
    // thread buffers them and emits strictly in index order. A skipped query
    // (cancellation) ends emission, so the emitted prefix always equals what
    // a sequential run would have produced.
    fn run_parallel<F>(&self, queries: &[PathBuf], jobs: usize, emit: &mut F) -> Result<usize>
    where
        F: FnMut(QueryOutcome) -> Result<()>,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("skinmatch-worker-{i}"))
            .build()
            .map_err(|err| MatchError::ThreadPool(err.to_string()))?;

        let (tx, rx) = mpsc::channel::<(usize, Option<QueryOutcome>)>();
        let stop = CancelToken::new();

        std::thread::scope(|scope| {
            let stop_workers = stop.clone();
            scope.spawn(move || {
                pool.install(|| {
                    queries
                        .par_iter()
                        .enumerate()
                        .for_each_with(tx, |tx, (index, query)| {
                            let outcome = if self.cancel.is_cancelled()
                                || stop_workers.is_cancelled()
                            {
                                None
                            } else {
                                Some(QueryOutcome {
                                    query: query.clone(),
                                    decision: self.decide(query),
                                })
                            };
                            // The receiver only hangs up after an emit error.
                            let _ = tx.send((index, outcome));
                        });
                });
            });

            let mut pending: BTreeMap<usize, Option<QueryOutcome>> = BTreeMap::new();
            let mut next = 0usize;
            let mut emitted = 0usize;
            let mut open = true;

            for (index, outcome) in rx {
                if !open {
                    continue;
                }
                pending.insert(index, outcome);
                while let Some(slot) = pending.remove(&next) {
                    next += 1;
                    let Some(outcome) = slot else {
                        debug!(index = next - 1, "Run cancelled");
                        open = false;
                        break;
                    };
                    if let Err(err) = emit(outcome) {
                        stop.cancel();
                        return Err(err);
                    }
                    emitted += 1;
                }
            }

            Ok(emitted)
        })
    }

    /// Runs the whole query tree, recording every outcome in `aggregator` and
    /// streaming recorded rows to `sink`, then finalizes the report and hands
    /// it to the sink.
    pub fn run_into<S: ReportSink>(
        &self,
        mut aggregator: ReportAggregator,
        sink: &mut S,
    ) -> Result<MatchReport> {
        self.run_with(|outcome| {
            let recorded = aggregator.record(&outcome.query, &outcome.decision);
            if let Recorded::Row {
                group,
                index,
                conflicts,
            } = recorded
            {
                let row = aggregator
                    .group(group)
                    .and_then(|g| g.rows.get(index))
                    .ok_or_else(|| MatchError::Sink(format!("missing {group} row {index}")))?;
                sink.row_recorded(group, row, conflicts)
                    .map_err(|err| MatchError::Sink(err.to_string()))?;
            }
            Ok(())
        })?;

        let report = aggregator.finalize();
        sink.finish(&report)
            .map_err(|err| MatchError::Sink(err.to_string()))?;
        Ok(report)
    }
}
