// Reconciliation Orchestrator
//
// Init → {Query → Score → Select → Fuse} per source in priority order →
// Aggregate → Done.
//
// Queries may run concurrently (`QueryMode::Concurrent`) but Score/Select/Fuse
// always run in priority order. A source that errors, times out or returns
// nothing advances the run without touching the record. Cancellation stops
// before the next fusion step; everything fused so far is kept.

pub mod ingest;

use crate::error::ReconcileError;
use crate::fusion::{
    aggregate_confidence, select_best, Confidence, ConflictReport, CorrectionLog, FieldFuser,
    Tier, WorkingRecord,
};
use crate::sources::{RegisteredSource, SourceOutcome};
use futures::stream::{self, FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use shelf_common::config::{DatePolicy, QueryMode};
use shelf_common::BookRecord;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use ingest::{ingest_directory, scan_images, IngestSummary};

/// Orchestrator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOptions {
    pub query_mode: QueryMode,
    pub date_policy: DatePolicy,
    /// Applied to every source that does not set its own timeout
    pub source_timeout: Duration,
    /// Records reconciled at once by `reconcile_batch`
    pub batch_concurrency: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            query_mode: QueryMode::default(),
            date_policy: DatePolicy::default(),
            source_timeout: Duration::from_secs(30),
            batch_concurrency: 4,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Cancelled,
}

/// One selected candidate that was fused into the record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    pub source: String,
    pub tier: Tier,
    pub score: Confidence,
}

/// Final annotated record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub record: BookRecord,
    pub corrections: CorrectionLog,
    pub confidence: Confidence,
    pub contributions: Vec<SourceContribution>,
    pub conflicts: Vec<ConflictReport>,
    pub outcome: Outcome,
}

/// Runs reconciliations over a fixed, ordered set of sources
#[derive(Debug)]
pub struct Reconciler {
    sources: Vec<RegisteredSource>,
    options: ReconcileOptions,
    fuser: FieldFuser,
}

impl Reconciler {
    /// An empty source list is the one fatal configuration error
    pub fn new(
        sources: Vec<RegisteredSource>,
        options: ReconcileOptions,
    ) -> Result<Self, ReconcileError> {
        if sources.is_empty() {
            return Err(ReconcileError::NoSources);
        }

        Ok(Self {
            sources,
            fuser: FieldFuser::new(options.date_policy),
            options,
        })
    }

    pub fn sources(&self) -> &[RegisteredSource] {
        &self.sources
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub async fn reconcile(&self, record: BookRecord) -> Reconciliation {
        self.reconcile_with_cancel(record, &CancellationToken::new())
            .await
    }

    pub async fn reconcile_with_cancel(
        &self,
        record: BookRecord,
        cancel: &CancellationToken,
    ) -> Reconciliation {
        let result = match self.options.query_mode {
            QueryMode::Sequential => self.run_sequential(record, cancel).await,
            QueryMode::Concurrent => self.run_concurrent(record, cancel).await,
        };

        info!(
            id = %result.record.id(),
            title = %result.record.title(),
            confidence = result.confidence,
            sources = result.contributions.len(),
            corrections = result.corrections.len(),
            conflicts = result.conflicts.len(),
            outcome = ?result.outcome,
            "Reconciliation finished"
        );

        result
    }

    /// Each source sees the record as fused by the sources before it
    async fn run_sequential(&self, seed: BookRecord, cancel: &CancellationToken) -> Reconciliation {
        let mut run = RunState::new(seed, self.fuser);

        for source in &self.sources {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.query_source(source, run.working.record()) => Some(outcome),
            };

            let Some(outcome) = outcome else {
                info!(source = source.name(), "Reconciliation cancelled");
                return run.finish(Outcome::Cancelled);
            };
            run.apply(source, outcome);
        }

        run.finish(Outcome::Completed)
    }

    /// All sources are queried with the seed at once; results are fused in
    /// priority order as they become available
    async fn run_concurrent(&self, seed: BookRecord, cancel: &CancellationToken) -> Reconciliation {
        let snapshot = seed.clone();
        let snapshot = &snapshot;
        let mut run = RunState::new(seed, self.fuser);

        let mut pending: FuturesOrdered<_> = self
            .sources
            .iter()
            .map(|source| async move { (source, self.query_source(source, snapshot).await) })
            .collect();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = pending.next() => Some(next),
            };

            match next {
                None => {
                    info!(remaining = pending.len(), "Reconciliation cancelled");
                    return run.finish(Outcome::Cancelled);
                }
                Some(None) => break,
                Some(Some((source, outcome))) => run.apply(source, outcome),
            }
        }

        run.finish(Outcome::Completed)
    }

    /// Query one source; errors and timeouts become `NoEvidence`
    async fn query_source(&self, source: &RegisteredSource, record: &BookRecord) -> SourceOutcome {
        let limit = source
            .adapter()
            .timeout()
            .unwrap_or(self.options.source_timeout);

        match tokio::time::timeout(limit, source.adapter().query(record)).await {
            Ok(Ok(outcome)) => {
                debug!(
                    source = source.name(),
                    candidates = outcome.candidate_count(),
                    "Source answered"
                );
                outcome
            }
            Ok(Err(e)) => {
                warn!(
                    source = source.name(),
                    error = %format!("{:#}", e),
                    "Source failed, treating as no evidence"
                );
                SourceOutcome::NoEvidence
            }
            Err(_) => {
                warn!(
                    source = source.name(),
                    timeout_ms = limit.as_millis() as u64,
                    "Source timed out, treating as no evidence"
                );
                SourceOutcome::NoEvidence
            }
        }
    }

    /// Reconcile independent records concurrently; output order equals input order
    ///
    /// One record's evidence problems never affect another.
    pub async fn reconcile_batch(
        &self,
        records: Vec<BookRecord>,
        cancel: &CancellationToken,
    ) -> Vec<Reconciliation> {
        let total = records.len();
        info!(
            records = total,
            concurrency = self.options.batch_concurrency,
            "Batch reconciliation started"
        );

        let mut results: Vec<(usize, Reconciliation)> =
            stream::iter(records.into_iter().enumerate())
                .map(|(index, record)| async move {
                    (index, self.reconcile_with_cancel(record, cancel).await)
                })
                .buffer_unordered(self.options.batch_concurrency.max(1))
                .collect()
                .await;

        results.sort_by_key(|(index, _)| *index);

        let completed = results
            .iter()
            .filter(|(_, r)| r.outcome == Outcome::Completed)
            .count();
        info!(records = total, completed, "Batch reconciliation finished");

        results.into_iter().map(|(_, r)| r).collect()
    }
}

/// Reconcile one record against an ordered source list with default options
pub async fn reconcile(
    record: BookRecord,
    sources: &[RegisteredSource],
) -> Result<Reconciliation, ReconcileError> {
    let reconciler = Reconciler::new(sources.to_vec(), ReconcileOptions::default())?;
    Ok(reconciler.reconcile(record).await)
}

/// Accumulated state of one run
struct RunState {
    fuser: FieldFuser,
    working: WorkingRecord,
    corrections: CorrectionLog,
    conflicts: Vec<ConflictReport>,
    contributions: Vec<SourceContribution>,
}

impl RunState {
    fn new(seed: BookRecord, fuser: FieldFuser) -> Self {
        Self {
            fuser,
            working: WorkingRecord::new(seed),
            corrections: CorrectionLog::new(),
            conflicts: Vec::new(),
            contributions: Vec::new(),
        }
    }

    /// Score, select and fuse one source's answer
    fn apply(&mut self, source: &RegisteredSource, outcome: SourceOutcome) {
        let SourceOutcome::Candidates(candidates) = outcome else {
            debug!(source = source.name(), "No evidence");
            return;
        };

        let Some(best) = select_best(candidates, self.working.record()) else {
            return;
        };

        info!(
            source = source.name(),
            tier = %source.tier(),
            candidate_source = %best.source,
            score = best.score,
            "Selected candidate"
        );

        let step = self
            .fuser
            .fuse(&self.working, &best, source.tier(), source.name());

        self.working = step.record;
        self.corrections.merge(step.corrections);
        self.conflicts.extend(step.conflicts);
        self.contributions.push(SourceContribution {
            source: source.name().to_string(),
            tier: source.tier(),
            score: best.score,
        });
    }

    fn finish(self, outcome: Outcome) -> Reconciliation {
        let scores: Vec<Confidence> = self.contributions.iter().map(|c| c.score).collect();

        Reconciliation {
            confidence: aggregate_confidence(&scores),
            record: self.working.into_record(),
            corrections: self.corrections,
            contributions: self.contributions,
            conflicts: self.conflicts,
            outcome,
        }
    }
}
