//! In-process evidence sources with scripted behaviour

use async_trait::async_trait;
use shelf_common::BookRecord;
use shelf_ingest::fusion::Candidate;
use shelf_ingest::sources::{SourceAdapter, SourceOutcome};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns the same candidates for every record
pub struct ScriptedSource {
    pub name: &'static str,
    pub candidates: Vec<Candidate>,
    pub delay: Duration,
}

impl ScriptedSource {
    pub fn new(name: &'static str, candidates: Vec<Candidate>) -> Self {
        Self {
            name,
            candidates,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn query(&self, _record: &BookRecord) -> anyhow::Result<SourceOutcome> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(SourceOutcome::from_candidates(self.candidates.clone()))
    }
}

/// Always fails like an unreachable service
pub struct FailingSource;

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &'static str {
        "Unreachable"
    }

    async fn query(&self, _record: &BookRecord) -> anyhow::Result<SourceOutcome> {
        anyhow::bail!("connection refused")
    }
}

/// Never answers within its own short timeout
pub struct SlowSource {
    pub timeout: Duration,
}

#[async_trait]
impl SourceAdapter for SlowSource {
    fn name(&self) -> &'static str {
        "Slow"
    }

    async fn query(&self, _record: &BookRecord) -> anyhow::Result<SourceOutcome> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(SourceOutcome::NoEvidence)
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

/// Remembers the records it was queried with
#[derive(Clone, Default)]
pub struct RecordingSource {
    pub seen: Arc<Mutex<Vec<BookRecord>>>,
}

impl RecordingSource {
    pub fn seen(&self) -> Vec<BookRecord> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for RecordingSource {
    fn name(&self) -> &'static str {
        "Recorder"
    }

    async fn query(&self, record: &BookRecord) -> anyhow::Result<SourceOutcome> {
        self.seen.lock().unwrap().push(record.clone());
        Ok(SourceOutcome::NoEvidence)
    }
}
