//! In-memory record source for unit and integration tests.
//!
//! Failure injection mirrors production failure modes: transient open
//! errors (retryable), fatal open errors, and slow batches for
//! cancellation tests. Cursor release is observable through the call
//! recorder.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    AppError, ExportDomain, Predicate, RecordCursor, RecordSource, SourceError,
};

/// Shared counters surfaced to tests; clones observe the same source.
#[derive(Clone, Default)]
pub struct MockCallRecorder {
    open_calls: Arc<AtomicUsize>,
    cursors_released: Arc<AtomicUsize>,
    last_predicate: Arc<Mutex<Option<Predicate>>>,
}

impl MockCallRecorder {
    pub fn open_count(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.cursors_released.load(Ordering::SeqCst)
    }

    pub fn last_predicate(&self) -> Option<Predicate> {
        self.last_predicate.lock().unwrap().clone()
    }
}

/// Configurable in-memory [`RecordSource`].
pub struct MockRecordSource {
    records: Vec<serde_json::Value>,
    recorder: MockCallRecorder,
    transient_failures: AtomicUsize,
    fatal: bool,
    unhealthy: bool,
    batch_delay: Option<Duration>,
}

impl MockRecordSource {
    #[must_use]
    pub fn with_records(records: Vec<serde_json::Value>) -> Self {
        Self {
            records,
            recorder: MockCallRecorder::default(),
            transient_failures: AtomicUsize::new(0),
            fatal: false,
            unhealthy: false,
            batch_delay: None,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::with_records(Vec::new())
    }

    /// Fail the next `count` open calls with a transient error.
    #[must_use]
    pub fn failing_transiently(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every open call with a fatal error.
    #[must_use]
    pub fn failing_fatally(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Report unhealthy from `health_check`.
    #[must_use]
    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    /// Sleep this long before every batch, to hold a cursor open across
    /// a cancellation point.
    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn call_recorder(&self) -> MockCallRecorder {
        self.recorder.clone()
    }
}

#[async_trait]
impl RecordSource for MockRecordSource {
    async fn open(
        &self,
        _domain: ExportDomain,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Box<dyn RecordCursor>, SourceError> {
        self.recorder.open_calls.fetch_add(1, Ordering::SeqCst);
        *self.recorder.last_predicate.lock().unwrap() = Some(predicate.clone());

        if self.fatal {
            return Err(SourceError::Fatal("mock source is broken".to_string()));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SourceError::Transient("mock transient failure".to_string()));
        }

        let rows: VecDeque<_> = self
            .records
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(Box::new(MockCursor {
            rows,
            batch_delay: self.batch_delay,
            released: self.recorder.cursors_released.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.unhealthy {
            return Err(AppError::Unavailable("mock source is down".to_string()));
        }
        Ok(())
    }
}

struct MockCursor {
    rows: VecDeque<serde_json::Value>,
    batch_delay: Option<Duration>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl RecordCursor for MockCursor {
    async fn next_batch(&mut self, max: usize) -> Result<Vec<serde_json::Value>, SourceError> {
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }
        let take = max.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }
}

impl Drop for MockCursor {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
