//! Domain traits defining contracts for external collaborators.

use async_trait::async_trait;

use super::error::{AppError, SourceError};
use super::types::{ExportDomain, Predicate};

/// Per-domain data accessor owned by each microservice.
///
/// `open` acquires exactly one logical retrieval handle; the returned cursor
/// releases it when dropped, which covers every exit path including
/// cancellation.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Open a cursor over the records matching `predicate`, bounded by
    /// `limit`. Rows come back in the source's stable order (chronological
    /// or primary-key); the pipeline never re-sorts them.
    async fn open(
        &self,
        domain: ExportDomain,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Box<dyn RecordCursor>, SourceError>;

    /// Check source connectivity
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Open retrieval handle over one export's result set.
///
/// Implementations release their underlying resources on drop.
#[async_trait]
pub trait RecordCursor: Send {
    /// Fetch up to `max` more rows; an empty vector means the cursor is
    /// exhausted. Rows are JSON objects keyed by source column name.
    async fn next_batch(&mut self, max: usize) -> Result<Vec<serde_json::Value>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyCursor;

    #[async_trait]
    impl RecordCursor for EmptyCursor {
        async fn next_batch(&mut self, _max: usize) -> Result<Vec<serde_json::Value>, SourceError> {
            Ok(Vec::new())
        }
    }

    struct EmptySource;

    #[async_trait]
    impl RecordSource for EmptySource {
        async fn open(
            &self,
            _domain: ExportDomain,
            _predicate: &Predicate,
            _limit: i64,
        ) -> Result<Box<dyn RecordCursor>, SourceError> {
            Ok(Box::new(EmptyCursor))
        }

        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_empty_source_yields_no_rows() {
        let source = EmptySource;
        let mut cursor = source
            .open(ExportDomain::Fx, &Predicate::default(), 10)
            .await
            .unwrap();
        assert!(cursor.next_batch(10).await.unwrap().is_empty());
    }
}
