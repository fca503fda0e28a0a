//! Export orchestrator: the pipeline entry point.
//!
//! Stages run strictly in sequence per request: authorize, validate,
//! translate filters, retrieve, map, encode. Authorization always runs
//! first so an unauthorized caller learns nothing about a domain's schema.
//! Mapping failures are recovered per record; every other stage failure
//! aborts the export.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, CanonicalRecord, ExportDomain, ExportFormat, ExportReceipt, ExportRequest,
    Predicate, Principal, RecordCursor, RecordSource, SourceError,
};
use crate::export::encoder::{EncodeContext, encoder_for};
use crate::export::{encode_all, map_record, translate};

/// Records per streamed chunk; bounds how much encoded output sits in the
/// channel at once.
const STREAM_CHUNK_RECORDS: usize = 100;

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Hard upper bound on retrieved records; exceeding it is
    /// `ResultTooLarge`, never truncation
    pub max_records: usize,
    /// Exports at or above this many mapped records stream their CSV/JSON
    /// output instead of buffering it
    pub stream_threshold: usize,
    /// Cursor fetch granularity
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            stream_threshold: 1_000,
            batch_size: 500,
        }
    }
}

/// Encoded artifact: either a complete buffer or a channel of byte chunks
#[derive(Debug)]
pub enum ExportBody {
    Buffered(Vec<u8>),
    Streamed(mpsc::Receiver<Result<Vec<u8>, std::io::Error>>),
}

/// A finished export: metadata plus the artifact bytes
#[derive(Debug)]
pub struct ExportOutput {
    pub receipt: ExportReceipt,
    pub body: ExportBody,
}

/// Shared export pipeline, parameterized by domain at call time
pub struct ExportOrchestrator {
    source: Arc<dyn RecordSource>,
    config: ExportConfig,
}

impl ExportOrchestrator {
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>, config: ExportConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Run the full pipeline for one request.
    #[instrument(skip(self, request, principal), fields(domain = %request.domain, format = %request.format, principal = %principal.id))]
    pub async fn export(
        &self,
        request: &ExportRequest,
        principal: &Principal,
    ) -> Result<ExportOutput, AppError> {
        // Authorization first, before validation or any data access
        let capability = request.domain.capability();
        if !principal.has_capability(capability) {
            warn!(capability = %capability, "export denied");
            return Err(AppError::Forbidden {
                capability: capability.to_string(),
            });
        }

        // Shape validation, then schema-level filter validation
        request.validate().map_err(|errors| {
            let field = errors
                .field_errors()
                .into_iter()
                .next()
                .map(|(name, _)| name.to_string());
            AppError::InvalidRequest {
                field_path: field,
                message: errors.to_string(),
            }
        })?;
        let schema = request.domain.schema();
        request.check_against_schema(schema)?;

        // Filter translation is total over the validated field set
        let predicate = translate(schema, &request.filters)?;

        // Retrieval, bounded; probe one past the limit to detect overflow
        let limit = request
            .limit
            .map(|l| l as usize)
            .unwrap_or(self.config.max_records)
            .min(self.config.max_records);
        let rows = self
            .retrieve(request.domain, &predicate, limit)
            .await?;

        // Per-record mapping; a malformed row is skipped, not fatal
        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in &rows {
            match map_record(schema, row) {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    warn!(field = err.field, error = %err, "skipping unmappable record");
                }
            }
        }
        if skipped > 0 {
            warn!(
                skipped = skipped,
                mapped = records.len(),
                "export completed with partial mapping failures"
            );
        }

        let generated_at = Utc::now();
        let ctx = EncodeContext {
            schema,
            generated_at,
            record_count: records.len(),
        };
        let mut receipt = ExportReceipt {
            domain: request.domain,
            format: request.format,
            record_count: records.len(),
            skipped_count: skipped,
            byte_length: None,
            generated_at,
        };

        // PDF needs its total count up front and stays buffered; large
        // CSV/JSON exports stream chunk by chunk
        let body = if request.format != ExportFormat::Pdf
            && records.len() >= self.config.stream_threshold
        {
            info!(records = records.len(), "streaming export output");
            ExportBody::Streamed(spawn_stream_encoder(request.format, ctx, records))
        } else {
            let bytes = encode_all(request.format, &ctx, &records)
                .map_err(|e| AppError::Encoding(e.to_string()))?;
            receipt.byte_length = Some(bytes.len() as u64);
            ExportBody::Buffered(bytes)
        };

        info!(
            records = receipt.record_count,
            skipped = receipt.skipped_count,
            "export complete"
        );
        Ok(ExportOutput { receipt, body })
    }

    /// Open a cursor (retrying a transient open failure once) and drain it.
    ///
    /// The cursor is dropped on every exit path, which releases the
    /// retrieval handle even when this future is cancelled mid-await.
    async fn retrieve(
        &self,
        domain: ExportDomain,
        predicate: &Predicate,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        // Saturate rather than wrap when the configured bound is extreme
        let probe_limit = i64::try_from(limit)
            .unwrap_or(i64::MAX)
            .saturating_add(1);
        let mut cursor = self.open_with_retry(domain, predicate, probe_limit).await?;

        let mut rows: Vec<serde_json::Value> = Vec::new();
        loop {
            let batch = cursor
                .next_batch(self.config.batch_size)
                .await
                .map_err(AppError::from)?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
            if rows.len() > limit {
                warn!(limit = limit, "retrieval exceeded export bound");
                return Err(AppError::ResultTooLarge { limit });
            }
        }
        Ok(rows)
    }

    async fn open_with_retry(
        &self,
        domain: ExportDomain,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Box<dyn RecordCursor>, AppError> {
        match self.source.open(domain, predicate, limit).await {
            Ok(cursor) => Ok(cursor),
            Err(SourceError::Transient(msg)) => {
                warn!(error = %msg, "transient source failure, retrying once");
                self.source
                    .open(domain, predicate, limit)
                    .await
                    .map_err(AppError::from)
            }
            Err(err @ SourceError::Fatal(_)) => Err(err.into()),
        }
    }
}

/// Drive an encoder record by record into a bounded channel.
///
/// If the receiver goes away (caller disconnect) the send fails and the
/// producer stops; an encoder failure is forwarded as an error chunk so the
/// connection aborts instead of ending in a truncated 200.
fn spawn_stream_encoder(
    format: ExportFormat,
    ctx: EncodeContext,
    records: Vec<CanonicalRecord>,
) -> mpsc::Receiver<Result<Vec<u8>, std::io::Error>> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut encoder = encoder_for(format);
        let mut buf = Vec::new();

        if let Err(err) = encoder.begin(&ctx, &mut buf) {
            let _ = tx.send(Err(std::io::Error::other(err.to_string()))).await;
            return;
        }

        for (i, record) in records.iter().enumerate() {
            if let Err(err) = encoder.record(record, &mut buf) {
                warn!(error = %err, "stream encoding failed mid-artifact");
                let _ = tx.send(Err(std::io::Error::other(err.to_string()))).await;
                return;
            }
            if (i + 1) % STREAM_CHUNK_RECORDS == 0 && !buf.is_empty() {
                if tx.send(Ok(std::mem::take(&mut buf))).await.is_err() {
                    // Receiver dropped: the caller disconnected
                    return;
                }
            }
        }

        if let Err(err) = encoder.finish(&mut buf) {
            let _ = tx.send(Err(std::io::Error::other(err.to_string()))).await;
            return;
        }
        if !buf.is_empty() {
            let _ = tx.send(Ok(buf)).await;
        }
    });

    rx
}
