//! Format encoders.
//!
//! Each encoder is an incremental producer: `begin` emits any prologue,
//! `record` appends one row's bytes, `finish` emits the epilogue. Callers
//! may flush the output buffer between calls, which is how streamed CSV and
//! JSON responses bound their peak memory. The PDF summary needs the total
//! record count in its header, so it assembles its document in `finish` and
//! is exempt from streaming.

pub mod csv;
pub mod json;
pub mod pdf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::schema::DomainSchema;
use crate::domain::{CanonicalRecord, ExportFormat};

pub use csv::CsvEncoder;
pub use json::JsonEncoder;
pub use pdf::PdfSummaryEncoder;

/// Encoding failure; encoders are total over well-formed canonical records,
/// so any error here indicates a defect.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed canonical record: {0}")]
    Malformed(String),
}

/// Per-export context available to every encoder
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext {
    pub schema: &'static DomainSchema,
    pub generated_at: DateTime<Utc>,
    /// Total mapped records; known before encoding starts
    pub record_count: usize,
}

/// Incremental serializer for one output format
pub trait FormatEncoder: Send {
    fn begin(&mut self, ctx: &EncodeContext, out: &mut Vec<u8>) -> Result<(), EncodeError>;
    fn record(&mut self, record: &CanonicalRecord, out: &mut Vec<u8>) -> Result<(), EncodeError>;
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), EncodeError>;
}

/// Closed dispatch over the format set
pub fn encoder_for(format: ExportFormat) -> Box<dyn FormatEncoder> {
    match format {
        ExportFormat::Csv => Box::new(CsvEncoder::new()),
        ExportFormat::Json => Box::new(JsonEncoder::new()),
        ExportFormat::Pdf => Box::new(PdfSummaryEncoder::new()),
    }
}

/// Encode a full record sequence into one buffer (the non-streamed path).
pub fn encode_all(
    format: ExportFormat,
    ctx: &EncodeContext,
    records: &[CanonicalRecord],
) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = encoder_for(format);
    let mut out = Vec::new();
    encoder.begin(ctx, &mut out)?;
    for record in records {
        encoder.record(record, &mut out)?;
    }
    encoder.finish(&mut out)?;
    Ok(out)
}

/// Reject records whose shape departs from the schema; encoding a record
/// with a stray field count would silently misalign columns.
pub(crate) fn check_shape(
    ctx: &EncodeContext,
    record: &CanonicalRecord,
) -> Result<(), EncodeError> {
    if record.len() != ctx.schema.fields.len() {
        return Err(EncodeError::Malformed(format!(
            "record has {} fields, schema '{}' declares {}",
            record.len(),
            ctx.schema.domain,
            ctx.schema.fields.len()
        )));
    }
    Ok(())
}
