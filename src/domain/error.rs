//! Error taxonomy for the export pipeline.
//!
//! Every failure that can surface to a caller is classified into one of the
//! variants below; internal detail (query text, cursor state) stays in the
//! tracing logs and never reaches the response body.

use thiserror::Error;

/// Failures reported by a record source.
///
/// Transient conditions (connection reset, pool exhaustion) are retried at
/// most once by the orchestrator; everything else is fatal to the request.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Retryable condition such as a dropped connection
    #[error("transient record source failure: {0}")]
    Transient(String),
    /// Non-retryable source failure
    #[error("record source failure: {0}")]
    Fatal(String),
}

/// Database-level errors from the Postgres record source
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("database query error: {0}")]
    Query(String),
    #[error("database migration error: {0}")]
    Migration(String),
}

/// A single record could not be mapped to its canonical form.
///
/// Recovered per-record by the orchestrator: the record is skipped and
/// logged, the export continues.
#[derive(Debug, Error)]
#[error("cannot map field '{field}': {reason}")]
pub struct MappingError {
    pub field: &'static str,
    pub reason: MappingFailure,
}

/// Why a field failed to map
#[derive(Debug, Error)]
pub enum MappingFailure {
    #[error("required field is missing")]
    MissingRequired,
    #[error("value has the wrong type (expected {expected})")]
    WrongType { expected: &'static str },
}

/// Application-level error taxonomy, mapped 1:1 to HTTP statuses by the API
/// layer (see `api::handlers`).
#[derive(Debug, Error)]
pub enum AppError {
    /// Principal lacks the capability required for the requested domain (403)
    #[error("missing capability '{capability}'")]
    Forbidden { capability: String },

    /// Request shape or filter validation failed (400)
    #[error("invalid request: {message}")]
    InvalidRequest {
        field_path: Option<String>,
        message: String,
    },

    /// Retrieval exceeded the configured bound; never silently truncated (413)
    #[error("result exceeds the export limit of {limit} records")]
    ResultTooLarge { limit: usize },

    /// Record source exhausted its retry budget (503)
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    /// Encoder failed over well-formed canonical records; indicates a defect (500)
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Identity headers missing or malformed (401)
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Infrastructure database error (500/503)
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Startup configuration error (500)
    #[error("configuration error: {0}")]
    Config(String),

    /// Unclassified internal failure (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for validation failures with a field path
    pub fn invalid_field(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field_path: Some(field_path.into()),
            message: message.into(),
        }
    }

    /// Validation failure without a specific field
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field_path: None,
            message: message.into(),
        }
    }

    /// Stable error code for the response body
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::ResultTooLarge { .. } => "RESULT_TOO_LARGE",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::Authentication(_) => "UNAUTHORIZED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Field path for the response body, when one applies
    #[must_use]
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest { field_path, .. } => field_path.as_deref(),
            _ => None,
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Transient(msg) | SourceError::Fatal(msg) => Self::Unavailable(msg),
        }
    }
}
