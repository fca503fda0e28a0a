//! Domain layer containing core export types, schemas, traits, and errors.

pub mod error;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{AppError, DatabaseError, MappingError, MappingFailure, SourceError};
pub use schema::{DomainSchema, FieldKind, FieldSpec};
pub use traits::{RecordCursor, RecordSource};
pub use types::{
    CanonicalRecord, Condition, ErrorResponse, ExportDomain, ExportFormat, ExportReceipt,
    ExportRequest, FieldValue, FilterConstraint, HealthResponse, HealthStatus, Predicate,
    Principal,
};
