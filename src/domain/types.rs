//! Core export types with validation support.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::error::AppError;
use super::schema::DomainSchema;

/// Regulated business area with its own record schema
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportDomain {
    /// National-bank foreign exchange rates
    Fx,
    /// Customs declarations
    Customs,
    /// ECTA quality certificates
    Quality,
    /// ECX lot verification results
    LotVerification,
    /// Cross-service trade export register
    Generic,
}

impl ExportDomain {
    pub const ALL: [ExportDomain; 5] = [
        Self::Fx,
        Self::Customs,
        Self::Quality,
        Self::LotVerification,
        Self::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fx => "fx",
            Self::Customs => "customs",
            Self::Quality => "quality",
            Self::LotVerification => "lot_verification",
            Self::Generic => "generic",
        }
    }

    /// Human-readable label for document headers
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fx => "FX Rates",
            Self::Customs => "Customs Declarations",
            Self::Quality => "Quality Certificates",
            Self::LotVerification => "Lot Verification",
            Self::Generic => "Trade Exports",
        }
    }

    /// Capability a principal must hold to export this domain
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Fx => "fx:export",
            Self::Customs => "customs:export",
            Self::Quality => "quality:export",
            Self::LotVerification => "lots:export",
            Self::Generic => "trade:export",
        }
    }
}

impl std::str::FromStr for ExportDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fx" => Ok(Self::Fx),
            "customs" => Ok(Self::Customs),
            "quality" => Ok(Self::Quality),
            "lot_verification" => Ok(Self::LotVerification),
            "generic" => Ok(Self::Generic),
            _ => Err(format!("Invalid export domain: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output artifact format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        self.as_str()
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            _ => Err(format!("Invalid export format: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed value of a canonical field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Num(f64),
    Date(DateTime<Utc>),
    Bool(bool),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON rendering; dates become RFC 3339 strings
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Null => serde_json::Value::Null,
        }
    }

    /// Plain-text rendering for CSV cells and PDF rows; null is empty
    pub fn to_plain(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Num(n) => format!("{}", n),
            Self::Date(d) => d.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Bool(b) => b.to_string(),
            Self::Null => String::new(),
        }
    }
}

/// Flat, format-agnostic representation of one exported row.
///
/// Field order follows the domain schema; produced once by the mapper and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    fields: Vec<(&'static str, FieldValue)>,
}

impl CanonicalRecord {
    pub fn new(fields: Vec<(&'static str, FieldValue)>) -> Self {
        debug_assert!(
            {
                let mut names: Vec<_> = fields.iter().map(|(n, _)| *n).collect();
                names.sort_unstable();
                names.windows(2).all(|w| w[0] != w[1])
            },
            "field names must be unique within a record"
        );
        Self { fields }
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One filter constraint: equality, set membership, or a min/max range.
///
/// Exactly one of the three shapes must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct FilterConstraint {
    /// Equality match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<serde_json::Value>,
    /// Set membership
    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<serde_json::Value>>,
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<serde_json::Value>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<serde_json::Value>,
}

impl FilterConstraint {
    /// A constraint is well-formed when it is exactly one of eq / in / range
    pub fn is_well_formed(&self) -> bool {
        let eq = self.eq.is_some();
        let set = self.one_of.is_some();
        let range = self.min.is_some() || self.max.is_some();
        matches!(
            (eq, set, range),
            (true, false, false) | (false, true, false) | (false, false, true)
        )
    }
}

/// An export request, created per HTTP call and discarded after the
/// response is sent.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ExportRequest {
    /// Domain whose records are exported
    pub domain: ExportDomain,
    /// Requested output format
    pub format: ExportFormat,
    /// Field name -> constraint; keys must belong to the domain schema
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConstraint>,
    /// Optional caller-supplied cap, bounded by the configured maximum
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl ExportRequest {
    pub fn new(domain: ExportDomain, format: ExportFormat) -> Self {
        Self {
            domain,
            format,
            filters: BTreeMap::new(),
            limit: None,
        }
    }

    /// Check the request against its domain schema.
    ///
    /// Surfaces the first violation's field path, matching the behavior of
    /// the validation middleware these services share.
    pub fn check_against_schema(&self, schema: &DomainSchema) -> Result<(), AppError> {
        if !schema.supports_format(self.format) {
            return Err(AppError::invalid_field(
                "format",
                format!(
                    "Format '{}' is not supported for domain '{}'",
                    self.format, self.domain
                ),
            ));
        }
        for (name, constraint) in &self.filters {
            if schema.field(name).is_none() {
                return Err(AppError::invalid_field(
                    format!("filters.{}", name),
                    format!("Unknown field '{}' for domain '{}'", name, self.domain),
                ));
            }
            if !constraint.is_well_formed() {
                return Err(AppError::invalid_field(
                    format!("filters.{}", name),
                    "Constraint must be exactly one of eq, in, or min/max",
                ));
            }
        }
        Ok(())
    }
}

/// Metadata describing a finished export; owned by the caller once returned
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExportReceipt {
    pub domain: ExportDomain,
    pub format: ExportFormat,
    /// Number of successfully mapped records in the artifact
    pub record_count: usize,
    /// Records skipped due to per-record mapping failures
    pub skipped_count: usize,
    /// Encoded size; unknown when the artifact is streamed
    pub byte_length: Option<u64>,
    pub generated_at: DateTime<Utc>,
}

/// Authenticated caller identity plus its authorization claims.
///
/// Verified by the upstream gateway; this service only reads the role set
/// and never persists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.roles.iter().any(|r| r == capability)
    }
}

/// A single field condition translated from a filter constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(FieldValue),
    In(Vec<FieldValue>),
    Range {
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    },
}

/// Translated, domain-specific query constraint handed to a record source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<(&'static str, Condition)>,
}

impl Predicate {
    pub fn new(clauses: Vec<(&'static str, Condition)>) -> Self {
        Self { clauses }
    }

    pub fn clauses(&self) -> &[(&'static str, Condition)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Structured error body produced for every fatal outcome
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable error code, e.g. "FORBIDDEN"
    #[schema(example = "INVALID_REQUEST")]
    pub code: String,
    /// Caller-safe message
    pub message: String,
    /// Offending field for validation failures
    #[serde(rename = "fieldPath", default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status
    pub status: HealthStatus,
    /// Record source (database) status
    pub record_source: HealthStatus,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(record_source: HealthStatus) -> Self {
        Self {
            status: record_source,
            record_source,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
