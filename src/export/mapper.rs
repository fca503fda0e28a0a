//! Field mapper: domain rows to canonical records.
//!
//! Rows arrive from the record source as JSON objects keyed by column name.
//! The mapper walks the domain schema in order, coercing each value to its
//! declared type. One malformed row fails only that row; the orchestrator
//! skips it and keeps going.

use crate::domain::schema::{DomainSchema, FieldKind, FieldSpec};
use crate::domain::{CanonicalRecord, FieldValue, MappingError, MappingFailure};

use super::predicate::parse_date;

/// Map one source row to its canonical form.
///
/// A missing optional field maps to `Null`; a missing required field or a
/// present-but-wrong-type value fails the record.
pub fn map_record(
    schema: &DomainSchema,
    row: &serde_json::Value,
) -> Result<CanonicalRecord, MappingError> {
    let object = row.as_object().ok_or(MappingError {
        field: schema.fields[0].name,
        reason: MappingFailure::WrongType { expected: "object" },
    })?;

    let mut fields = Vec::with_capacity(schema.fields.len());
    for spec in schema.fields {
        let value = match object.get(spec.name) {
            None | Some(serde_json::Value::Null) => {
                if spec.required {
                    return Err(MappingError {
                        field: spec.name,
                        reason: MappingFailure::MissingRequired,
                    });
                }
                FieldValue::Null
            }
            Some(raw) => coerce(spec, raw)?,
        };
        fields.push((spec.name, value));
    }

    Ok(CanonicalRecord::new(fields))
}

fn coerce(spec: &FieldSpec, raw: &serde_json::Value) -> Result<FieldValue, MappingError> {
    let wrong_type = || MappingError {
        field: spec.name,
        reason: MappingFailure::WrongType {
            expected: spec.kind.name(),
        },
    };

    match spec.kind {
        FieldKind::Str => raw
            .as_str()
            .map(|s| FieldValue::Str(s.to_string()))
            .ok_or_else(wrong_type),
        FieldKind::Num => raw.as_f64().map(FieldValue::Num).ok_or_else(wrong_type),
        FieldKind::Bool => raw.as_bool().map(FieldValue::Bool).ok_or_else(wrong_type),
        FieldKind::Date => raw
            .as_str()
            .and_then(parse_date)
            .map(FieldValue::Date)
            .ok_or_else(wrong_type),
    }
}
