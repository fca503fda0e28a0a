//! Filter-to-predicate translation.
//!
//! Turns the request's validated filter map into a typed [`Predicate`] the
//! record source can execute. Translation is total over the declared field
//! set: the request has already been checked against the schema, so an
//! unknown field here is a programming error, not a caller error.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::schema::{DomainSchema, FieldKind, FieldSpec};
use crate::domain::{AppError, Condition, FieldValue, FilterConstraint, Predicate};

/// Translate the filter map into a predicate over schema fields.
pub fn translate(
    schema: &DomainSchema,
    filters: &BTreeMap<String, FilterConstraint>,
) -> Result<Predicate, AppError> {
    let mut clauses = Vec::with_capacity(filters.len());

    for (name, constraint) in filters {
        let spec = schema.field(name).ok_or_else(|| {
            // Validation guarantees filter keys are schema fields; reaching
            // this branch means the orchestrator skipped validation.
            AppError::Internal(format!(
                "filter field '{}' passed validation but is not in the {} schema",
                name, schema.domain
            ))
        })?;

        let condition = if let Some(eq) = &constraint.eq {
            Condition::Eq(coerce(spec, eq, &path(name, "eq"))?)
        } else if let Some(values) = &constraint.one_of {
            if values.is_empty() {
                return Err(AppError::invalid_field(
                    path(name, "in"),
                    "Set membership constraint must not be empty",
                ));
            }
            let mut coerced = Vec::with_capacity(values.len());
            for value in values {
                coerced.push(coerce(spec, value, &path(name, "in"))?);
            }
            Condition::In(coerced)
        } else {
            let min = constraint
                .min
                .as_ref()
                .map(|v| coerce(spec, v, &path(name, "min")))
                .transpose()?;
            let max = constraint
                .max
                .as_ref()
                .map(|v| coerce(spec, v, &path(name, "max")))
                .transpose()?;
            Condition::Range { min, max }
        };

        clauses.push((spec.name, condition));
    }

    Ok(Predicate::new(clauses))
}

fn path(field: &str, part: &str) -> String {
    format!("filters.{}.{}", field, part)
}

/// Coerce one JSON filter value to the field's declared type.
fn coerce(
    spec: &FieldSpec,
    value: &serde_json::Value,
    field_path: &str,
) -> Result<FieldValue, AppError> {
    let mismatch = || {
        AppError::invalid_field(
            field_path.to_string(),
            format!("Expected a {} value for '{}'", spec.kind.name(), spec.name),
        )
    };

    match spec.kind {
        FieldKind::Str => value
            .as_str()
            .map(|s| FieldValue::Str(s.to_string()))
            .ok_or_else(mismatch),
        FieldKind::Num => value.as_f64().map(FieldValue::Num).ok_or_else(mismatch),
        FieldKind::Bool => value.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
        FieldKind::Date => {
            let raw = value.as_str().ok_or_else(mismatch)?;
            parse_date(raw).map(FieldValue::Date).ok_or_else(|| {
                AppError::invalid_field(
                    field_path.to_string(),
                    format!("'{}' is not an RFC 3339 timestamp or YYYY-MM-DD date", raw),
                )
            })
        }
    }
}

/// Accepts full RFC 3339 timestamps and bare dates (midnight UTC).
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExportDomain;
    use serde_json::json;

    fn filters_of(entries: Vec<(&str, FilterConstraint)>) -> BTreeMap<String, FilterConstraint> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_translate_equality_filter() {
        let schema = ExportDomain::Fx.schema();
        let filters = filters_of(vec![(
            "currency_code",
            FilterConstraint {
                eq: Some(json!("USD")),
                ..Default::default()
            },
        )]);

        let predicate = translate(schema, &filters).unwrap();
        assert_eq!(predicate.clauses().len(), 1);
        assert_eq!(
            predicate.clauses()[0],
            (
                "currency_code",
                Condition::Eq(FieldValue::Str("USD".to_string()))
            )
        );
    }

    #[test]
    fn test_translate_date_range_filter() {
        let schema = ExportDomain::Fx.schema();
        let filters = filters_of(vec![(
            "rate_date",
            FilterConstraint {
                min: Some(json!("2024-01-01")),
                max: Some(json!("2024-06-30T23:59:59Z")),
                ..Default::default()
            },
        )]);

        let predicate = translate(schema, &filters).unwrap();
        let (name, condition) = &predicate.clauses()[0];
        assert_eq!(*name, "rate_date");
        match condition {
            Condition::Range { min, max } => {
                assert!(matches!(min, Some(FieldValue::Date(_))));
                assert!(matches!(max, Some(FieldValue::Date(_))));
            }
            other => panic!("expected range condition, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_set_membership_filter() {
        let schema = ExportDomain::Generic.schema();
        let filters = filters_of(vec![(
            "status",
            FilterConstraint {
                one_of: Some(vec![json!("FX_APPROVED"), json!("CUSTOMS_CLEARED")]),
                ..Default::default()
            },
        )]);

        let predicate = translate(schema, &filters).unwrap();
        match &predicate.clauses()[0].1 {
            Condition::In(values) => assert_eq!(values.len(), 2),
            other => panic!("expected set condition, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_carries_field_path() {
        let schema = ExportDomain::Fx.schema();
        let filters = filters_of(vec![(
            "buying_rate",
            FilterConstraint {
                eq: Some(json!("not-a-number")),
                ..Default::default()
            },
        )]);

        let err = translate(schema, &filters).unwrap_err();
        assert_eq!(err.field_path(), Some("filters.buying_rate.eq"));
    }

    #[test]
    fn test_empty_set_constraint_is_rejected() {
        let schema = ExportDomain::Generic.schema();
        let filters = filters_of(vec![(
            "status",
            FilterConstraint {
                one_of: Some(vec![]),
                ..Default::default()
            },
        )]);

        let err = translate(schema, &filters).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest { .. }));
    }

    #[test]
    fn test_unknown_field_is_a_programming_error() {
        let schema = ExportDomain::Fx.schema();
        let filters = filters_of(vec![(
            "not_a_field",
            FilterConstraint {
                eq: Some(json!("x")),
                ..Default::default()
            },
        )]);

        let err = translate(schema, &filters).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("2024-03-15").is_some());
        assert!(parse_date("2024-03-15T10:30:00Z").is_some());
        assert!(parse_date("15/03/2024").is_none());
    }
}
