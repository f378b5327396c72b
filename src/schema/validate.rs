//! Boundary validation for catalog rows
//!
//! Rows travel as JSON objects keyed by column name. Before a row reaches a
//! store it is checked against its [`TableDef`]: unknown columns, missing
//! required attributes, enum labels, value types and text lengths. Foreign
//! key resolution needs the store and happens there.

use crate::error::{CatalogError, Result};
use crate::schema::tables::{ColumnDef, ColumnType, ForeignKeyDef, Table, TableDef};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

/// A row, or a set of column changes, keyed by column name
pub type Record = Map<String, Value>;

/// Column holding the surrogate key
pub const ID_COLUMN: &str = "id";

/// Validate a row for insertion and return it with values in canonical form.
pub fn validate_insert(table: Table, record: &Record) -> Result<Record> {
    let def = table.def();
    let normalized = validate_columns(def, record)?;

    for column in def.required_columns() {
        if normalized.get(column.name).map_or(true, Value::is_null) {
            return Err(CatalogError::MissingRequired {
                table: def.name.to_string(),
                column: column.name.to_string(),
            });
        }
    }

    Ok(normalized)
}

/// Validate a partial update. Only the supplied columns are checked.
pub fn validate_update(table: Table, changes: &Record) -> Result<Record> {
    let def = table.def();
    let normalized = validate_columns(def, changes)?;

    for (name, value) in &normalized {
        if value.is_null() && def.column(name).is_some_and(|c| c.required) {
            return Err(CatalogError::MissingRequired {
                table: def.name.to_string(),
                column: name.clone(),
            });
        }
    }

    Ok(normalized)
}

/// Non-null foreign key values carried by a record
pub fn foreign_key_values(table: Table, record: &Record) -> Vec<(&'static ForeignKeyDef, i64)> {
    table
        .def()
        .foreign_keys
        .iter()
        .filter_map(|fk| record.get(fk.column).and_then(Value::as_i64).map(|id| (fk, id)))
        .collect()
}

fn validate_columns(def: &TableDef, record: &Record) -> Result<Record> {
    let mut normalized = Record::new();

    for (name, value) in record {
        if name == ID_COLUMN {
            return Err(CatalogError::InvalidValue {
                table: def.name.to_string(),
                column: name.clone(),
                reason: "surrogate keys are assigned by the store".to_string(),
            });
        }

        let column = def.column(name).ok_or_else(|| CatalogError::UnknownColumn {
            table: def.name.to_string(),
            column: name.clone(),
        })?;

        normalized.insert(name.clone(), normalize_value(def, column, value)?);
    }

    Ok(normalized)
}

/// Check one value against its column type. Timestamps come back as RFC 3339 UTC.
pub fn normalize_value(def: &TableDef, column: &ColumnDef, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let invalid = |reason: String| CatalogError::InvalidValue {
        table: def.name.to_string(),
        column: column.name.to_string(),
        reason,
    };

    match column.column_type {
        ColumnType::BigInt => {
            value.as_i64().ok_or_else(|| invalid("expected a 64-bit integer".to_string()))?;
        }
        ColumnType::Integer => {
            value
                .as_i64()
                .filter(|n| i32::try_from(*n).is_ok())
                .ok_or_else(|| invalid("expected a 32-bit integer".to_string()))?;
        }
        ColumnType::Numeric => {
            if !value.is_number() {
                return Err(invalid("expected a number".to_string()));
            }
        }
        ColumnType::Boolean => {
            if !value.is_boolean() {
                return Err(invalid("expected a boolean".to_string()));
            }
        }
        ColumnType::Text(max) => {
            let text = value.as_str().ok_or_else(|| invalid("expected a string".to_string()))?;
            check_length(text, max).map_err(invalid)?;
        }
        ColumnType::CountryCode => {
            let text = value.as_str().ok_or_else(|| invalid("expected a string".to_string()))?;
            if text.chars().count() != 2 {
                return Err(invalid(format!("expected a two-character country code, got '{}'", text)));
            }
        }
        ColumnType::Timestamp => {
            let text = value
                .as_str()
                .ok_or_else(|| invalid("expected an RFC 3339 timestamp".to_string()))?;
            let parsed = parse_timestamp(text).ok_or_else(|| invalid(format!("unparseable timestamp '{}'", text)))?;
            return Ok(Value::String(parsed.to_rfc3339()));
        }
        ColumnType::Enum(enum_type) => {
            let label = value.as_str().filter(|s| enum_type.contains(s));
            if label.is_none() {
                return Err(CatalogError::InvalidEnumValue {
                    table: def.name.to_string(),
                    column: column.name.to_string(),
                    enum_name: enum_type.name.to_string(),
                    value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
                });
            }
        }
        ColumnType::TextArray(max) => {
            let items = value.as_array().ok_or_else(|| invalid("expected an array of strings".to_string()))?;
            for (idx, item) in items.iter().enumerate() {
                let text = item
                    .as_str()
                    .ok_or_else(|| invalid(format!("element {} is not a string", idx)))?;
                check_length(text, max).map_err(|reason| invalid(format!("element {}: {}", idx, reason)))?;
            }
        }
        ColumnType::Document => {
            if !value.is_object() {
                return Err(invalid("expected a key-value document".to_string()));
            }
        }
    }

    Ok(value.clone())
}

fn check_length(text: &str, max: usize) -> std::result::Result<(), String> {
    let len = text.chars().count();
    if len > max {
        Err(format!("{} characters exceeds limit of {}", len, max))
    } else {
        Ok(())
    }
}

/// RFC 3339 timestamps, or plain dates taken as midnight UTC
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_missing_required_on_insert() {
        let err = validate_insert(Table::ComputeInstance, &record(json!({ "platform_id": 1 }))).unwrap_err();
        assert!(matches!(err, CatalogError::MissingRequired { ref column, .. } if column == "vcpus"));

        let err = validate_insert(Table::PlatformInformation, &record(json!({ "platform_name": null }))).unwrap_err();
        assert_eq!(err.code(), "missing_required_attribute");
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let row = validate_insert(Table::PlatformInformation, &record(json!({ "platform_name": "Acme Cloud" }))).unwrap();
        assert_eq!(row.len(), 1);

        let row = validate_insert(Table::SecurityFeatures, &Record::new()).unwrap();
        assert!(row.is_empty());
    }

    #[test]
    fn test_invalid_enum_value() {
        let err = validate_insert(
            Table::PlatformInformation,
            &record(json!({ "platform_name": "Acme", "platform_type": "mainframe" })),
        )
        .unwrap_err();

        match err {
            CatalogError::InvalidEnumValue { enum_name, value, .. } => {
                assert_eq!(enum_name, "platform_types");
                assert_eq!(value, "mainframe");
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = validate_insert(
            Table::PricingModel,
            &record(json!({ "compute_instance_id": 1, "billing_increment": 7 })),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_enum_value");
    }

    #[test]
    fn test_unknown_column_and_client_id() {
        let err = validate_insert(
            Table::SupportTier,
            &record(json!({ "platform_id": 1, "sla": "gold" })),
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_column");

        let err = validate_insert(
            Table::SupportTier,
            &record(json!({ "id": 9, "platform_id": 1 })),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_value");
    }

    #[test]
    fn test_value_types() {
        let long_name = "x".repeat(101);
        let cases = vec![
            (Table::ComputeInstance, json!({ "platform_id": 1, "vcpus": "four" })),
            (Table::ComputeInstance, json!({ "platform_id": 1, "vcpus": 4_000_000_000_i64 })),
            (Table::ComputeInstance, json!({ "platform_id": 1, "vcpus": 4, "memory_gb": "16" })),
            (Table::ComplianceCertification, json!({ "platform_id": 1, "certification_name": long_name })),
            (Table::GeographicRegions, json!({ "platform_id": 1, "region_name": "Frankfurt", "region_code": "eu-central-1", "country": "DEU" })),
            (Table::SupportTier, json!({ "platform_id": 1, "channels": ["email", 3] })),
            (Table::ProprietaryHardware, json!({ "platform_id": 1, "specifications": [1, 2] })),
            (Table::PlatformInformation, json!({ "platform_name": "Acme", "founded_date": "last year" })),
        ];

        for (table, row) in cases {
            let err = validate_insert(table, &record(row.clone())).unwrap_err();
            assert_eq!(err.code(), "invalid_value", "{} {}", table, row);
        }
    }

    #[test]
    fn test_timestamps_are_normalized() {
        let row = validate_insert(
            Table::PlatformInformation,
            &record(json!({ "platform_name": "Acme", "founded_date": "2006-03-14" })),
        )
        .unwrap();
        assert_eq!(row["founded_date"], json!("2006-03-14T00:00:00+00:00"));

        let row = validate_insert(
            Table::PlatformInformation,
            &record(json!({ "platform_name": "Acme", "last_updated": "2024-05-01T12:00:00+02:00" })),
        )
        .unwrap();
        assert_eq!(row["last_updated"], json!("2024-05-01T10:00:00+00:00"));
    }

    #[test]
    fn test_update_checks_only_changed_columns() {
        let changes = validate_update(Table::ComputeInstance, &record(json!({ "gpu_count": 8 }))).unwrap();
        assert_eq!(changes.len(), 1);

        let err = validate_update(Table::ComputeInstance, &record(json!({ "vcpus": null }))).unwrap_err();
        assert_eq!(err.code(), "missing_required_attribute");

        let err = validate_update(Table::PricingModel, &record(json!({ "pricing_type": "free" }))).unwrap_err();
        assert_eq!(err.code(), "invalid_enum_value");
    }

    #[test]
    fn test_foreign_key_values() {
        let row = record(json!({ "platform_name": "Acme", "networking_id": 3, "security_id": null }));
        let refs = foreign_key_values(Table::PlatformInformation, &row);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0.references, Table::NetworkCapabilities);
        assert_eq!(refs[0].1, 3);
    }
}
