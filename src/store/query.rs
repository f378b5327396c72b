use crate::error::{CatalogError, Result};
use crate::schema::{normalize_value, ColumnType, Record, Table, ID_COLUMN};
use serde_json::Value;

/// Row predicate over a single column
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value; `Value::Null` matches absent values
    Eq(String, Value),
    /// Case-insensitive substring match on a text column
    Contains(String, String),
    /// Numeric column strictly greater than the bound
    GreaterThan(String, f64),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::Contains(column, _) | Filter::GreaterThan(column, _) => column,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(self.column()).unwrap_or(&Value::Null);

        match self {
            Filter::Eq(_, expected) => match (value, expected) {
                (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
                _ => value == expected,
            },
            Filter::Contains(_, needle) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Filter::GreaterThan(_, bound) => value.as_f64().is_some_and(|n| n > *bound),
        }
    }
}

/// Conjunction of filters with paging. Results are ordered by `id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn contains(mut self, column: &str, needle: &str) -> Self {
        self.filters.push(Filter::Contains(column.to_string(), needle.to_string()));
        self
    }

    pub fn greater_than(mut self, column: &str, bound: f64) -> Self {
        self.filters.push(Filter::GreaterThan(column.to_string(), bound));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Check every filter against `table` and return the query with filter
    /// values in the same canonical form the stores keep.
    pub fn checked(&self, table: Table) -> Result<Query> {
        let def = table.def();
        let mut checked = self.clone();

        for filter in checked.filters.iter_mut() {
            let name = filter.column().to_string();
            let column = if name == ID_COLUMN {
                None
            } else {
                Some(def.column(&name).ok_or_else(|| CatalogError::UnknownColumn {
                    table: def.name.to_string(),
                    column: name.clone(),
                })?)
            };
            let column_type = column.map_or(ColumnType::BigInt, |c| c.column_type);

            let supported = match filter {
                Filter::Eq(_, _) => !matches!(column_type, ColumnType::TextArray(_) | ColumnType::Document),
                Filter::Contains(_, _) => matches!(column_type, ColumnType::Text(_) | ColumnType::CountryCode),
                Filter::GreaterThan(_, _) => matches!(
                    column_type,
                    ColumnType::BigInt | ColumnType::Integer | ColumnType::Numeric
                ),
            };

            if !supported {
                return Err(CatalogError::InvalidValue {
                    table: def.name.to_string(),
                    column: name,
                    reason: format!("{:?} cannot filter a {:?} column", filter, column_type),
                });
            }

            if let Filter::Eq(_, value) = filter {
                match column {
                    Some(column) => *value = normalize_value(def, column, value)?,
                    None if value.is_i64() => {}
                    None => {
                        return Err(CatalogError::InvalidValue {
                            table: def.name.to_string(),
                            column: name,
                            reason: "expected a 64-bit integer".to_string(),
                        })
                    }
                }
            }
        }

        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_eq_filter() {
        let r = row(json!({ "platform_type": "gpu_cloud", "vcpus": 4 }));

        assert!(Filter::Eq("platform_type".to_string(), json!("gpu_cloud")).matches(&r));
        assert!(!Filter::Eq("platform_type".to_string(), json!("hyperscaler")).matches(&r));
        assert!(Filter::Eq("vcpus".to_string(), json!(4.0)).matches(&r));
        assert!(Filter::Eq("parent_company".to_string(), Value::Null).matches(&r));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let r = row(json!({ "platform_name": "Acme Cloud" }));
        assert!(Filter::Contains("platform_name".to_string(), "acme".to_string()).matches(&r));
        assert!(Filter::Contains("platform_name".to_string(), "CLOUD".to_string()).matches(&r));
        assert!(!Filter::Contains("platform_name".to_string(), "edge".to_string()).matches(&r));
        assert!(!Filter::Contains("headquarters".to_string(), "x".to_string()).matches(&r));
    }

    #[test]
    fn test_greater_than() {
        let r = row(json!({ "gpu_count": 8, "memory_gb": null }));
        assert!(Filter::GreaterThan("gpu_count".to_string(), 0.0).matches(&r));
        assert!(!Filter::GreaterThan("gpu_count".to_string(), 8.0).matches(&r));
        assert!(!Filter::GreaterThan("memory_gb".to_string(), 0.0).matches(&r));
    }

    #[test]
    fn test_checked_columns() {
        assert!(Query::new().eq("platform_id", 1).checked(Table::ComputeInstance).is_ok());
        assert!(Query::new().eq("id", 1).checked(Table::ComputeInstance).is_ok());
        assert!(Query::new().greater_than("gpu_count", 0.0).checked(Table::ComputeInstance).is_ok());

        let err = Query::new().eq("nope", 1).checked(Table::ComputeInstance).unwrap_err();
        assert_eq!(err.code(), "unknown_column");

        let err = Query::new()
            .contains("vcpus", "4")
            .checked(Table::ComputeInstance)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_value");

        let err = Query::new()
            .eq("specializations", json!(["ai"]))
            .checked(Table::PlatformInformation)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_value");
    }

    #[test]
    fn test_checked_values() {
        let err = Query::new()
            .eq("platform_type", "mainframe")
            .checked(Table::PlatformInformation)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_enum_value");

        let query = Query::new()
            .eq("founded_date", "2006-03-14")
            .checked(Table::PlatformInformation)
            .unwrap();
        assert_eq!(
            query.filters[0],
            Filter::Eq("founded_date".to_string(), json!("2006-03-14T00:00:00+00:00"))
        );

        assert!(Query::new().eq("id", "seven").checked(Table::SupportTier).is_err());
    }
}
