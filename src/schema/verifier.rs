//! Schema verifier
//!
//! Compares a live database against the table registry: every catalog table
//! and column must exist with the declared type and nullability, and every
//! enum type must carry exactly the declared labels in declaration order.

use crate::error::{CatalogError, Result};
use crate::schema::enums::ENUM_TYPES;
use crate::schema::tables::{ColumnType, Table};
use deadpool_postgres::Pool;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Result of schema verification
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub types: TypeVerification,
    pub tables: TableVerification,
}

impl VerificationResult {
    pub fn new() -> Self {
        Self {
            passed: true,
            types: TypeVerification::default(),
            tables: TableVerification::default(),
        }
    }

    /// Generate a human-readable error log
    pub fn error_log(&self) -> String {
        let mut log = String::new();

        log.push_str("═══════════════════════════════════════════════════════════════\n");
        log.push_str("              CATALOG SCHEMA VERIFICATION FAILED\n");
        log.push_str("═══════════════════════════════════════════════════════════════\n\n");

        if !self.types.missing.is_empty() {
            log.push_str("MISSING ENUM TYPES:\n");
            for t in &self.types.missing {
                log.push_str(&format!("  - {}\n", t));
            }
            log.push('\n');
        }

        if !self.types.label_mismatches.is_empty() {
            log.push_str("ENUM LABEL MISMATCHES:\n");
            for m in &self.types.label_mismatches {
                log.push_str(&format!(
                    "  - {}: expected [{}], found [{}]\n",
                    m.type_name,
                    m.expected.join(", "),
                    m.found.join(", ")
                ));
            }
            log.push('\n');
        }

        if !self.tables.missing.is_empty() {
            log.push_str("MISSING TABLES:\n");
            for t in &self.tables.missing {
                log.push_str(&format!("  - {}\n", t));
            }
            log.push('\n');
        }

        if !self.tables.mismatches.is_empty() {
            log.push_str("TABLE SCHEMA MISMATCHES:\n");
            for m in &self.tables.mismatches {
                log.push_str(&format!("  - {}: {}\n", m.table, m.issue));
            }
            log.push('\n');
        }

        log.push_str("═══════════════════════════════════════════════════════════════\n");

        log
    }
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeVerification {
    pub expected: Vec<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub label_mismatches: Vec<LabelMismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelMismatch {
    pub type_name: String,
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableVerification {
    pub expected: Vec<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub mismatches: Vec<TableMismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableMismatch {
    pub table: String,
    pub issue: String,
}

/// One column as reported by `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub udt_name: String,
    pub nullable: bool,
}

/// What the database actually contains for the catalog schema
#[derive(Debug, Clone, Default)]
pub struct LiveSchema {
    /// table name -> columns in ordinal order
    pub tables: BTreeMap<String, Vec<LiveColumn>>,
    /// enum type name -> labels in sort order
    pub enums: BTreeMap<String, Vec<String>>,
}

pub struct SchemaVerifier {
    schema: String,
}

impl SchemaVerifier {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
        }
    }

    /// Verify the live catalog schema
    pub async fn verify_schema(&self, pool: &Pool) -> Result<VerificationResult> {
        let live = self.query_live_schema(pool).await?;
        let result = compare(&live);

        if result.passed {
            info!("Catalog schema verification PASSED for {}", self.schema);
        } else {
            warn!("Catalog schema verification FAILED for {}", self.schema);
        }

        Ok(result)
    }

    async fn query_live_schema(&self, pool: &Pool) -> Result<LiveSchema> {
        let client = pool.get().await.map_err(|e| CatalogError::ConnectionFailed {
            database: self.schema.clone(),
            cause: e.to_string(),
        })?;

        let mut live = LiveSchema::default();

        let rows = client
            .query(
                r#"
                SELECT table_name::text, column_name::text, udt_name::text, is_nullable::text
                FROM information_schema.columns
                WHERE table_schema = $1
                ORDER BY table_name, ordinal_position
                "#,
                &[&self.schema],
            )
            .await
            .map_err(|e| CatalogError::QueryFailed {
                table: "information_schema.columns".to_string(),
                cause: e.to_string(),
            })?;

        for row in rows {
            let table: String = row.get(0);
            let is_nullable: String = row.get(3);
            live.tables.entry(table).or_default().push(LiveColumn {
                name: row.get(1),
                udt_name: row.get(2),
                nullable: is_nullable == "YES",
            });
        }

        let rows = client
            .query(
                r#"
                SELECT t.typname::text, e.enumlabel::text
                FROM pg_type t
                JOIN pg_enum e ON e.enumtypid = t.oid
                JOIN pg_namespace n ON t.typnamespace = n.oid
                WHERE n.nspname = $1
                ORDER BY t.typname, e.enumsortorder
                "#,
                &[&self.schema],
            )
            .await
            .map_err(|e| CatalogError::QueryFailed {
                table: "pg_enum".to_string(),
                cause: e.to_string(),
            })?;

        for row in rows {
            let type_name: String = row.get(0);
            let label: String = row.get(1);
            live.enums.entry(type_name).or_default().push(label);
        }

        Ok(live)
    }
}

/// Compare a live schema with the registry
pub fn compare(live: &LiveSchema) -> VerificationResult {
    let mut result = VerificationResult::new();

    for enum_type in ENUM_TYPES {
        result.types.expected.push(enum_type.name.to_string());

        match live.enums.get(enum_type.name) {
            None => result.types.missing.push(enum_type.name.to_string()),
            Some(found) => {
                if found.iter().map(String::as_str).ne(enum_type.labels.iter().copied()) {
                    result.types.label_mismatches.push(LabelMismatch {
                        type_name: enum_type.name.to_string(),
                        expected: enum_type.labels.iter().map(|l| l.to_string()).collect(),
                        found: found.clone(),
                    });
                }
            }
        }
    }
    result.types.found = live.enums.keys().cloned().collect();

    for table in Table::ALL {
        let def = table.def();
        result.tables.expected.push(def.name.to_string());

        let Some(columns) = live.tables.get(def.name) else {
            result.tables.missing.push(def.name.to_string());
            continue;
        };

        let expected_columns = std::iter::once(("id", ColumnType::BigInt, true))
            .chain(def.columns.iter().map(|c| (c.name, c.column_type, c.required)));
        for (name, column_type, required) in expected_columns {
            let Some(column) = columns.iter().find(|c| c.name == name) else {
                result.tables.mismatches.push(TableMismatch {
                    table: def.name.to_string(),
                    issue: format!("missing column '{}'", name),
                });
                continue;
            };

            if column.udt_name != column_type.udt_name() {
                result.tables.mismatches.push(TableMismatch {
                    table: def.name.to_string(),
                    issue: format!(
                        "column '{}' has type {}, expected {}",
                        name,
                        column.udt_name,
                        column_type.udt_name()
                    ),
                });
            }
            if column.nullable == required {
                let (found, expected) = if required {
                    ("NULL", "NOT NULL")
                } else {
                    ("NOT NULL", "NULL")
                };
                result.tables.mismatches.push(TableMismatch {
                    table: def.name.to_string(),
                    issue: format!("column '{}' is {}, expected {}", name, found, expected),
                });
            }
        }
    }
    result.tables.found = live.tables.keys().cloned().collect();

    result.passed = result.types.missing.is_empty()
        && result.types.label_mismatches.is_empty()
        && result.tables.missing.is_empty()
        && result.tables.mismatches.is_empty();

    result
}
