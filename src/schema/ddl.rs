//! DDL rendering for the catalog schema
//!
//! Turns the static table registry into PostgreSQL statements:
//! 1. `CREATE SCHEMA`
//! 2. one `CREATE TYPE ... AS ENUM` per label set (idempotent)
//! 3. `CREATE TABLE` in dependency order, with named constraints
//! 4. indexes on parent keys, so children can be listed per parent
//! 5. the trigger that removes a deleted platform's owned records
//!
//! Every statement is safe to re-run against an installed schema.

use crate::error::{CatalogError, Result};
use crate::schema::enums::{EnumType, ENUM_TYPES};
use crate::schema::tables::{
    fk_constraint_name, unique_constraint_name, ColumnDefault, ColumnType, Reference, Table,
};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Rendered DDL for one catalog schema
#[derive(Debug, Clone)]
pub struct CatalogDdl {
    pub schema: String,
    pub statements: Vec<String>,
}

impl CatalogDdl {
    pub fn render(schema: &str) -> Result<Self> {
        if !is_valid_identifier(schema) {
            return Err(CatalogError::SchemaInstallFailed {
                schema: schema.to_string(),
                cause: format!("Invalid schema name: {}", schema),
            });
        }

        let mut statements = vec![format!("CREATE SCHEMA IF NOT EXISTS {};", schema)];

        for enum_type in ENUM_TYPES {
            statements.push(create_enum(schema, enum_type));
        }

        for table in Table::ALL {
            statements.push(create_table(schema, table));
        }

        for table in Table::ALL {
            statements.extend(parent_indexes(schema, table));
        }

        for table in Table::ALL {
            if table.def().owned_links().next().is_some() {
                statements.extend(release_owned_trigger(schema, table));
            }
        }

        Ok(Self {
            schema: schema.to_string(),
            statements,
        })
    }

    /// The whole script, one statement per paragraph
    pub fn script(&self) -> String {
        let mut script = self.statements.join("\n\n");
        script.push('\n');
        script
    }

    /// Checksum of the normalized script, used to detect drift between installs
    pub fn checksum(&self) -> String {
        compute_checksum(&self.script())
    }
}

fn create_enum(schema: &str, enum_type: &EnumType) -> String {
    let labels = enum_type
        .labels
        .iter()
        .map(|l| format!("'{}'", l))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "DO $$\nBEGIN\n    CREATE TYPE {}.{} AS ENUM ({});\nEXCEPTION\n    WHEN duplicate_object THEN NULL;\nEND\n$$;",
        schema, enum_type.name, labels
    )
}

fn create_table(schema: &str, table: Table) -> String {
    let def = table.def();
    let mut lines = vec!["id BIGSERIAL PRIMARY KEY".to_string()];

    for column in def.columns {
        let mut line = format!("{} {}", column.name, column.column_type.sql_type(schema));
        if column.required {
            line.push_str(" NOT NULL");
        }
        if let Some(ColumnDefault::Now) = column.default {
            line.push_str(" DEFAULT now()");
        }
        lines.push(line);
    }

    for fk in def.foreign_keys {
        // NO ACTION on delete: a referenced row cannot disappear under its referrer.
        // Owned records are released by trigger once the owner row is gone.
        lines.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{} (id)",
            fk_constraint_name(def.name, fk.column),
            fk.column,
            schema,
            fk.references.name()
        ));
        if fk.kind == Reference::Owned {
            lines.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                unique_constraint_name(def.name, fk.column),
                fk.column
            ));
        }
    }

    for column in def.columns {
        if column.column_type == ColumnType::CountryCode {
            lines.push(format!(
                "CONSTRAINT ck_{}__{} CHECK (char_length({}) = 2)",
                def.name, column.name, column.name
            ));
        }
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n    {}\n);",
        schema,
        def.name,
        lines.join(",\n    ")
    )
}

fn parent_indexes(schema: &str, table: Table) -> Vec<String> {
    let def = table.def();
    def.foreign_keys
        .iter()
        .filter(|fk| fk.kind == Reference::Parent)
        .map(|fk| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{}__{} ON {}.{} ({});",
                def.name, fk.column, schema, def.name, fk.column
            )
        })
        .collect()
}

fn release_owned_trigger(schema: &str, table: Table) -> Vec<String> {
    let def = table.def();
    let function = format!("{}.{}_release_owned", schema, def.name);
    let trigger = format!("{}_release_owned", def.name);

    let deletes = def
        .owned_links()
        .map(|fk| {
            format!(
                "    DELETE FROM {}.{} WHERE id = OLD.{};",
                schema,
                fk.references.name(),
                fk.column
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        format!(
            "CREATE OR REPLACE FUNCTION {}() RETURNS trigger\nLANGUAGE plpgsql AS $$\nBEGIN\n{}\n    RETURN OLD;\nEND\n$$;",
            function, deletes
        ),
        format!("DROP TRIGGER IF EXISTS {} ON {}.{};", trigger, schema, def.name),
        format!(
            "CREATE TRIGGER {} AFTER DELETE ON {}.{} FOR EACH ROW EXECUTE FUNCTION {}();",
            trigger, schema, def.name, function
        ),
    ]
}

/// Lowercase SQL identifier: letter or underscore first, at most 63 bytes
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if !starts_ok {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn compute_checksum(content: &str) -> String {
    // Normalize: remove comments, collapse whitespace, lowercase
    let single_line_re = Regex::new(r"--[^\n]*").unwrap();
    let content = single_line_re.replace_all(content, "");

    let whitespace_re = Regex::new(r"\s+").unwrap();
    let normalized = whitespace_re.replace_all(&content, " ").trim().to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
