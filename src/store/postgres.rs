//! PostgreSQL catalog store
//!
//! Rows cross the wire as JSONB: writes go through `jsonb_populate_record`,
//! reads come back through `to_jsonb`. PostgreSQL does the type coercion and
//! the constraints installed by the DDL enforce integrity, so concurrent
//! writers are serialized by the database itself.

use crate::error::{from_db_error, CatalogError, Operation, Result};
use crate::schema::{
    foreign_key_values, is_valid_identifier, validate_insert, validate_update, ColumnType, Record, Table,
    ID_COLUMN,
};
use crate::store::{CatalogStore, Filter, Query};
use deadpool_postgres::{Object, Pool};
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

/// Catalog store backed by a PostgreSQL schema
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: Pool, schema: &str) -> Result<Self> {
        if !is_valid_identifier(schema) {
            return Err(CatalogError::InvalidValue {
                table: "-".to_string(),
                column: "schema".to_string(),
                reason: format!("'{}' is not a valid schema name", schema),
            });
        }

        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn client(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| CatalogError::ConnectionFailed {
            database: self.schema.clone(),
            cause: e.to_string(),
        })
    }

    async fn fetch(&self, table: Table, statement: &Statement) -> Result<Vec<Record>> {
        let client = self.client().await?;
        debug!("SQL: {}", statement.sql);

        let rows = client
            .query(statement.sql.as_str(), &statement.params())
            .await
            .map_err(|e| from_db_error(e, table.name(), Operation::Read, None))?;

        rows.into_iter()
            .map(|row| match row.get::<_, Value>(0) {
                Value::Object(record) => Ok(record),
                other => Err(CatalogError::Internal(format!(
                    "expected a JSON object from {}, got {}",
                    table, other
                ))),
            })
            .collect()
    }
}

impl CatalogStore for PgStore {
    async fn insert(&self, table: Table, record: Record) -> Result<i64> {
        let row = validate_insert(table, &record)?;
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let sql = insert_sql(&self.schema, table, &columns);
        debug!("SQL: {}", sql);

        let client = self.client().await?;
        let payload = Value::Object(row.clone());
        let result = if columns.is_empty() {
            client.query_one(sql.as_str(), &[]).await
        } else {
            client.query_one(sql.as_str(), &[&payload]).await
        };

        let id: i64 = result
            .map_err(|e| resolve_parent(from_db_error(e, table.name(), Operation::Insert, None), table, &row))?
            .get(0);

        info!("Created {} row with ID: {}", table, id);
        Ok(id)
    }

    async fn update(&self, table: Table, id: i64, changes: Record) -> Result<()> {
        let changes = validate_update(table, &changes)?;
        let not_found = || CatalogError::NotFound {
            table: table.name().to_string(),
            id,
        };

        if changes.is_empty() {
            return match self.get(table, id).await? {
                Some(_) => Ok(()),
                None => Err(not_found()),
            };
        }

        let columns: Vec<&str> = changes.keys().map(String::as_str).collect();
        let sql = update_sql(&self.schema, table, &columns);
        debug!("SQL: {}", sql);

        let client = self.client().await?;
        let payload = Value::Object(changes.clone());
        let updated = client
            .execute(sql.as_str(), &[&payload, &id])
            .await
            .map_err(|e| resolve_parent(from_db_error(e, table.name(), Operation::Update, Some(id)), table, &changes))?;

        if updated == 0 {
            return Err(not_found());
        }

        info!("Updated {} row with ID: {}", table, id);
        Ok(())
    }

    async fn delete(&self, table: Table, id: i64) -> Result<bool> {
        let sql = delete_sql(&self.schema, table);
        debug!("SQL: {}", sql);

        let client = self.client().await?;
        let deleted = match client.execute(sql.as_str(), &[&id]).await {
            Ok(deleted) => deleted,
            Err(e) => {
                let err = from_db_error(e, table.name(), Operation::Delete, Some(id));
                if err.is_referential_violation() {
                    warn!("Delete of {} row {} rejected: {}", table, id, err);
                }
                return Err(err);
            }
        };

        if deleted > 0 {
            info!("Deleted {} row with ID: {}", table, id);
        }
        Ok(deleted > 0)
    }

    async fn get(&self, table: Table, id: i64) -> Result<Option<Record>> {
        let statement = find_statement(&self.schema, table, &Query::new().eq(ID_COLUMN, id))?;
        Ok(self.fetch(table, &statement).await?.into_iter().next())
    }

    async fn find(&self, table: Table, query: &Query) -> Result<Vec<Record>> {
        let statement = find_statement(&self.schema, table, query)?;
        self.fetch(table, &statement).await
    }
}

/// Fill in the parent table and key of a foreign key violation raised by the server.
fn resolve_parent(err: CatalogError, table: Table, record: &Record) -> CatalogError {
    match err {
        CatalogError::ForeignKeyViolation { column, .. } => {
            match foreign_key_values(table, record).into_iter().find(|(fk, _)| fk.column == column) {
                Some((fk, id)) => CatalogError::ForeignKeyViolation {
                    table: table.name().to_string(),
                    column,
                    references: fk.references.name().to_string(),
                    id,
                },
                None => CatalogError::ForeignKeyViolation {
                    table: table.name().to_string(),
                    column,
                    references: "parent".to_string(),
                    id: 0,
                },
            }
        }
        other => other,
    }
}

// =============================================================================
// SQL rendering
// =============================================================================

/// Bound parameter of a rendered statement
#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    Float(f64),
    BigInt(i64),
}

impl SqlParam {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Text(v) => v,
            SqlParam::Float(v) => v,
            SqlParam::BigInt(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Statement {
    sql: String,
    params: Vec<SqlParam>,
}

impl Statement {
    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(SqlParam::as_sql).collect()
    }

    /// Bind a parameter and return its placeholder
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }
}

fn insert_sql(schema: &str, table: Table, columns: &[&str]) -> String {
    let target = format!("{}.{}", schema, table.name());

    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES RETURNING id", target);
    }

    let columns = columns.join(", ");
    format!(
        "INSERT INTO {target} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{target}, $1::jsonb) RETURNING id"
    )
}

fn update_sql(schema: &str, table: Table, columns: &[&str]) -> String {
    let target = format!("{}.{}", schema, table.name());
    let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = r.{c}")).collect();

    format!(
        "UPDATE {target} AS t SET {} FROM jsonb_populate_record(NULL::{target}, $1::jsonb) AS r WHERE t.id = $2",
        assignments.join(", ")
    )
}

fn delete_sql(schema: &str, table: Table) -> String {
    format!("DELETE FROM {}.{} WHERE id = $1", schema, table.name())
}

/// Render a checked query. Column names come from the table registry only.
fn find_statement(schema: &str, table: Table, query: &Query) -> Result<Statement> {
    let query = query.checked(table)?;
    let def = table.def();
    let mut statement = Statement {
        sql: format!("SELECT to_jsonb(t) FROM {}.{} AS t", schema, table.name()),
        params: Vec::new(),
    };

    let mut conditions = Vec::new();
    for filter in &query.filters {
        let column = filter.column();
        let condition = match filter {
            Filter::Eq(_, Value::Null) => format!("t.{} IS NULL", column),
            Filter::Eq(_, value) if column == ID_COLUMN => {
                let id = value.as_i64().unwrap_or_default();
                format!("t.id = {}", statement.bind(SqlParam::BigInt(id)))
            }
            Filter::Eq(_, value) => {
                let sql_type = def
                    .column(column)
                    .map(|c| c.column_type.sql_type(schema))
                    .unwrap_or_else(|| ColumnType::BigInt.sql_type(schema));
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let placeholder = statement.bind(SqlParam::Text(text));
                format!("t.{} = CAST({}::text AS {})", column, placeholder, sql_type)
            }
            Filter::Contains(_, needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                format!("t.{} ILIKE {}", column, statement.bind(SqlParam::Text(pattern)))
            }
            Filter::GreaterThan(_, bound) => {
                format!("t.{} > {}::float8", column, statement.bind(SqlParam::Float(*bound)))
            }
        };
        conditions.push(condition);
    }

    if !conditions.is_empty() {
        statement.sql.push_str(" WHERE ");
        statement.sql.push_str(&conditions.join(" AND "));
    }

    statement.sql.push_str(" ORDER BY t.id");

    if let Some(limit) = query.limit {
        let placeholder = statement.bind(SqlParam::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));
        statement.sql.push_str(&format!(" LIMIT {}", placeholder));
    }
    if query.offset > 0 {
        let placeholder = statement.bind(SqlParam::BigInt(i64::try_from(query.offset).unwrap_or(i64::MAX)));
        statement.sql.push_str(&format!(" OFFSET {}", placeholder));
    }

    Ok(statement)
}

/// Escape LIKE metacharacters so the needle matches literally
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
