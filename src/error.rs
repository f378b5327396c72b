use serde::Serialize;
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Missing required attribute {table}.{column}")]
    MissingRequired { table: String, column: String },

    #[error("Invalid value '{value}' for enum {enum_name} ({table}.{column})")]
    InvalidEnumValue {
        table: String,
        column: String,
        enum_name: String,
        value: String,
    },

    #[error("Invalid value for {table}.{column}: {reason}")]
    InvalidValue {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("Foreign key {table}.{column} references missing {references} row {id}")]
    ForeignKeyViolation {
        table: String,
        column: String,
        references: String,
        id: i64,
    },

    #[error("Cannot delete {table} row {id}: still referenced by {dependent_table}.{dependent_column}")]
    DeleteRestricted {
        table: String,
        id: i64,
        dependent_table: String,
        dependent_column: String,
    },

    #[error("{table} row {id} is already owned through {owner_table}.{owner_column}")]
    OwnershipConflict {
        table: String,
        id: i64,
        owner_table: String,
        owner_column: String,
    },

    #[error("Row not found: {table} id={id}")]
    NotFound { table: String, id: i64 },

    #[error("Connection failed to {database}: {cause}")]
    ConnectionFailed { database: String, cause: String },

    #[error("Query failed on {table}: {cause}")]
    QueryFailed { table: String, cause: String },

    #[error("Schema installation failed in {schema}: {cause}")]
    SchemaInstallFailed { schema: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::MissingRequired { .. } => "missing_required_attribute",
            CatalogError::InvalidEnumValue { .. } => "invalid_enum_value",
            CatalogError::InvalidValue { .. } => "invalid_value",
            CatalogError::UnknownColumn { .. } => "unknown_column",
            CatalogError::ForeignKeyViolation { .. } | CatalogError::DeleteRestricted { .. } => {
                "referential_integrity_violation"
            }
            CatalogError::OwnershipConflict { .. } => "ownership_conflict",
            CatalogError::NotFound { .. } => "not_found",
            CatalogError::ConnectionFailed { .. } => "connection_failed",
            CatalogError::QueryFailed { .. } => "query_failed",
            CatalogError::SchemaInstallFailed { .. } => "schema_install_failed",
            CatalogError::Internal(_) => "internal_error",
        }
    }

    pub fn is_referential_violation(&self) -> bool {
        matches!(
            self,
            CatalogError::ForeignKeyViolation { .. } | CatalogError::DeleteRestricted { .. }
        )
    }

    /// Serializable summary, used by the health endpoint and log payloads
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// What the store was doing when PostgreSQL rejected a statement.
///
/// A 23503 means "parent missing" on a write but "children remain" on a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Read,
}

/// Translate a PostgreSQL error into the catalog's error kinds.
///
/// Constraint and column names come from the server's error fields; the
/// table registry names every constraint so they can be read back here.
pub fn from_db_error(err: tokio_postgres::Error, table: &str, op: Operation, id: Option<i64>) -> CatalogError {
    let Some(db) = err.as_db_error() else {
        return CatalogError::QueryFailed {
            table: table.to_string(),
            cause: err.to_string(),
        };
    };

    let column = db
        .column()
        .map(str::to_string)
        .or_else(|| db.constraint().and_then(constraint_column))
        .unwrap_or_else(|| "unknown".to_string());

    match db.code() {
        c if *c == SqlState::FOREIGN_KEY_VIOLATION => match op {
            Operation::Delete => CatalogError::DeleteRestricted {
                table: table.to_string(),
                id: id.unwrap_or_default(),
                dependent_table: db.table().unwrap_or("unknown").to_string(),
                dependent_column: column,
            },
            _ => CatalogError::ForeignKeyViolation {
                table: table.to_string(),
                column,
                references: "parent".to_string(),
                id: id.unwrap_or_default(),
            },
        },
        c if *c == SqlState::NOT_NULL_VIOLATION => CatalogError::MissingRequired {
            table: table.to_string(),
            column,
        },
        c if *c == SqlState::INVALID_TEXT_REPRESENTATION => CatalogError::InvalidEnumValue {
            table: table.to_string(),
            column,
            enum_name: "unknown".to_string(),
            value: db.message().to_string(),
        },
        c if *c == SqlState::UNIQUE_VIOLATION => CatalogError::OwnershipConflict {
            table: table.to_string(),
            id: id.unwrap_or_default(),
            owner_table: db.table().unwrap_or("unknown").to_string(),
            owner_column: column,
        },
        c if *c == SqlState::STRING_DATA_RIGHT_TRUNCATION
            || *c == SqlState::CHECK_VIOLATION
            || *c == SqlState::INVALID_DATETIME_FORMAT =>
        {
            CatalogError::InvalidValue {
                table: table.to_string(),
                column,
                reason: db.message().to_string(),
            }
        }
        _ => CatalogError::QueryFailed {
            table: table.to_string(),
            cause: db.message().to_string(),
        },
    }
}

/// Recover the column from a registry constraint name (`fk_<table>__<column>`).
fn constraint_column(constraint: &str) -> Option<String> {
    constraint
        .split_once("__")
        .map(|(_, column)| column.to_string())
}

impl From<tokio_postgres::Error> for CatalogError {
    fn from(err: tokio_postgres::Error) -> Self {
        CatalogError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for CatalogError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        CatalogError::Internal(format!("Pool error: {}", err))
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Internal(format!("Serialization error: {}", err))
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        CatalogError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
