//! Catalog schema installer
//!
//! Applies the rendered DDL to a database in one transaction and records its
//! checksum in `_platform_catalog_schema`, so a restart against an installed
//! schema is a no-op.
//!
//! Statements only create what is missing. An installed schema whose checksum
//! differs from the current DDL is reported as drift; existing tables are
//! never altered here.

use crate::error::{CatalogError, Result};
use crate::schema::ddl::CatalogDdl;
use deadpool_postgres::Pool;
use tracing::{debug, info, warn};

/// Result of an install run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Schema created from scratch
    Created,
    /// Installed checksum matched, nothing executed
    Unchanged,
    /// An older definition was installed; missing objects were added
    Reapplied { previous_checksum: String },
}

pub struct SchemaInstaller {
    ddl: CatalogDdl,
}

impl SchemaInstaller {
    pub fn new(schema: &str) -> Result<Self> {
        Ok(Self {
            ddl: CatalogDdl::render(schema)?,
        })
    }

    pub fn ddl(&self) -> &CatalogDdl {
        &self.ddl
    }

    /// Ensure the tracking table exists
    async fn ensure_tracking_table(&self, client: &deadpool_postgres::Object) -> Result<()> {
        client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS _platform_catalog_schema (
                    schema_name TEXT PRIMARY KEY,
                    checksum TEXT NOT NULL,
                    installed_at TIMESTAMPTZ DEFAULT NOW()
                )
                "#,
                &[],
            )
            .await
            .map_err(|e| CatalogError::SchemaInstallFailed {
                schema: self.ddl.schema.clone(),
                cause: format!("_platform_catalog_schema table creation: {}", e),
            })?;

        Ok(())
    }

    async fn installed_checksum(&self, client: &deadpool_postgres::Object) -> Result<Option<String>> {
        let row = client
            .query_opt(
                "SELECT checksum FROM _platform_catalog_schema WHERE schema_name = $1",
                &[&self.ddl.schema],
            )
            .await
            .map_err(|e| CatalogError::SchemaInstallFailed {
                schema: self.ddl.schema.clone(),
                cause: e.to_string(),
            })?;

        Ok(row.map(|r| r.get(0)))
    }

    /// Install the catalog schema
    pub async fn install(&self, pool: &Pool) -> Result<InstallOutcome> {
        let schema = &self.ddl.schema;
        let checksum = self.ddl.checksum();

        let mut client = pool.get().await.map_err(|e| CatalogError::ConnectionFailed {
            database: schema.clone(),
            cause: e.to_string(),
        })?;

        self.ensure_tracking_table(&client).await?;

        let previous = self.installed_checksum(&client).await?;
        let outcome = match previous {
            Some(existing) if existing == checksum => {
                debug!("Catalog schema {} unchanged (checksum match), skipping", schema);
                return Ok(InstallOutcome::Unchanged);
            }
            Some(existing) => {
                warn!(
                    "Catalog schema {} was installed from a different definition; adding missing objects only",
                    schema
                );
                InstallOutcome::Reapplied {
                    previous_checksum: existing,
                }
            }
            None => InstallOutcome::Created,
        };

        let install_failed = |e: tokio_postgres::Error| CatalogError::SchemaInstallFailed {
            schema: schema.clone(),
            cause: e.to_string(),
        };

        let tx = client.transaction().await.map_err(install_failed)?;

        for statement in &self.ddl.statements {
            debug!("Executing catalog DDL: {}", statement.lines().next().unwrap_or_default());
            tx.batch_execute(statement).await.map_err(install_failed)?;
        }

        tx.execute(
            r#"
            INSERT INTO _platform_catalog_schema (schema_name, checksum, installed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (schema_name) DO UPDATE SET
                checksum = EXCLUDED.checksum,
                installed_at = NOW()
            "#,
            &[schema, &checksum],
        )
        .await
        .map_err(install_failed)?;

        tx.commit().await.map_err(install_failed)?;

        info!(
            "Installed catalog schema {} ({} statements, checksum {})",
            schema,
            self.ddl.statements.len(),
            &checksum[..12]
        );

        Ok(outcome)
    }

    /// List catalog tables present in the database
    pub async fn list_tables(&self, pool: &Pool) -> Result<Vec<String>> {
        let client = pool.get().await.map_err(|e| CatalogError::ConnectionFailed {
            database: self.ddl.schema.clone(),
            cause: e.to_string(),
        })?;

        let rows = client
            .query(
                r#"
                SELECT table_name::text
                FROM information_schema.tables
                WHERE table_schema = $1
                AND table_type = 'BASE TABLE'
                ORDER BY table_name
                "#,
                &[&self.ddl.schema],
            )
            .await
            .map_err(|e| CatalogError::QueryFailed {
                table: "information_schema.tables".to_string(),
                cause: e.to_string(),
            })?;

        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    /// List enum types present in the catalog schema
    pub async fn list_enum_types(&self, pool: &Pool) -> Result<Vec<String>> {
        let client = pool.get().await.map_err(|e| CatalogError::ConnectionFailed {
            database: self.ddl.schema.clone(),
            cause: e.to_string(),
        })?;

        let rows = client
            .query(
                r#"
                SELECT t.typname::text
                FROM pg_type t
                JOIN pg_namespace n ON t.typnamespace = n.oid
                WHERE n.nspname = $1
                AND t.typtype = 'e'
                ORDER BY t.typname
                "#,
                &[&self.ddl.schema],
            )
            .await
            .map_err(|e| CatalogError::QueryFailed {
                table: "pg_type".to_string(),
                cause: e.to_string(),
            })?;

        Ok(rows.iter().map(|r| r.get(0)).collect())
    }
}
