use crate::schema::is_valid_identifier;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub catalog_schema: String,
    pub catalog_host: String,
    pub catalog_port: u16,
    pub max_connections: u32,
    pub pool_timeout: Duration,
    pub install_schema: bool,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // Build database_url from individual fields or use DATABASE_URL if provided
        let database_url = if let Some(url) = lookup("DATABASE_URL") {
            url
        } else {
            let db_host = var("PG_HOST", "localhost");
            let db_port = var("PG_PORT", "5432");
            let db_name = var("PG_DATABASE", "postgres");
            let db_user = var("PG_USER", "postgres");
            let db_password = var("PG_PASSWORD", "password");

            // URL-encode password to handle special characters
            let encoded_password = urlencoding::encode(&db_password);

            format!("postgres://{}:{}@{}:{}/{}", db_user, encoded_password, db_host, db_port, db_name)
        };

        let catalog_schema = var("CATALOG_SCHEMA", "platforms");
        if !is_valid_identifier(&catalog_schema) {
            anyhow::bail!("CATALOG_SCHEMA '{}' is not a valid schema name", catalog_schema);
        }

        let catalog_host = var("CATALOG_HOST", "127.0.0.1");
        let catalog_port = var("CATALOG_PORT", "8000").parse().unwrap_or(8000);

        let max_connections = var("MAX_CONNECTIONS", "10").parse().unwrap_or(10);

        let pool_timeout_secs: u64 = var("POOL_TIMEOUT_SECS", "5").parse().unwrap_or(5);

        let install_schema = !matches!(
            var("INSTALL_SCHEMA", "true").to_lowercase().as_str(),
            "false" | "0" | "no" | "off"
        );

        let log_dir = PathBuf::from(var("LOG_DIR", "./logs"));

        Ok(Config {
            database_url,
            catalog_schema,
            catalog_host,
            catalog_port,
            max_connections,
            pool_timeout: Duration::from_secs(pool_timeout_secs),
            install_schema,
            log_dir,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.catalog_host, self.catalog_port);
        addr.parse().map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }
}
