use platform_catalog::api::{health_check, AppState};
use platform_catalog::catalog::PlatformCatalog;
use platform_catalog::config::Config;
use platform_catalog::pool;
use platform_catalog::schema::{InstallOutcome, SchemaInstaller, SchemaVerifier};
use platform_catalog::store::PgStore;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv = dotenvy::dotenv();

    // Load configuration; it also names the log directory
    let config = Config::from_env()?;
    let log_dir = &config.log_dir;

    std::fs::create_dir_all(log_dir).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create log directory {}: {}", log_dir.display(), e);
    });

    // Create file appender with daily rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "platform-catalog.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,platform_catalog=debug")),
        )
        // Console output
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        // File output with JSON format for easy parsing
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {}", log_dir.display());

    if let Err(e) = dotenv {
        warn!("No .env file found or error loading it: {}", e);
    }

    let socket_addr = config.socket_addr()?;

    info!("Starting Platform Catalog on {}", socket_addr);
    info!("Catalog schema: {}", config.catalog_schema);
    info!("Max connections: {}", config.max_connections);

    let pool = pool::connect(&config).await?;

    if config.install_schema {
        let installer = SchemaInstaller::new(&config.catalog_schema)?;
        match installer.install(&pool).await? {
            InstallOutcome::Created => info!("Catalog schema {} created", config.catalog_schema),
            InstallOutcome::Unchanged => info!("Catalog schema {} up to date", config.catalog_schema),
            InstallOutcome::Reapplied { previous_checksum } => info!(
                "Catalog schema {} reapplied over checksum {}",
                config.catalog_schema, previous_checksum
            ),
        }

        let tables = installer.list_tables(&pool).await?;
        let enum_types = installer.list_enum_types(&pool).await?;
        debug!("Catalog tables: {:?}", tables);
        debug!("Catalog enum types: {:?}", enum_types);
    } else {
        info!("INSTALL_SCHEMA disabled, skipping catalog installation");
    }

    let verification = SchemaVerifier::new(&config.catalog_schema)
        .verify_schema(&pool)
        .await?;
    if verification.passed {
        let catalog = PlatformCatalog::new(PgStore::new(pool.clone(), &config.catalog_schema)?);
        let platforms = catalog.list_platforms(None, 0).await?;
        info!("Catalog ready: {} platforms on the first page", platforms.len());
    } else {
        error!("\n{}", verification.error_log());
    }

    let state = Arc::new(AppState {
        pool,
        schema: config.catalog_schema.clone(),
        schema_verified: verification.passed,
        start_time: Instant::now(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Create listener
    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
