use axum::{extract::State, Json};
use deadpool_postgres::Pool;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Shared state of the catalog service
pub struct AppState {
    pub pool: Pool,
    pub schema: String,
    pub schema_verified: bool,
    pub start_time: Instant,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    postgres_connected: bool,
    schema: String,
    schema_verified: bool,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    // Test PostgreSQL connection
    let postgres_connected = match state.pool.get().await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health probe could not reach PostgreSQL: {}", e);
            false
        }
    };

    let healthy = postgres_connected && state.schema_verified;

    Json(HealthResponse {
        status: if healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        postgres_connected,
        schema: state.schema.clone(),
        schema_verified: state.schema_verified,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
