mod health;

pub use health::{health_check, AppState, HealthResponse};
