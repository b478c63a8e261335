use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Redis holds bearer sessions under `session:<token>`, written by the
    /// external auth service and read by the `AuthUser` extractor.
    pub redis: RedisClient,
    pub config: Config,
}
