//! services/api/src/error.rs
//!
//! Startup failures of the API binary. Request-time failures never reach this
//! type; handlers map port errors straight to status codes.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting the pool or running a query during startup.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding or serving the listener.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `ALLOWED_ORIGIN` is not usable as a CORS header value.
    #[error("Invalid ALLOWED_ORIGIN '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
}
