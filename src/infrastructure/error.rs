use crate::application::session::RequestRejected;
use crate::infrastructure::health_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Request rejected: {0}")]
    Rejected(#[from] RequestRejected),
    #[error("Session state error: {0}")]
    State(String),
}
