pub mod config;
pub mod error;
pub mod health_store;
pub mod sqlite_health_store;
