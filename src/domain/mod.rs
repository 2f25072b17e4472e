pub mod models;
pub mod reconcile;
