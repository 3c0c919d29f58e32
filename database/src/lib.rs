pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::DatabaseConfig;
pub use error::DatabaseError;
pub use models::{ColumnValue, Table, UpsertRow};
pub use retry::retry_with_backoff;
pub use store::{RoundStore, SqliteRoundStore, UpsertSummary, MAX_BIND_PARAMETERS};
