use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid database configuration: {0}")]
    Config(String),

    #[error("Upsert into {table} failed on chunk {chunk_index} after {rows_committed} committed rows: {message}")]
    ChunkFailed {
        table: String,
        chunk_index: usize,
        rows_committed: u64,
        message: String,
    },

    #[error("Retry exhausted: {0}")]
    RetryExhausted(String),
}
