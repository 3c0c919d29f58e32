use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::retry::retry_with_backoff;
use crate::DatabaseError;

pub const DATABASE_URL_ENV: &str = "PARA_STATS_DATABASE_URL";
pub const SCHEMA_ENV: &str = "PARA_STATS_SCHEMA";
pub const METADATA_TABLE_ENV: &str = "PARA_STATS_METADATA_TABLE";
pub const ROUNDS_TABLE_ENV: &str = "PARA_STATS_ROUNDS_TABLE";
pub const CHUNK_SIZE_ENV: &str = "PARA_STATS_CHUNK_SIZE";
pub const POOL_SIZE_ENV: &str = "PARA_STATS_POOL_SIZE";
pub const CONNECT_RETRIES_ENV: &str = "PARA_STATS_CONNECT_RETRIES";

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// The only database name a fresh connection has; nothing else is attached.
pub const MAIN_SCHEMA: &str = "main";

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub schema: String,
    pub metadata_table: String,
    pub rounds_table: String,
    pub pool_size: u32,
    pub chunk_size: usize,
    pub connect_retries: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            schema: MAIN_SCHEMA.to_string(),
            metadata_table: "metadata".to_string(),
            rounds_table: "rounds".to_string(),
            pool_size: 5,
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_retries: 3,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// CLI flag beats environment, environment beats the YAML section.
    pub fn from_cli_or_env_or_yaml(
        cli_url: Option<String>,
        yaml_config: Option<DatabaseConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DatabaseError> {
        let mut config = yaml_config.unwrap_or_default();
        config.apply_env(env)?;
        if let Some(url) = cli_url {
            config.url = url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), DatabaseError> {
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            self.url = url;
        }
        if let Some(schema) = lookup(SCHEMA_ENV) {
            self.schema = schema;
        }
        if let Some(table) = lookup(METADATA_TABLE_ENV) {
            self.metadata_table = table;
        }
        if let Some(table) = lookup(ROUNDS_TABLE_ENV) {
            self.rounds_table = table;
        }
        if let Some(size) = lookup(CHUNK_SIZE_ENV) {
            self.chunk_size = parse_env(CHUNK_SIZE_ENV, &size)?;
        }
        if let Some(size) = lookup(POOL_SIZE_ENV) {
            self.pool_size = parse_env(POOL_SIZE_ENV, &size)?;
        }
        if let Some(retries) = lookup(CONNECT_RETRIES_ENV) {
            self.connect_retries = parse_env(CONNECT_RETRIES_ENV, &retries)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.url.trim().is_empty() {
            return Err(DatabaseError::Config(format!(
                "no database URL configured (set {DATABASE_URL_ENV})"
            )));
        }
        if self.chunk_size == 0 {
            return Err(DatabaseError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.pool_size == 0 {
            return Err(DatabaseError::Config("pool_size must be at least 1".to_string()));
        }
        validate_schema(&self.schema)?;
        for identifier in [&self.metadata_table, &self.rounds_table] {
            validate_identifier(identifier)?;
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Opens the pool, retrying with backoff while the database is unreachable.
    pub async fn create_pool(&self) -> Result<SqlitePool, DatabaseError> {
        let connect_options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| DatabaseError::Config(format!("{}: {e}", self.url)))?
            .create_if_missing(true);

        // Every connection to `:memory:` is its own database.
        let pool_options = if self.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(self.pool_size)
        };

        retry_with_backoff(
            || {
                let connect_options = connect_options.clone();
                let pool_options = pool_options.clone();
                Box::pin(async move { pool_options.connect_with(connect_options).await })
            },
            is_transient,
            self.connect_retries,
            CONNECT_RETRY_DELAY,
        )
        .await
        .map_err(|e| {
            if is_transient(&e) {
                DatabaseError::RetryExhausted(format!(
                    "{} after {} retries: {e}",
                    self.url, self.connect_retries
                ))
            } else {
                DatabaseError::Connection(e.to_string())
            }
        })
    }
}

fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Database(_)
    )
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, DatabaseError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DatabaseError::Config(format!("{key}={value:?}: {e}")))
}

pub fn validate_schema(schema: &str) -> Result<(), DatabaseError> {
    validate_identifier(schema)?;
    if schema.eq_ignore_ascii_case(MAIN_SCHEMA) {
        Ok(())
    } else {
        Err(DatabaseError::Config(format!(
            "schema {schema:?} is not attached; tables live in {MAIN_SCHEMA:?} (set {SCHEMA_ENV}=main or leave it unset)"
        )))
    }
}

/// Schema and table names are spliced into SQL text, so only plain
/// identifiers are accepted.
pub fn validate_identifier(identifier: &str) -> Result<(), DatabaseError> {
    let mut chars = identifier.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DatabaseError::InvalidIdentifier(identifier.to_string()))
    }
}
