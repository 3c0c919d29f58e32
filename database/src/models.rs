use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use types::{CompiledRound, RoundMetadata};

use crate::DatabaseError;

/// Columns shared by both tables, key first.
pub const METADATA_COLUMNS: [&str; 11] = [
    "round_id",
    "init_datetime",
    "start_datetime",
    "shutdown_datetime",
    "end_datetime",
    "commit_hash",
    "game_mode",
    "game_mode_result",
    "end_state",
    "map_name",
    "server_id",
];

pub const ROUND_COLUMNS: [&str; 13] = [
    "round_id",
    "init_datetime",
    "start_datetime",
    "shutdown_datetime",
    "end_datetime",
    "commit_hash",
    "game_mode",
    "game_mode_result",
    "end_state",
    "map_name",
    "server_id",
    "playercounts",
    "stats",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Metadata,
    Rounds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Integer(i64),
    Text(Option<String>),
}

/// A record that can be written with `INSERT ... ON CONFLICT(round_id)`.
pub trait UpsertRow: Send + Sync {
    const TABLE: Table;

    /// Column names in bind order; `round_id` comes first.
    fn columns() -> &'static [&'static str];

    fn to_row(&self) -> Result<Vec<ColumnValue>, DatabaseError>;
}

fn metadata_values(metadata: &RoundMetadata) -> Vec<ColumnValue> {
    vec![
        ColumnValue::Integer(metadata.round_id),
        ColumnValue::Text(metadata.init_datetime.clone()),
        ColumnValue::Text(metadata.start_datetime.clone()),
        ColumnValue::Text(metadata.shutdown_datetime.clone()),
        ColumnValue::Text(metadata.end_datetime.clone()),
        ColumnValue::Text(metadata.commit_hash.clone()),
        ColumnValue::Text(metadata.game_mode.clone()),
        ColumnValue::Text(metadata.game_mode_result.clone()),
        ColumnValue::Text(metadata.end_state.clone()),
        ColumnValue::Text(metadata.map_name.clone()),
        ColumnValue::Text(metadata.server_id.clone()),
    ]
}

impl UpsertRow for RoundMetadata {
    const TABLE: Table = Table::Metadata;

    fn columns() -> &'static [&'static str] {
        &METADATA_COLUMNS
    }

    fn to_row(&self) -> Result<Vec<ColumnValue>, DatabaseError> {
        Ok(metadata_values(self))
    }
}

impl UpsertRow for CompiledRound {
    const TABLE: Table = Table::Rounds;

    fn columns() -> &'static [&'static str] {
        &ROUND_COLUMNS
    }

    fn to_row(&self) -> Result<Vec<ColumnValue>, DatabaseError> {
        let playercounts = self
            .playercounts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let stats = self.stats.as_ref().map(serde_json::to_string).transpose()?;

        let mut row = metadata_values(&self.metadata);
        row.push(ColumnValue::Text(playercounts));
        row.push(ColumnValue::Text(stats));
        Ok(row)
    }
}

fn text(row: &SqliteRow, column: &str) -> Result<Option<String>, DatabaseError> {
    row.try_get(column)
        .map_err(|e| DatabaseError::Query(format!("column {column}: {e}")))
}

pub fn metadata_from_row(row: &SqliteRow) -> Result<RoundMetadata, DatabaseError> {
    let round_id: i64 = row
        .try_get("round_id")
        .map_err(|e| DatabaseError::Query(format!("column round_id: {e}")))?;

    Ok(RoundMetadata {
        round_id,
        init_datetime: text(row, "init_datetime")?,
        start_datetime: text(row, "start_datetime")?,
        shutdown_datetime: text(row, "shutdown_datetime")?,
        end_datetime: text(row, "end_datetime")?,
        commit_hash: text(row, "commit_hash")?,
        game_mode: text(row, "game_mode")?,
        game_mode_result: text(row, "game_mode_result")?,
        end_state: text(row, "end_state")?,
        map_name: text(row, "map_name")?,
        server_id: text(row, "server_id")?,
    })
}

pub fn compiled_round_from_row(row: &SqliteRow) -> Result<CompiledRound, DatabaseError> {
    let metadata = metadata_from_row(row)?;
    let playercounts = text(row, "playercounts")?
        .map(|json| serde_json::from_str(&json))
        .transpose()?;
    let stats = text(row, "stats")?
        .map(|json| serde_json::from_str(&json))
        .transpose()?;

    Ok(CompiledRound::new(metadata, playercounts, stats))
}
