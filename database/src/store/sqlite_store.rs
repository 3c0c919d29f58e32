use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use types::{CompiledRound, RoundId, RoundMetadata};

use super::schema::{create_metadata_table, create_rounds_table};
use super::RoundStore;
use crate::config::{validate_identifier, validate_schema};
use crate::models::{
    compiled_round_from_row, metadata_from_row, ColumnValue, Table, UpsertRow, METADATA_COLUMNS,
    ROUND_COLUMNS,
};
use crate::{DatabaseConfig, DatabaseError};

/// SQLite's default cap on bind parameters in one statement.
pub const MAX_BIND_PARAMETERS: usize = 32766;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub rows: u64,
    /// Rows sent in each committed chunk, in order.
    pub chunks: Vec<u64>,
}

pub struct SqliteRoundStore {
    pool: SqlitePool,
    metadata_table: String,
    rounds_table: String,
    chunk_size: usize,
}

impl SqliteRoundStore {
    pub fn new(pool: SqlitePool, config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        validate_schema(&config.schema)?;
        for identifier in [&config.metadata_table, &config.rounds_table] {
            validate_identifier(identifier)?;
        }

        Ok(Self {
            pool,
            metadata_table: format!("{}.{}", config.schema, config.metadata_table),
            rounds_table: format!("{}.{}", config.schema, config.rounds_table),
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        config.validate()?;
        let pool = config.create_pool().await?;
        Self::new(pool, config)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn table_name(&self, table: Table) -> &str {
        match table {
            Table::Metadata => &self.metadata_table,
            Table::Rounds => &self.rounds_table,
        }
    }

    pub async fn upsert<R: UpsertRow>(&self, records: &[R]) -> Result<u64, DatabaseError> {
        Ok(self.upsert_chunked(records).await?.rows)
    }

    /// Writes `records` in chunks of `chunk_size`, one transaction per chunk.
    ///
    /// A failing chunk stops the upsert; chunks before it stay committed and
    /// the error reports how many rows made it. Chunks are capped so one
    /// statement never binds more than `MAX_BIND_PARAMETERS` values.
    pub async fn upsert_chunked<R: UpsertRow>(
        &self,
        records: &[R],
    ) -> Result<UpsertSummary, DatabaseError> {
        let table = self.table_name(R::TABLE).to_string();
        let columns = R::columns();
        let insert_head = format!("INSERT INTO {table} ({}) ", columns.join(", "));
        let conflict_tail = format!(
            " ON CONFLICT(round_id) DO UPDATE SET {}",
            columns
                .iter()
                .skip(1)
                .map(|column| format!("{column} = excluded.{column}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let chunk_size = self.effective_chunk_size(columns.len());
        let mut summary = UpsertSummary::default();
        for (chunk_index, chunk) in records.chunks(chunk_size).enumerate() {
            let rows = chunk
                .iter()
                .map(UpsertRow::to_row)
                .collect::<Result<Vec<_>, _>>()?;

            match self.upsert_chunk(&insert_head, &conflict_tail, rows).await {
                Ok(written) => {
                    summary.rows += written;
                    summary.chunks.push(written);
                    tracing::debug!(
                        table = %table,
                        chunk_index,
                        rows = written,
                        "Committed upsert chunk"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        table = %table,
                        chunk_index,
                        rows_committed = summary.rows,
                        error = %e,
                        "Upsert chunk failed"
                    );
                    return Err(DatabaseError::ChunkFailed {
                        table,
                        chunk_index,
                        rows_committed: summary.rows,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(table = %table, rows = summary.rows, chunks = summary.chunks.len(), "Upsert finished");
        Ok(summary)
    }

    fn effective_chunk_size(&self, columns: usize) -> usize {
        let max_rows = (MAX_BIND_PARAMETERS / columns.max(1)).max(1);
        if self.chunk_size > max_rows {
            tracing::warn!(
                configured = self.chunk_size,
                max_rows,
                columns,
                "Chunk size exceeds the bind parameter limit, capping"
            );
        }
        self.chunk_size.min(max_rows)
    }

    async fn upsert_chunk(
        &self,
        insert_head: &str,
        conflict_tail: &str,
        rows: Vec<Vec<ColumnValue>>,
    ) -> Result<u64, DatabaseError> {
        let row_count = rows.len() as u64;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(insert_head);
        query.push_values(rows, |mut b, row| {
            for value in row {
                match value {
                    ColumnValue::Integer(v) => {
                        b.push_bind(v);
                    }
                    ColumnValue::Text(v) => {
                        b.push_bind(v);
                    }
                }
            }
        });
        query.push(conflict_tail);

        query
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        Ok(row_count)
    }
}

fn select_list(alias: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| format!("{alias}.{column} AS {column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl RoundStore for SqliteRoundStore {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        for statement in [
            create_metadata_table(&self.metadata_table),
            create_rounds_table(&self.rounds_table),
        ] {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
        }
        Ok(())
    }

    async fn fetch_most_recent_round_id(&self) -> Result<Option<RoundId>, DatabaseError> {
        let row = sqlx::query(&format!(
            "SELECT MAX(round_id) AS max_round_id FROM {}",
            self.metadata_table
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;

        row.try_get("max_round_id")
            .map_err(|e| DatabaseError::Query(e.to_string()))
    }

    async fn fetch_metadata_difference(&self) -> Result<Vec<RoundMetadata>, DatabaseError> {
        let statement = format!(
            "SELECT {} FROM {} AS m LEFT JOIN {} AS r ON r.round_id = m.round_id \
             WHERE r.round_id IS NULL ORDER BY m.round_id",
            select_list("m", &METADATA_COLUMNS),
            self.metadata_table,
            self.rounds_table,
        );

        let rows = sqlx::query(&statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        rows.iter().map(metadata_from_row).collect()
    }

    async fn upsert_metadata(&self, records: &[RoundMetadata]) -> Result<u64, DatabaseError> {
        self.upsert(records).await
    }

    async fn upsert_rounds(&self, records: &[CompiledRound]) -> Result<u64, DatabaseError> {
        self.upsert(records).await
    }

    async fn fetch_compiled_round(
        &self,
        round_id: RoundId,
    ) -> Result<Option<CompiledRound>, DatabaseError> {
        let statement = format!(
            "SELECT {} FROM {} AS r WHERE r.round_id = ?",
            select_list("r", &ROUND_COLUMNS),
            self.rounds_table,
        );

        let row = sqlx::query(&statement)
            .bind(round_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        row.as_ref().map(compiled_round_from_row).transpose()
    }

    async fn count_rows(&self, table: Table) -> Result<i64, DatabaseError> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table_name(table)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))
    }
}
