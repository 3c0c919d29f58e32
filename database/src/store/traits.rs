use async_trait::async_trait;
use types::{CompiledRound, RoundId, RoundMetadata};

use crate::{DatabaseError, Table};

#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Creates the metadata and rounds tables if they are missing.
    async fn ensure_schema(&self) -> Result<(), DatabaseError>;

    /// Highest `round_id` in the metadata table, `None` while it is empty.
    async fn fetch_most_recent_round_id(&self) -> Result<Option<RoundId>, DatabaseError>;

    /// Metadata rows that have no compiled round yet, by ascending `round_id`.
    async fn fetch_metadata_difference(&self) -> Result<Vec<RoundMetadata>, DatabaseError>;

    async fn upsert_metadata(&self, records: &[RoundMetadata]) -> Result<u64, DatabaseError>;

    async fn upsert_rounds(&self, records: &[CompiledRound]) -> Result<u64, DatabaseError>;

    async fn fetch_compiled_round(
        &self,
        round_id: RoundId,
    ) -> Result<Option<CompiledRound>, DatabaseError>;

    async fn count_rows(&self, table: Table) -> Result<i64, DatabaseError>;
}
