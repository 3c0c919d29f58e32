use std::collections::BTreeMap;
use std::fmt::Display;

use api::{
    fetch_round_data_bulk, fetch_roundlist_to_offset, most_recent_round_id, StatsSource,
    DEFAULT_WORKERS,
};
use chrono::{DateTime, Utc};
use database::RoundStore;
use serde::{Deserialize, Serialize};
use transform::{compile_round, compile_rounds};
use types::{CompiledRound, RoundId, RoundMetadata};
use uuid::Uuid;

use crate::config::DEFAULT_BATCH_SIZE;
use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Idle,
    Reconciling,
    Fetching,
    Normalizing,
    Upserting,
    Done,
    Failed,
}

impl Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Idle => "idle",
            RunStage::Reconciling => "reconciling",
            RunStage::Fetching => "fetching",
            RunStage::Normalizing => "normalizing",
            RunStage::Upserting => "upserting",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub workers: usize,
    /// Rounds fetched, normalized and upserted together.
    pub batch_size: usize,
    /// Lower bound of the metadata walk while the metadata table is empty.
    pub start_round_id: RoundId,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            start_round_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metadata_upserted: u64,
    pub rounds_upserted: u64,
    pub missing_rounds: usize,
    pub final_stage: RunStage,
}

impl RunReport {
    fn started(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            metadata_upserted: 0,
            rounds_upserted: 0,
            missing_rounds: 0,
            final_stage: RunStage::Idle,
        }
    }
}

/// One ingestion run: catch the metadata table up with the upstream round
/// list, diff it against the rounds table and fill in whatever is missing.
///
/// Failure is terminal for the run. Everything upserted before the failure
/// stays, and a fresh run picks up the remaining diff.
pub struct IngestRun<'a, S: StatsSource + ?Sized, R: RoundStore + ?Sized> {
    source: &'a S,
    store: &'a R,
    options: RunOptions,
    run_id: Uuid,
    stage: RunStage,
}

impl<'a, S, R> IngestRun<'a, S, R>
where
    S: StatsSource + ?Sized,
    R: RoundStore + ?Sized,
{
    pub fn new(source: &'a S, store: &'a R, options: RunOptions) -> Self {
        Self {
            source,
            store,
            options,
            run_id: Uuid::new_v4(),
            stage: RunStage::Idle,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        tracing::info!(run_id = %self.run_id, options = ?self.options, "Starting ingestion run");
        let mut report = RunReport::started(self.run_id);

        let result = self.reconcile_and_ingest(&mut report).await;
        self.finish(result)?;

        report.finished_at = Utc::now();
        report.final_stage = self.stage;
        tracing::info!(
            run_id = %self.run_id,
            metadata_upserted = report.metadata_upserted,
            rounds_upserted = report.rounds_upserted,
            missing_rounds = report.missing_rounds,
            "Ingestion run finished"
        );
        Ok(report)
    }

    /// Fetches one round by id and upserts it into both tables, whether or
    /// not it was already present.
    pub async fn ingest_round(&mut self, round_id: RoundId) -> Result<CompiledRound, PipelineError> {
        tracing::info!(run_id = %self.run_id, round_id, "Ingesting single round");
        let result = self.fetch_and_store_round(round_id).await;
        self.finish(result)
    }

    fn transition(&mut self, next: RunStage) {
        tracing::info!(run_id = %self.run_id, from = %self.stage, to = %next, "Run stage changed");
        self.stage = next;
    }

    fn finish<T>(&mut self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        match result {
            Ok(value) => {
                self.transition(RunStage::Done);
                Ok(value)
            }
            Err(e) => {
                tracing::error!(
                    run_id = %self.run_id,
                    stage = %self.stage,
                    kind = %e.kind(),
                    error = %e,
                    "Ingestion run failed"
                );
                self.transition(RunStage::Failed);
                Err(e)
            }
        }
    }

    async fn reconcile_and_ingest(&mut self, report: &mut RunReport) -> Result<(), PipelineError> {
        self.transition(RunStage::Reconciling);
        report.metadata_upserted = self.catch_up_metadata().await?;

        let missing = self.store.fetch_metadata_difference().await?;
        report.missing_rounds = missing.len();
        if missing.is_empty() {
            tracing::info!(run_id = %self.run_id, "Rounds table is up to date");
            return Ok(());
        }
        tracing::info!(run_id = %self.run_id, missing = missing.len(), "Rounds missing from the rounds table");

        for (batch_index, batch) in missing.chunks(self.options.batch_size.max(1)).enumerate() {
            report.rounds_upserted += self.ingest_batch(batch_index, batch.to_vec()).await?;
        }
        Ok(())
    }

    /// Walks the round list down to the newest stored round and upserts what
    /// it finds. Skips the walk when the upstream has nothing newer.
    async fn catch_up_metadata(&self) -> Result<u64, PipelineError> {
        let stored = self.store.fetch_most_recent_round_id().await?;
        let lower_bound = stored.unwrap_or(self.options.start_round_id);

        let newest = most_recent_round_id(self.source).await?;
        match newest {
            None => {
                tracing::warn!(run_id = %self.run_id, "Upstream round list is empty");
                return Ok(0);
            }
            Some(newest) if stored.is_some() && newest <= lower_bound => {
                tracing::info!(run_id = %self.run_id, newest, stored = lower_bound, "Metadata table is current");
                return Ok(0);
            }
            Some(newest) => {
                tracing::debug!(run_id = %self.run_id, newest, lower_bound, "Upstream has newer rounds");
            }
        }

        let walked = fetch_roundlist_to_offset(self.source, lower_bound).await?;
        let records = dedupe_round_list(walked, lower_bound);
        tracing::info!(run_id = %self.run_id, lower_bound, rounds = records.len(), "Metadata catch-up walked");

        if records.is_empty() {
            return Ok(0);
        }
        Ok(self.store.upsert_metadata(&records).await?)
    }

    async fn ingest_batch(
        &mut self,
        batch_index: usize,
        metadata: Vec<RoundMetadata>,
    ) -> Result<u64, PipelineError> {
        self.transition(RunStage::Fetching);
        let round_ids: Vec<RoundId> = metadata.iter().map(|m| m.round_id).collect();
        let data = fetch_round_data_bulk(self.source, &round_ids, self.options.workers).await?;

        self.transition(RunStage::Normalizing);
        let rounds = compile_rounds(metadata, data.playercounts, data.blackbox)?;

        self.transition(RunStage::Upserting);
        let written = self.store.upsert_rounds(&rounds).await?;
        tracing::info!(run_id = %self.run_id, batch_index, rounds = written, "Batch ingested");
        Ok(written)
    }

    async fn fetch_and_store_round(&mut self, round_id: RoundId) -> Result<CompiledRound, PipelineError> {
        self.transition(RunStage::Fetching);
        let metadata = self
            .source
            .metadata(round_id)
            .await?
            .require(&api::source::metadata_endpoint(round_id))?;
        let playercounts = self.source.playercounts(round_id).await?.into_option();
        let blackbox = self.source.blackbox(round_id).await?.into_option();

        self.transition(RunStage::Normalizing);
        let round = compile_round(metadata, playercounts, blackbox.as_deref())?;

        self.transition(RunStage::Upserting);
        self.store.upsert_metadata(std::slice::from_ref(&round.metadata)).await?;
        self.store.upsert_rounds(std::slice::from_ref(&round)).await?;
        Ok(round)
    }
}

/// Drops page-boundary duplicates and entries below `lower_bound`, ordered by
/// round id.
fn dedupe_round_list(walked: Vec<RoundMetadata>, lower_bound: RoundId) -> Vec<RoundMetadata> {
    let mut unique = BTreeMap::new();
    for round in walked.into_iter().filter(|r| r.round_id >= lower_bound) {
        unique.entry(round.round_id).or_insert(round);
    }
    unique.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_round_list() {
        let walked = [9, 8, 8, 7, 7, 6, 6, 5]
            .into_iter()
            .map(RoundMetadata::new)
            .collect();

        let ids: Vec<_> = dedupe_round_list(walked, 6)
            .iter()
            .map(|r| r.round_id)
            .collect();

        assert_eq!(ids, vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(RunStage::Reconciling.to_string(), "reconciling");
        assert_eq!(RunStage::Failed.to_string(), "failed");
    }
}
