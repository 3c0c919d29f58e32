use api::InMemorySource;
use database::{DatabaseConfig, RoundStore, SqliteRoundStore, Table};
use pipeline::{ErrorKind, IngestRun, PipelineError, RunOptions, RunStage};
use serde_json::{json, Value};
use types::{KeyType, PlayerCountSeries, RawMetricEntry, RoundId, RoundMetadata};

async fn setup_store() -> SqliteRoundStore {
    let store = SqliteRoundStore::connect(&DatabaseConfig::new("sqlite::memory:"))
        .await
        .expect("Failed to connect");
    store.ensure_schema().await.expect("Failed to create tables");
    store
}

fn metadata(round_id: RoundId) -> RoundMetadata {
    RoundMetadata {
        game_mode: Some("traitor".to_string()),
        map_name: Some("Delta".to_string()),
        ..RoundMetadata::new(round_id)
    }
}

fn playercounts(peak: i64) -> PlayerCountSeries {
    serde_json::from_value(json!({
        "2023-06-01 20:00:00": peak / 2,
        "2023-06-01 20:05:00": peak
    }))
    .unwrap()
}

fn metric(key_name: &str, key_type: KeyType, data: Value) -> RawMetricEntry {
    RawMetricEntry {
        key_name: key_name.to_string(),
        key_type,
        version: 1,
        raw_data: json!({ "data": data }).to_string(),
    }
}

fn blackbox(round_id: RoundId) -> Vec<RawMetricEntry> {
    vec![
        metric("round_end_clients", KeyType::Amount, json!(round_id * 10)),
        metric(
            "high_research_level",
            KeyType::Associative,
            json!({"1": {"level": "5", "node": "engineering"}}),
        ),
        metric(
            "cargo_imports",
            KeyType::Associative,
            json!({"1": "crate_a", "2": "crate_b"}),
        ),
    ]
}

fn source_with(round_ids: impl IntoIterator<Item = RoundId>, page_size: usize) -> InMemorySource {
    round_ids
        .into_iter()
        .fold(InMemorySource::new(page_size), |source, round_id| {
            source.with_round(
                metadata(round_id),
                Some(playercounts(round_id)),
                Some(blackbox(round_id)),
            )
        })
}

fn options(batch_size: usize) -> RunOptions {
    RunOptions {
        batch_size,
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn test_run_ingests_every_upstream_round() {
    let source = source_with(1..=4, 2).with_round(metadata(5), None, Some(blackbox(5)));
    let store = setup_store().await;

    let mut run = IngestRun::new(&source, &store, RunOptions::default());
    let report = run.run().await.expect("Run should succeed");

    assert_eq!(run.stage(), RunStage::Done);
    assert_eq!(report.final_stage, RunStage::Done);
    assert_eq!(report.run_id, run.run_id());
    assert_eq!(report.metadata_upserted, 5);
    assert_eq!(report.missing_rounds, 5);
    assert_eq!(report.rounds_upserted, 5);
    assert!(report.finished_at >= report.started_at);
    assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 5);
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 5);

    let round = store.fetch_compiled_round(2).await.unwrap().unwrap();
    assert_eq!(round.metadata, metadata(2));
    assert_eq!(round.playercounts, Some(playercounts(2)));
    let stats = round.stats.unwrap();
    assert_eq!(stats.get("round_end_clients"), Some(&json!(20)));
    assert_eq!(
        stats.get("high_research_level"),
        Some(&json!({"level": "5", "node": "engineering"}))
    );
    assert_eq!(stats.get("cargo_imports"), Some(&json!(["crate_a", "crate_b"])));

    let without_playercounts = store.fetch_compiled_round(5).await.unwrap().unwrap();
    assert_eq!(without_playercounts.playercounts, None);
    assert!(without_playercounts.stats.is_some());
}

#[tokio::test]
async fn test_second_run_without_new_rounds_adds_nothing() {
    let source = source_with(1..=6, 4);
    let store = setup_store().await;

    IngestRun::new(&source, &store, RunOptions::default())
        .run()
        .await
        .expect("First run should succeed");
    let metadata_rows = store.count_rows(Table::Metadata).await.unwrap();
    let round_rows = store.count_rows(Table::Rounds).await.unwrap();

    let report = IngestRun::new(&source, &store, RunOptions::default())
        .run()
        .await
        .expect("Second run should succeed");

    assert_eq!(report.metadata_upserted, 0);
    assert_eq!(report.missing_rounds, 0);
    assert_eq!(report.rounds_upserted, 0);
    assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), metadata_rows);
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), round_rows);
}

#[tokio::test]
async fn test_later_run_picks_up_new_rounds() {
    let store = setup_store().await;
    IngestRun::new(&source_with(1..=3, 2), &store, RunOptions::default())
        .run()
        .await
        .unwrap();

    let report = IngestRun::new(&source_with(1..=5, 2), &store, RunOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.missing_rounds, 2);
    assert_eq!(report.rounds_upserted, 2);
    assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 5);
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 5);
    assert_eq!(store.fetch_most_recent_round_id().await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_start_round_id_bounds_first_walk() {
    let source = source_with(1..=10, 3);
    let store = setup_store().await;
    let options = RunOptions {
        start_round_id: 6,
        ..RunOptions::default()
    };

    let report = IngestRun::new(&source, &store, options).run().await.unwrap();

    assert_eq!(report.metadata_upserted, 5);
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 5);
    assert!(store.fetch_compiled_round(5).await.unwrap().is_none());
    assert!(store.fetch_compiled_round(6).await.unwrap().is_some());
}

#[tokio::test]
async fn test_rate_limit_fails_run_and_keeps_earlier_batches() {
    let source = source_with(1..=6, 10).with_rate_limit_on(5);
    let store = setup_store().await;

    let mut run = IngestRun::new(&source, &store, options(2));
    let err = run.run().await.expect_err("Rate limit should fail the run");

    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert_eq!(run.stage(), RunStage::Failed);
    assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 6);
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 4);

    let report = IngestRun::new(&source_with(1..=6, 10), &store, options(2))
        .run()
        .await
        .expect("Retry after the limit resets should succeed");

    assert_eq!(report.missing_rounds, 2);
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 6);
}

#[tokio::test]
async fn test_malformed_metric_fails_run_with_entry() {
    let broken = RawMetricEntry {
        key_name: "traitor_objective".to_string(),
        key_type: KeyType::NestedTally,
        version: 3,
        raw_data: "{\"data\": {".to_string(),
    };
    let source = source_with(1..=2, 10).with_round(metadata(3), None, Some(vec![broken.clone()]));
    let store = setup_store().await;

    let mut run = IngestRun::new(&source, &store, RunOptions::default());
    let err = run.run().await.expect_err("Malformed payload should fail the run");

    assert_eq!(err.kind(), ErrorKind::MalformedMetricPayload);
    assert_eq!(run.stage(), RunStage::Failed);
    match &err {
        PipelineError::Normalize(e) => assert_eq!(e.entry(), Some(&broken)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingest_single_round() {
    let source = source_with([40, 41], 10);
    let store = setup_store().await;

    let mut run = IngestRun::new(&source, &store, RunOptions::default());
    let round = run.ingest_round(41).await.expect("Round 41 should ingest");

    assert_eq!(run.stage(), RunStage::Done);
    assert_eq!(round.round_id(), 41);
    assert!(round.is_complete());
    assert_eq!(store.fetch_compiled_round(41).await.unwrap(), Some(round));
    assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 1);
    assert!(store.fetch_metadata_difference().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_unknown_round_is_not_found() {
    let source = source_with([40], 10);
    let store = setup_store().await;

    let mut run = IngestRun::new(&source, &store, RunOptions::default());
    let err = run.ingest_round(99).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RoundNotFound);
    assert_eq!(run.stage(), RunStage::Failed);
    assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 0);
}

#[tokio::test]
async fn test_run_through_trait_objects() {
    let source = source_with(1..=3, 2);
    let store = setup_store().await;
    let dyn_source: &dyn api::StatsSource = &source;
    let dyn_store: &dyn RoundStore = &store;

    let report = IngestRun::new(dyn_source, dyn_store, options(1))
        .run()
        .await
        .expect("Run should succeed");

    assert_eq!(report.rounds_upserted, 3);
    assert_eq!(dyn_store.count_rows(Table::Rounds).await.unwrap(), 3);
}

#[tokio::test]
async fn test_current_store_skips_round_list_walk() {
    let source = source_with(1..=9, 2);
    let store = setup_store().await;
    IngestRun::new(&source, &store, RunOptions::default())
        .run()
        .await
        .unwrap();
    let requests_before = source.requests();

    IngestRun::new(&source, &store, RunOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(source.requests() - requests_before, 1);
}

#[tokio::test]
async fn test_empty_upstream_is_a_no_op() {
    let source = InMemorySource::new(10);
    let store = setup_store().await;

    let report = IngestRun::new(&source, &store, RunOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.metadata_upserted, 0);
    assert_eq!(report.missing_rounds, 0);
    assert_eq!(report.final_stage, RunStage::Done);
}
