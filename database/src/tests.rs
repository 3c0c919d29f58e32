mod database_tests {
    use crate::*;
    use serde_json::json;
    use types::{CompiledRound, NormalizedMetrics, PlayerCountSeries, RoundMetadata};

    pub async fn setup_test_store() -> SqliteRoundStore {
        let config = DatabaseConfig::new("sqlite::memory:");
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database pool");

        let store = SqliteRoundStore::new(pool, &config).expect("Failed to build store");
        store
            .ensure_schema()
            .await
            .expect("Failed to create test tables");
        store
    }

    fn metadata(round_id: i64) -> RoundMetadata {
        RoundMetadata {
            map_name: Some("Cyberiad".to_string()),
            game_mode: Some("extended".to_string()),
            ..RoundMetadata::new(round_id)
        }
    }

    fn compiled(round_id: i64) -> CompiledRound {
        let playercounts: PlayerCountSeries = serde_json::from_value(json!({
            "2023-04-01 18:00:00": 12,
            "2023-04-01 18:05:00": 31
        }))
        .unwrap();
        let mut stats = NormalizedMetrics::new();
        stats.insert("high_research_level", json!({"level": 5}));
        stats.insert("cargo_imports", json!(["crate_a", "crate_b"]));
        CompiledRound::new(metadata(round_id), Some(playercounts), Some(stats))
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = setup_test_store().await;

        store.ensure_schema().await.expect("second ensure_schema failed");

        assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 0);
        assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_most_recent_round_id() {
        let store = setup_test_store().await;
        assert_eq!(store.fetch_most_recent_round_id().await.unwrap(), None);

        let records: Vec<_> = [4, 17, 9].into_iter().map(metadata).collect();
        store.upsert_metadata(&records).await.unwrap();

        assert_eq!(store.fetch_most_recent_round_id().await.unwrap(), Some(17));
    }

    #[tokio::test]
    async fn test_metadata_difference_is_set_difference() {
        let store = setup_test_store().await;
        let records: Vec<_> = [1, 2, 3, 5].into_iter().map(metadata).collect();
        store.upsert_metadata(&records).await.unwrap();
        store
            .upsert_rounds(&[compiled(1), compiled(2)])
            .await
            .unwrap();

        let missing = store.fetch_metadata_difference().await.unwrap();

        let ids: Vec<_> = missing.iter().map(|m| m.round_id).collect();
        assert_eq!(ids, vec![3, 5]);
        assert_eq!(missing[0], metadata(3));
    }

    #[tokio::test]
    async fn test_metadata_difference_empty_is_ok() {
        let store = setup_test_store().await;
        store.upsert_metadata(&[metadata(1)]).await.unwrap();
        store.upsert_rounds(&[compiled(1)]).await.unwrap();

        let missing = store.fetch_metadata_difference().await.unwrap();

        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_compiled_round_round_trip_is_byte_equal() {
        let store = setup_test_store().await;
        let round = compiled(42);

        store.upsert_rounds(&[round.clone()]).await.unwrap();
        let stored = store
            .fetch_compiled_round(42)
            .await
            .unwrap()
            .expect("round 42 should exist");

        assert_eq!(
            serde_json::to_string(&stored.playercounts).unwrap(),
            serde_json::to_string(&round.playercounts).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&stored.stats).unwrap(),
            serde_json::to_string(&round.stats).unwrap()
        );
        assert_eq!(stored, round);
    }

    #[tokio::test]
    async fn test_null_sub_resources_round_trip() {
        let store = setup_test_store().await;
        let round = CompiledRound::new(metadata(8), None, None);

        store.upsert_rounds(&[round.clone()]).await.unwrap();

        assert_eq!(store.fetch_compiled_round(8).await.unwrap(), Some(round));
        assert_eq!(store.fetch_compiled_round(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conflict_overwrites_every_column() {
        let store = setup_test_store().await;
        store.upsert_rounds(&[compiled(3)]).await.unwrap();

        let replacement = CompiledRound::new(
            RoundMetadata {
                end_state: Some("nuke".to_string()),
                ..RoundMetadata::new(3)
            },
            None,
            Some(NormalizedMetrics::new()),
        );
        let processed = store.upsert_rounds(&[replacement.clone()]).await.unwrap();

        assert_eq!(processed, 1);
        assert_eq!(store.count_rows(Table::Rounds).await.unwrap(), 1);
        let stored = store.fetch_compiled_round(3).await.unwrap().unwrap();
        assert_eq!(stored, replacement);
        assert_eq!(stored.metadata.map_name, None);
    }

    #[tokio::test]
    async fn test_upsert_counts_processed_rows_not_changes() {
        let store = setup_test_store().await;
        let records: Vec<_> = (1..=5).map(metadata).collect();

        assert_eq!(store.upsert_metadata(&records).await.unwrap(), 5);
        assert_eq!(store.upsert_metadata(&records).await.unwrap(), 5);
        assert_eq!(store.count_rows(Table::Metadata).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_upsert_empty_batch() {
        let store = setup_test_store().await;

        let summary = store.upsert_chunked::<RoundMetadata>(&[]).await.unwrap();

        assert_eq!(summary, UpsertSummary::default());
    }
}
