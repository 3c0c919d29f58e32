use serde::{Deserialize, Serialize};

use crate::{NormalizedMetrics, PlayerCountSeries, RoundId, RoundMetadata};

/// The persisted unit of the rounds table: metadata plus the two fetched
/// sub-resources. A sub-resource the upstream did not have is `None` and is
/// serialized as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRound {
    #[serde(flatten)]
    pub metadata: RoundMetadata,
    pub playercounts: Option<PlayerCountSeries>,
    pub stats: Option<NormalizedMetrics>,
}

impl CompiledRound {
    pub fn new(
        metadata: RoundMetadata,
        playercounts: Option<PlayerCountSeries>,
        stats: Option<NormalizedMetrics>,
    ) -> Self {
        Self {
            metadata,
            playercounts,
            stats,
        }
    }

    pub fn round_id(&self) -> RoundId {
        self.metadata.round_id
    }

    pub fn is_complete(&self) -> bool {
        self.playercounts.is_some() && self.stats.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sub_resources_serialize_as_null() {
        let round = CompiledRound::new(RoundMetadata::new(12), None, None);

        let json = serde_json::to_value(&round).unwrap();

        assert_eq!(json["round_id"], 12);
        assert!(json.get("playercounts").unwrap().is_null());
        assert!(json.get("stats").unwrap().is_null());
        assert!(!round.is_complete());
    }

    #[test]
    fn test_compiled_round_flattens_metadata() {
        let mut metadata = RoundMetadata::new(40);
        metadata.map_name = Some("Delta".to_string());
        let mut stats = NormalizedMetrics::new();
        stats.insert("escaped_humans", serde_json::json!(14));
        let round = CompiledRound::new(metadata, Some(PlayerCountSeries::default()), Some(stats));

        let json = serde_json::to_value(&round).unwrap();
        let back: CompiledRound = serde_json::from_value(json.clone()).unwrap();

        assert_eq!(json["map_name"], "Delta");
        assert_eq!(json["stats"]["escaped_humans"], 14);
        assert_eq!(back, round);
        assert!(round.is_complete());
    }
}
