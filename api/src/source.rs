use async_trait::async_trait;
use types::{PlayerCountSeries, RawMetricEntry, RoundId, RoundMetadata};

use crate::{Fetched, Result, StatsClient};

pub fn roundlist_endpoint(offset: RoundId) -> String {
    format!("/roundlist?offset={offset}")
}

pub fn metadata_endpoint(round_id: RoundId) -> String {
    format!("/metadata/{round_id}")
}

pub fn playercounts_endpoint(round_id: RoundId) -> String {
    format!("/playercounts/{round_id}")
}

pub fn blackbox_endpoint(round_id: RoundId) -> String {
    format!("/blackbox/{round_id}")
}

/// The upstream endpoints, decoded into their typed response shapes.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// One page of the round list, newest first. Offset `0` means "from the
    /// most recent round".
    async fn round_list(&self, offset: RoundId) -> Result<Fetched<Vec<RoundMetadata>>>;
    async fn metadata(&self, round_id: RoundId) -> Result<Fetched<RoundMetadata>>;
    async fn playercounts(&self, round_id: RoundId) -> Result<Fetched<PlayerCountSeries>>;
    async fn blackbox(&self, round_id: RoundId) -> Result<Fetched<Vec<RawMetricEntry>>>;
}

#[async_trait]
impl StatsSource for StatsClient {
    async fn round_list(&self, offset: RoundId) -> Result<Fetched<Vec<RoundMetadata>>> {
        self.get(&roundlist_endpoint(offset)).await
    }

    async fn metadata(&self, round_id: RoundId) -> Result<Fetched<RoundMetadata>> {
        self.get(&metadata_endpoint(round_id)).await
    }

    async fn playercounts(&self, round_id: RoundId) -> Result<Fetched<PlayerCountSeries>> {
        self.get(&playercounts_endpoint(round_id)).await
    }

    async fn blackbox(&self, round_id: RoundId) -> Result<Fetched<Vec<RawMetricEntry>>> {
        self.get(&blackbox_endpoint(round_id)).await
    }
}
