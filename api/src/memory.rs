use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use types::{PlayerCountSeries, RawMetricEntry, RoundId, RoundMetadata};

use crate::source::{blackbox_endpoint, playercounts_endpoint, roundlist_endpoint};
use crate::{ApiError, Fetched, Result, StatsSource};

#[derive(Debug, Clone)]
struct StoredRound {
    metadata: RoundMetadata,
    playercounts: Option<PlayerCountSeries>,
    blackbox: Option<Vec<RawMetricEntry>>,
}

/// A `StatsSource` serving rounds held in memory, paged the way the real
/// round list is: newest first, each page starting at (and including) the
/// offset round.
#[derive(Debug)]
pub struct InMemorySource {
    rounds: BTreeMap<RoundId, StoredRound>,
    page_size: usize,
    rate_limited: HashSet<RoundId>,
    requests: AtomicUsize,
}

impl InMemorySource {
    pub fn new(page_size: usize) -> Self {
        Self {
            rounds: BTreeMap::new(),
            page_size: page_size.max(1),
            rate_limited: HashSet::new(),
            requests: AtomicUsize::new(0),
        }
    }

    /// Adds a finished round. A `None` sub-resource answers "not found".
    pub fn with_round(
        mut self,
        metadata: RoundMetadata,
        playercounts: Option<PlayerCountSeries>,
        blackbox: Option<Vec<RawMetricEntry>>,
    ) -> Self {
        self.insert_round(metadata, playercounts, blackbox);
        self
    }

    pub fn insert_round(
        &mut self,
        metadata: RoundMetadata,
        playercounts: Option<PlayerCountSeries>,
        blackbox: Option<Vec<RawMetricEntry>>,
    ) {
        self.rounds.insert(
            metadata.round_id,
            StoredRound {
                metadata,
                playercounts,
                blackbox,
            },
        );
    }

    /// Requests for this round's sub-resources answer with a rate-limit error.
    pub fn with_rate_limit_on(mut self, round_id: RoundId) -> Self {
        self.rate_limited.insert(round_id);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn guard(&self, round_id: RoundId, endpoint: String) -> Result<()> {
        if self.rate_limited.contains(&round_id) {
            return Err(ApiError::RateLimitExceeded {
                endpoint,
                remaining: Some(0),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatsSource for InMemorySource {
    async fn round_list(&self, offset: RoundId) -> Result<Fetched<Vec<RoundMetadata>>> {
        self.count();
        tracing::trace!(endpoint = %roundlist_endpoint(offset), "Serving round list from memory");

        let page = self
            .rounds
            .values()
            .rev()
            .filter(|round| offset == 0 || round.metadata.round_id <= offset)
            .take(self.page_size)
            .map(|round| round.metadata.clone())
            .collect();

        Ok(Fetched::Data(page))
    }

    async fn metadata(&self, round_id: RoundId) -> Result<Fetched<RoundMetadata>> {
        self.count();
        Ok(match self.rounds.get(&round_id) {
            Some(round) => Fetched::Data(round.metadata.clone()),
            None => Fetched::NotFound,
        })
    }

    async fn playercounts(&self, round_id: RoundId) -> Result<Fetched<PlayerCountSeries>> {
        self.count();
        self.guard(round_id, playercounts_endpoint(round_id))?;
        Ok(self
            .rounds
            .get(&round_id)
            .and_then(|round| round.playercounts.clone())
            .map_or(Fetched::NotFound, Fetched::Data))
    }

    async fn blackbox(&self, round_id: RoundId) -> Result<Fetched<Vec<RawMetricEntry>>> {
        self.count();
        self.guard(round_id, blackbox_endpoint(round_id))?;
        Ok(self
            .rounds
            .get(&round_id)
            .and_then(|round| round.blackbox.clone())
            .map_or(Fetched::NotFound, Fetched::Data))
    }
}
