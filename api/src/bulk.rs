use std::future::Future;

use futures::{stream, StreamExt, TryStreamExt};
use types::{PlayerCountSeries, RawMetricEntry, RoundId};

use crate::{Fetched, Result, StatsSource};

pub const DEFAULT_WORKERS: usize = 2;
pub const MAX_WORKERS: usize = 10;

/// Sub-resources for a list of rounds. Every vector is index-aligned with
/// `round_ids`; rounds the upstream had nothing for hold `None`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoundDataBatch {
    pub round_ids: Vec<RoundId>,
    pub playercounts: Vec<Option<PlayerCountSeries>>,
    pub blackbox: Vec<Option<Vec<RawMetricEntry>>>,
}

impl RoundDataBatch {
    pub fn len(&self) -> usize {
        self.round_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.round_ids.is_empty()
    }

    pub fn missing(&self) -> usize {
        self.playercounts.iter().filter(|p| p.is_none()).count()
            + self.blackbox.iter().filter(|b| b.is_none()).count()
    }
}

/// Fetches `/playercounts/{id}` and `/blackbox/{id}` for every round, at
/// most `workers` requests in flight at a time.
///
/// Per-round 404s and undecodable bodies become `None` in place. Any error
/// (rate limit, unexpected status, transport) aborts the batch; requests
/// still in flight are dropped.
pub async fn fetch_round_data_bulk<S: StatsSource + ?Sized>(
    source: &S,
    round_ids: &[RoundId],
    workers: usize,
) -> Result<RoundDataBatch> {
    let workers = workers.clamp(1, MAX_WORKERS);
    tracing::info!(rounds = round_ids.len(), workers, "Starting bulk round fetch");

    let playercounts = fetch_aligned(round_ids, workers, "playercounts", move |round_id| {
        source.playercounts(round_id)
    })
    .await?;
    let blackbox = fetch_aligned(round_ids, workers, "blackbox", move |round_id| {
        source.blackbox(round_id)
    })
    .await?;

    let batch = RoundDataBatch {
        round_ids: round_ids.to_vec(),
        playercounts,
        blackbox,
    };
    tracing::info!(
        rounds = batch.len(),
        missing = batch.missing(),
        "Bulk round fetch finished"
    );
    Ok(batch)
}

async fn fetch_aligned<T, F, Fut>(
    round_ids: &[RoundId],
    workers: usize,
    resource: &'static str,
    fetch: F,
) -> Result<Vec<Option<T>>>
where
    F: Fn(RoundId) -> Fut,
    Fut: Future<Output = Result<Fetched<T>>>,
{
    // `buffered` yields in input order no matter which request finishes first.
    stream::iter(round_ids.iter().copied())
        .map(|round_id| {
            let request = fetch(round_id);
            async move {
                request.await.map(|fetched| match fetched {
                    Fetched::Data(data) => Some(data),
                    Fetched::NotFound => {
                        tracing::info!(round_id, resource, "Round not found, leaving a gap");
                        None
                    }
                    Fetched::Undecodable => {
                        tracing::warn!(round_id, resource, "Undecodable response, leaving a gap");
                        None
                    }
                })
            }
        })
        .buffered(workers)
        .try_collect()
        .await
}
