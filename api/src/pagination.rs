use types::{RoundId, RoundMetadata};

use crate::{Fetched, Result, StatsSource};

/// Cursor over `/roundlist`, walking from the newest round down to a lower
/// bound.
///
/// Each page is ordered by descending `round_id` and the last entry of a
/// page becomes the next cursor. The walk stops once a page reaches the
/// bound, comes back empty, or fails to move the cursor. Consecutive pages
/// can share their boundary round.
pub struct RoundListWalker<'a, S: StatsSource + ?Sized> {
    source: &'a S,
    lower_bound: RoundId,
    cursor: RoundId,
    exhausted: bool,
    pages: usize,
}

impl<'a, S: StatsSource + ?Sized> RoundListWalker<'a, S> {
    pub fn new(source: &'a S, lower_bound: RoundId) -> Self {
        Self::starting_at(source, 0, lower_bound)
    }

    /// Walks from `offset` instead of the most recent round.
    pub fn starting_at(source: &'a S, offset: RoundId, lower_bound: RoundId) -> Self {
        Self {
            source,
            lower_bound,
            cursor: offset,
            exhausted: false,
            pages: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    pub fn cursor(&self) -> RoundId {
        self.cursor
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Fetches the page at the current cursor. Returns an empty page once
    /// the walk is over.
    pub async fn next_page(&mut self) -> Result<Vec<RoundMetadata>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let page = match self.source.round_list(self.cursor).await {
            Ok(Fetched::Data(page)) => page,
            Ok(Fetched::NotFound) | Ok(Fetched::Undecodable) => {
                tracing::warn!(cursor = self.cursor, "Round list page unavailable, ending walk");
                Vec::new()
            }
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };

        self.pages += 1;
        self.advance(&page);
        Ok(page)
    }

    fn advance(&mut self, page: &[RoundMetadata]) {
        let Some(last) = page.last() else {
            tracing::debug!(cursor = self.cursor, "Empty round list page");
            self.exhausted = true;
            return;
        };

        if last.round_id <= self.lower_bound {
            self.exhausted = true;
        } else if self.cursor != 0 && last.round_id >= self.cursor {
            tracing::warn!(
                cursor = self.cursor,
                last_round_id = last.round_id,
                "Round list cursor did not advance, ending walk"
            );
            self.exhausted = true;
        } else {
            self.cursor = last.round_id;
        }
    }
}

/// Collects every round list entry from the most recent round down to
/// `lower_bound`. Boundary rounds shared by two pages appear twice.
pub async fn fetch_roundlist_to_offset<S: StatsSource + ?Sized>(
    source: &S,
    lower_bound: RoundId,
) -> Result<Vec<RoundMetadata>> {
    let mut walker = RoundListWalker::new(source, lower_bound);
    let mut rounds = Vec::new();

    while walker.has_more() {
        rounds.extend(walker.next_page().await?);
    }

    tracing::info!(
        lower_bound,
        pages = walker.pages_fetched(),
        entries = rounds.len(),
        "Round list walk finished"
    );
    Ok(rounds)
}

/// The newest round the upstream knows about.
pub async fn most_recent_round_id<S: StatsSource + ?Sized>(source: &S) -> Result<Option<RoundId>> {
    let page = source.round_list(0).await?.into_option().unwrap_or_default();
    Ok(page.first().map(|round| round.round_id))
}
