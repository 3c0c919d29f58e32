use thiserror::Error;
use types::{RawMetricEntry, RoundId};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Malformed metric payload for key '{}': {reason}", .entry.key_name)]
    MalformedMetricPayload {
        entry: Box<RawMetricEntry>,
        reason: String,
    },

    #[error("Batch misaligned: {metadata} rounds, {playercounts} playercounts, {stats} blackbox responses")]
    Misaligned {
        metadata: usize,
        playercounts: usize,
        stats: usize,
    },

    #[error("Round {round_id}: {source}")]
    InRound {
        round_id: RoundId,
        #[source]
        source: Box<NormalizeError>,
    },
}

impl NormalizeError {
    pub(crate) fn malformed(entry: &RawMetricEntry, reason: impl Into<String>) -> Self {
        NormalizeError::MalformedMetricPayload {
            entry: Box::new(entry.clone()),
            reason: reason.into(),
        }
    }

    /// The offending raw entry, if this is (or wraps) a payload error.
    pub fn entry(&self) -> Option<&RawMetricEntry> {
        match self {
            NormalizeError::MalformedMetricPayload { entry, .. } => Some(entry),
            NormalizeError::InRound { source, .. } => source.entry(),
            NormalizeError::Misaligned { .. } => None,
        }
    }
}
