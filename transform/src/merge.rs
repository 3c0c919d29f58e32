use types::{CompiledRound, PlayerCountSeries, RawMetricEntry, RoundMetadata};

use crate::{clean_blackbox_response, NormalizeError};

pub fn compile_round(
    metadata: RoundMetadata,
    playercounts: Option<PlayerCountSeries>,
    blackbox: Option<&[RawMetricEntry]>,
) -> Result<CompiledRound, NormalizeError> {
    let round_id = metadata.round_id;
    let stats = clean_blackbox_response(blackbox).map_err(|e| NormalizeError::InRound {
        round_id,
        source: Box::new(e),
    })?;

    if playercounts.is_none() || stats.is_none() {
        tracing::info!(
            round_id,
            has_playercounts = playercounts.is_some(),
            has_stats = stats.is_some(),
            "Round compiled with missing sub-resources"
        );
    }

    Ok(CompiledRound::new(metadata, playercounts, stats))
}

/// Merges index-aligned fetch results onto their metadata records.
///
/// The three inputs must have the same length; position `i` of each belongs
/// to the round at `metadata[i]`.
pub fn compile_rounds(
    metadata: Vec<RoundMetadata>,
    playercounts: Vec<Option<PlayerCountSeries>>,
    blackbox: Vec<Option<Vec<RawMetricEntry>>>,
) -> Result<Vec<CompiledRound>, NormalizeError> {
    if metadata.len() != playercounts.len() || metadata.len() != blackbox.len() {
        return Err(NormalizeError::Misaligned {
            metadata: metadata.len(),
            playercounts: playercounts.len(),
            stats: blackbox.len(),
        });
    }

    metadata
        .into_iter()
        .zip(playercounts)
        .zip(blackbox)
        .map(|((metadata, playercounts), blackbox)| {
            compile_round(metadata, playercounts, blackbox.as_deref())
        })
        .collect()
}
