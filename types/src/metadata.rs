use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::RoundId;

/// One completed round as listed by `/roundlist` and `/metadata/{id}`.
///
/// Every descriptive field is nullable upstream: rounds that crashed before
/// shutdown have no `shutdown_datetime`, rounds that never left the lobby
/// have no game mode, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundMetadata {
    pub round_id: RoundId,
    #[serde(default)]
    pub init_datetime: Option<String>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(default)]
    pub shutdown_datetime: Option<String>,
    #[serde(default)]
    pub end_datetime: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub game_mode: Option<String>,
    #[serde(default)]
    pub game_mode_result: Option<String>,
    #[serde(default)]
    pub end_state: Option<String>,
    #[serde(default)]
    pub map_name: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
}

impl RoundMetadata {
    /// Metadata with only the key populated.
    pub fn new(round_id: RoundId) -> Self {
        Self {
            round_id,
            init_datetime: None,
            start_datetime: None,
            shutdown_datetime: None,
            end_datetime: None,
            commit_hash: None,
            game_mode: None,
            game_mode_result: None,
            end_state: None,
            map_name: None,
            server_id: None,
        }
    }
}

impl Display for RoundMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "round {} ({} on {})",
            self.round_id,
            self.game_mode.as_deref().unwrap_or("unknown mode"),
            self.map_name.as_deref().unwrap_or("unknown map"),
        )
    }
}
