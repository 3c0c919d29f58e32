use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp -> player count samples for one round, kept as delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerCountSeries(pub Map<String, Value>);

impl PlayerCountSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest sampled count, ignoring non-numeric samples.
    pub fn peak(&self) -> Option<i64> {
        self.0.values().filter_map(Value::as_i64).max()
    }
}
