use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Blackbox metric kind. Only `Associative` changes how a payload is
/// normalized; every other kind is carried through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyType {
    Tally,
    NestedTally,
    Associative,
    Amount,
    Text,
    Other(String),
}

impl From<String> for KeyType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "tally" => KeyType::Tally,
            "nested tally" => KeyType::NestedTally,
            "associative" => KeyType::Associative,
            "amount" => KeyType::Amount,
            "text" => KeyType::Text,
            _ => KeyType::Other(value),
        }
    }
}

impl From<KeyType> for String {
    fn from(key_type: KeyType) -> Self {
        key_type.to_string()
    }
}

impl Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyType::Tally => "tally",
            KeyType::NestedTally => "nested tally",
            KeyType::Associative => "associative",
            KeyType::Amount => "amount",
            KeyType::Text => "text",
            KeyType::Other(other) => other.as_str(),
        };
        write!(f, "{name}")
    }
}

/// One entry of `/blackbox/{id}`. `raw_data` is itself a JSON document
/// serialized into a string, shaped `{"data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricEntry {
    pub key_name: String,
    pub key_type: KeyType,
    #[serde(default)]
    pub version: i64,
    pub raw_data: String,
}

/// `key_name` -> canonical metric value for one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedMetrics(pub Map<String, Value>);

impl NormalizedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins on duplicate key names.
    pub fn insert(&mut self, key_name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key_name.into(), value)
    }

    pub fn get(&self, key_name: &str) -> Option<&Value> {
        self.0.get(key_name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
