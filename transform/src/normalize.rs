//! Decoding of blackbox metric payloads into their canonical shape.
//!
//! Each `raw_data` string holds `{"data": ...}`. Associative metrics are
//! emitted upstream as index-keyed mappings (`{"1": a, "2": b}`), which are
//! collapsed by cardinality: nothing becomes `null`, a single entry becomes
//! the entry itself, and anything larger becomes a plain list.

use serde::Deserialize;
use serde_json::Value;
use types::{KeyType, NormalizedMetrics, RawMetricEntry};

use crate::NormalizeError;

/// Metric whose payload sits one level deeper, under a literal `/list` key.
pub const PRODUCTION_LIST_KEY: &str = "RND Production List";

const PRODUCTION_LIST_SEGMENT: &str = "/list";

#[derive(Deserialize)]
struct MetricEnvelope {
    data: Value,
}

/// Normalizes one round's blackbox response.
///
/// `None` (the round had no blackbox upstream) stays `None`. A single
/// malformed entry fails the whole round; no partial mapping is returned.
pub fn clean_blackbox_response(
    raw_entries: Option<&[RawMetricEntry]>,
) -> Result<Option<NormalizedMetrics>, NormalizeError> {
    let Some(raw_entries) = raw_entries else {
        return Ok(None);
    };

    let mut metrics = NormalizedMetrics::new();
    for entry in raw_entries {
        let value = normalize_entry(entry)?;
        if metrics.insert(entry.key_name.clone(), value).is_some() {
            tracing::debug!(key_name = %entry.key_name, "Duplicate metric key, keeping the last one");
        }
    }

    Ok(Some(metrics))
}

/// Decodes and canonicalizes a single metric entry.
pub fn normalize_entry(entry: &RawMetricEntry) -> Result<Value, NormalizeError> {
    let envelope: MetricEnvelope = serde_json::from_str(&entry.raw_data)
        .map_err(|e| NormalizeError::malformed(entry, e.to_string()))?;
    let mut data = envelope.data;

    if is_production_list(&entry.key_name) {
        data = unwrap_production_list(entry, data)?;
    }

    if entry.key_type == KeyType::Associative {
        data = collapse_associative(&entry.key_name, data);
    }

    Ok(data)
}

fn is_production_list(key_name: &str) -> bool {
    key_name.eq_ignore_ascii_case(PRODUCTION_LIST_KEY)
}

fn unwrap_production_list(entry: &RawMetricEntry, data: Value) -> Result<Value, NormalizeError> {
    match data {
        Value::Object(mut map) => map.remove(PRODUCTION_LIST_SEGMENT).ok_or_else(|| {
            NormalizeError::malformed(entry, format!("missing '{PRODUCTION_LIST_SEGMENT}' segment"))
        }),
        other => Err(NormalizeError::malformed(
            entry,
            format!("expected an object holding '{PRODUCTION_LIST_SEGMENT}', got {other}"),
        )),
    }
}

fn collapse_associative(key_name: &str, data: Value) -> Value {
    match data {
        Value::Object(map) => match map.len() {
            0 => {
                tracing::warn!(key_name, "Associative metric has no entries, storing null");
                Value::Null
            }
            1 => map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null),
            _ => Value::Array(map.into_iter().map(|(_, v)| v).collect()),
        },
        other => other,
    }
}
