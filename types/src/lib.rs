pub mod compiled_round;
pub mod metadata;
pub mod metric;
pub mod playercount;

pub use compiled_round::CompiledRound;
pub use metadata::RoundMetadata;
pub use metric::{KeyType, NormalizedMetrics, RawMetricEntry};
pub use playercount::PlayerCountSeries;

/// Primary key shared by every round representation.
pub type RoundId = i64;
