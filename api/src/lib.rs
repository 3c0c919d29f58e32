pub mod bulk;
pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod pagination;
pub mod source;

pub use bulk::{fetch_round_data_bulk, RoundDataBatch, DEFAULT_WORKERS, MAX_WORKERS};
pub use client::{check_status, ClientConfig, Fetched, StatsClient, DEFAULT_BASE_URL, RATE_LIMIT_HEADER};
pub use error::{ApiError, Result};
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemorySource;
pub use pagination::{fetch_roundlist_to_offset, most_recent_round_id, RoundListWalker};
pub use source::StatsSource;
