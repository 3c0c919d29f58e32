pub mod schema;
pub mod sqlite_store;
pub mod traits;

pub use sqlite_store::{SqliteRoundStore, UpsertSummary, MAX_BIND_PARAMETERS};
pub use traits::RoundStore;
