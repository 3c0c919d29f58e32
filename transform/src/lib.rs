pub mod error;
pub mod merge;
pub mod normalize;

pub use error::NormalizeError;
pub use merge::{compile_round, compile_rounds};
pub use normalize::{clean_blackbox_response, normalize_entry, PRODUCTION_LIST_KEY};
