pub mod config;
pub mod error;
pub mod run;

pub use config::{ApiSettings, CliOverrides, ConfigError, PipelineConfig};
pub use error::{ErrorKind, PipelineError};
pub use run::{IngestRun, RunOptions, RunReport, RunStage};
