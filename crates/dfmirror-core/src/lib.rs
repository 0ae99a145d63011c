//! dfmirror Core - dataset mirroring pipeline
//!
//! Downloads a tabular dataset over HTTP, archives it as ZIP, converts it to
//! Parquet, and publishes both artifacts to an object-storage bucket.
//!
//! # Example
//!
//! ```ignore
//! use dfmirror_core::{JobParams, PartialParams, ProgressContext, RunConfig, process};
//!
//! let params = JobParams::resolve([PartialParams::from_env()])?;
//! let summary = process(&params, &RunConfig::default(), &ProgressContext::new())?;
//! println!("Mirrored {} rows", summary.rows);
//! ```

pub mod archive;
pub mod convert;
pub mod error;
pub mod logging;
pub mod params;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod sink;
pub mod stream;
pub mod task;

// Re-exports for convenience
pub use archive::compress_file;
pub use convert::{ConvertError, ConvertStats, convert_to_parquet};
pub use error::JobError;
pub use logging::{IndicatifLogger, init_logging};
pub use params::{ConfigError, JobParams, PartialParams, strip_quotes};
pub use pipeline::{Artifact, RunConfig, Summary, process, process_with};
pub use progress::{ProgressContext, fmt_num};
pub use publish::{Publisher, S3Settings};
pub use sink::{ParquetSink, is_valid_parquet};
pub use stream::{DEFAULT_TIMEOUT, DownloadStats, SHARED_RUNTIME, StreamError, download};
pub use task::{ENV_TASK_INPUT, TaskInput};
