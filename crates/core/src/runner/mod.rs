//! Job runner.
//!
//! [`ProcessRunner`] launches one child per call with an explicit argument
//! vector, a cleared environment and a timeout, keeping a bounded tail of
//! stdout and stderr. [`FaceSwapPipeline`] builds the face swap command
//! line on top of it and limits how many runs execute at once.

mod config;
mod error;
mod pipeline;
mod process;
mod types;

pub use config::PipelineConfig;
pub use error::RunnerError;
pub use pipeline::{FaceSwapPipeline, PipelineRunner};
pub use process::{tail_lines, ProcessCommand, ProcessRunner};
pub use types::{PipelineJob, PoolStatus, ProcessResult};
