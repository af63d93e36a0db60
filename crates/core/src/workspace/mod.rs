//! Working directory layout.
//!
//! Every path the service touches is derived here from a single root:
//!
//! ```text
//! <root>/models/<model file>                  provisioned model artifact
//! <root>/jobs/<job_id>/source_image.jpg        per-job inputs
//! <root>/jobs/<job_id>/target_video.mp4
//! <root>/outputs/output_face_swap.mp4          output (shared layout)
//! <root>/outputs/<job_id>/output_face_swap.mp4 output (per-job layout)
//! ```
//!
//! File names are fixed here; nothing derived from a remote URL ever becomes
//! part of a local path.

mod config;
mod layout;

pub use config::{OutputLayout, WorkspaceConfig};
pub use layout::{
    Workspace, JOBS_DIR, MODELS_DIR, OUTPUTS_DIR, OUTPUT_FILE_NAME, SOURCE_FILE_NAME,
    TARGET_FILE_NAME,
};
