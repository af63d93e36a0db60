//! Dependency provisioner.
//!
//! Makes sure the model artifact and the runtime packages the face swap
//! pipeline needs are present before any job runs.
//!
//! - **Idempotent**: a dependency that passes its presence check is never
//!   reinstalled, and once confirmed it is cached in [`ProvisionState`] for
//!   the life of the process.
//! - **Serialised**: each dependency has its own lock, so concurrent callers
//!   wait for the first caller's install instead of starting their own.
//! - **Verified**: an install only counts once the presence check passes
//!   again. Model files are checked for minimum size and, when configured,
//!   SHA-256; partial downloads are deleted.
//! - **Sticky failures**: a failed dependency stays failed until it is
//!   invalidated explicitly (see [`Provisioner::recheck_all`]).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use faceswap_core::provisioner::{ProvisionState, Provisioner, SystemBackend};
//!
//! let backend = Arc::new(SystemBackend::new(&config.provisioner)?);
//! let dependencies = config.provisioner.dependencies(&workspace);
//! let provisioner = Provisioner::new(backend, dependencies, Arc::new(ProvisionState::new()));
//!
//! for (name, readiness) in provisioner.ensure_all().await? {
//!     println!("{name}: {readiness:?}");
//! }
//! ```

mod backend;
mod config;
mod error;
mod model;
mod packages;
mod service;
mod state;
mod types;

pub use backend::{DependencyBackend, SystemBackend};
pub use config::{ModelConfig, PackageSetConfig, ProvisionerConfig};
pub use error::ProvisionError;
pub use model::{check_model_file, sha256_file};
pub use packages::PipTool;
pub use service::Provisioner;
pub use state::ProvisionState;
pub use types::{
    Dependency, DependencySnapshot, DependencyStatus, ModelArtifact, PackageSet,
    ProvisionEvent, ProvisionEventCallback, ProvisionSnapshot, Readiness,
};
