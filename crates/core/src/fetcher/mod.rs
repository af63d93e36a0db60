//! Asset fetcher.
//!
//! Downloads the two inputs of a swap job (source image and target video)
//! from share links. A [`ProviderRegistry`] maps a URL to a download URL
//! without touching the network, so malformed references fail before any
//! request is made. [`HttpFetcher`] then streams the file into place,
//! retrying once with a confirmation parameter when Google Drive answers
//! with its "can't scan this file" page.
//!
//! # Example
//!
//! ```ignore
//! use faceswap_core::fetcher::{AssetFetcher, AssetReference, FetcherConfig, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new(FetcherConfig::default())?;
//! let reference = AssetReference::new(
//!     "https://drive.google.com/file/d/1AbCdEfGhIjKlMnOp/view?usp=sharing",
//!     workspace.source_path(job_id),
//! );
//! let path = fetcher.fetch(&reference).await?;
//! ```

mod config;
mod direct;
mod error;
mod google_drive;
mod http;
mod provider;
mod traits;

pub use config::FetcherConfig;
pub use direct::DirectUrlProvider;
pub use error::FetchError;
pub use google_drive::GoogleDriveProvider;
pub use http::HttpFetcher;
pub use provider::{ProviderRegistry, ResolvedAsset, ShareProvider};
pub use traits::{AssetFetcher, AssetReference};
