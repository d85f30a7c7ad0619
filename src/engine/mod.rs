//! Media download engine
//!
//! [`MediaEngine`] is the capability the rest of the crate depends on;
//! [`Downloader`] wraps one with naming, cookie handling and output checks.

pub mod downloader;
pub mod errors;
pub mod types;
pub mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;

pub use downloader::{DownloadRequest, Downloader};
pub use errors::{DownloadError, EngineError};
pub use types::{EngineJob, FormatSpec};
pub use ytdlp::YtDlpEngine;

/// External service that turns a URL into a local media file
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch `url` according to `job`, returning the path of the produced file
    async fn resolve(&self, url: &str, job: &EngineJob) -> Result<PathBuf, EngineError>;
}
