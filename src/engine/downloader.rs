//! Download Invoker
//!
//! Names each download with a fresh UUID inside the downloads directory,
//! passes the cookie file along when one is present, and refuses to report
//! success unless the produced file is actually on disk.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::errors::DownloadError;
use super::types::{EngineJob, FormatSpec};
use super::MediaEngine;

/// One URL to download, as submitted by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Maximum vertical resolution, e.g. "720"
    pub quality: String,
    pub audio_only: bool,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, quality: impl Into<String>, audio_only: bool) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            audio_only,
        }
    }

    /// Engine format for this request
    ///
    /// Audio-only ignores the quality value entirely.
    pub fn format_spec(&self) -> Result<FormatSpec, DownloadError> {
        if self.audio_only {
            return Ok(FormatSpec::Audio);
        }
        parse_quality(&self.quality).map(|max_height| FormatSpec::Video { max_height })
    }
}

/// Accepts "720" or "720p"
pub fn parse_quality(quality: &str) -> Result<u32, DownloadError> {
    let trimmed = quality.trim();
    let digits = trimmed
        .strip_suffix('p')
        .or_else(|| trimmed.strip_suffix('P'))
        .unwrap_or(trimmed);
    match digits.parse::<u32>() {
        Ok(height) if height > 0 => Ok(height),
        _ => Err(DownloadError::InvalidQuality(quality.to_string())),
    }
}

/// Wraps a [`MediaEngine`] with per-download naming and output validation
#[derive(Clone)]
pub struct Downloader {
    engine: Arc<dyn MediaEngine>,
    downloads_dir: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl Downloader {
    /// `downloads_dir` is made absolute so cached paths survive a change of
    /// working directory
    pub fn new(engine: Arc<dyn MediaEngine>, downloads_dir: impl Into<PathBuf>) -> Self {
        let downloads_dir = downloads_dir.into();
        Self {
            engine,
            downloads_dir: std::path::absolute(&downloads_dir).unwrap_or(downloads_dir),
            cookies_file: None,
        }
    }

    /// Location of an optional cookie file; only used while it exists
    pub fn with_cookies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = Some(path.into());
        self
    }

    /// Download one URL and return the path of the resulting file
    pub async fn fetch(&self, request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        let format = request.format_spec()?;
        let job = EngineJob {
            output_stem: self.downloads_dir.join(Uuid::new_v4().to_string()),
            cookies: self.cookies_file.clone().filter(|path| path.exists()),
            format,
        };

        info!(
            url = %request.url,
            engine = self.engine.name(),
            format = %job.format,
            cookies = job.cookies.is_some(),
            "Starting download"
        );

        let reported = self.engine.resolve(&request.url, &job).await?;
        let path = match job.format.forced_extension() {
            Some(ext) => reported.with_extension(ext),
            None => reported,
        };

        if !path.exists() {
            return Err(DownloadError::MissingOutput(path));
        }

        debug!(url = %request.url, path = %path.display(), "Download finished");
        Ok(path)
    }
}
