//! Download Error Types
//!
//! Split between failures of the external engine itself and failures the
//! download invoker detects around it.

use std::path::PathBuf;

/// Failures reported by a media engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Engine finished without reporting an output file")]
    NoOutputPath,
}

/// Failures of a single URL download
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid quality '{0}': expected a maximum height such as 720")]
    InvalidQuality(String),

    #[error("Download engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Download failed: {} does not exist", .0.display())]
    MissingOutput(PathBuf),
}

impl DownloadError {
    /// Whether the caller supplied bad input, as opposed to a fetch failure
    pub fn is_validation(&self) -> bool {
        matches!(self, DownloadError::InvalidQuality(_))
    }
}
