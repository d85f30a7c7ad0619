//! Engine-facing request types
//!
//! Translates the user-level (quality, audio-only) choice into the format
//! selection handed to the media engine.

use std::fmt;
use std::path::{Path, PathBuf};

/// Codec/container audio-only downloads are converted to
pub const AUDIO_CODEC: &str = "mp3";

/// Target bitrate for audio-only conversion, in kbps
pub const AUDIO_BITRATE_KBPS: u32 = 192;

/// What the engine should select from the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpec {
    /// Best audio stream, converted to [`AUDIO_CODEC`] at [`AUDIO_BITRATE_KBPS`]
    Audio,
    /// Best video no taller than `max_height`, merged with the best audio
    Video { max_height: u32 },
}

impl FormatSpec {
    /// yt-dlp format selector string
    pub fn selector(&self) -> String {
        match self {
            FormatSpec::Audio => "bestaudio/best".to_string(),
            FormatSpec::Video { max_height } => {
                format!("bestvideo[height<={}]+bestaudio/best", max_height)
            }
        }
    }

    /// Extension the final file is forced to have, if any
    pub fn forced_extension(&self) -> Option<&'static str> {
        match self {
            FormatSpec::Audio => Some(AUDIO_CODEC),
            FormatSpec::Video { .. } => None,
        }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSpec::Audio => write!(f, "audio/{}@{}k", AUDIO_CODEC, AUDIO_BITRATE_KBPS),
            FormatSpec::Video { max_height } => write!(f, "video<={}p", max_height),
        }
    }
}

/// A single engine invocation
#[derive(Debug, Clone)]
pub struct EngineJob {
    /// Format to select
    pub format: FormatSpec,
    /// Output path without extension; the engine appends the real one
    pub output_stem: PathBuf,
    /// Cookie file for authenticated sources
    pub cookies: Option<PathBuf>,
}

impl EngineJob {
    /// Output template in yt-dlp syntax (`<stem>.%(ext)s`)
    pub fn output_template(&self) -> String {
        format!("{}.%(ext)s", self.output_stem.display())
    }

    /// Path the engine would produce for a given extension
    pub fn path_with_extension(&self, ext: &str) -> PathBuf {
        with_extension(&self.output_stem, ext)
    }
}

/// Append `ext` to `stem` without touching dots already in the stem
pub(crate) fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
