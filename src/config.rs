//! Runtime configuration
//!
//! Everything lives under one data directory: the cache document, the
//! downloads directory, and the optional cookie file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::engine::ytdlp;

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const CACHE_FILE_NAME: &str = "cache.json";
pub const DOWNLOADS_DIR_NAME: &str = "downloads";
pub const COOKIES_FILE_NAME: &str = "cookies.txt";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind: SocketAddr,
    /// Root for cache, downloads and cookies
    pub data_dir: PathBuf,
    /// yt-dlp executable
    pub ytdlp_program: PathBuf,
    /// Container for merged video+audio; engine default when unset
    pub merge_output_format: Option<String>,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind: default_bind(),
            data_dir: data_dir.into(),
            ytdlp_program: PathBuf::from(ytdlp::DEFAULT_PROGRAM),
            merge_output_format: None,
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE_NAME)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join(DOWNLOADS_DIR_NAME)
    }

    pub fn cookies_file(&self) -> PathBuf {
        self.data_dir.join(COOKIES_FILE_NAME)
    }

    /// Create the data and downloads directories
    pub fn prepare(&self) -> Result<()> {
        let downloads = self.downloads_dir();
        std::fs::create_dir_all(&downloads)
            .with_context(|| format!("Failed to create downloads directory: {:?}", downloads))?;

        info!(
            data_dir = %self.data_dir.display(),
            cookies = self.cookies_file().exists(),
            "Data directory ready"
        );
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

/// Platform data dir (e.g. ~/.local/share/clipfetch), or ./data
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("clipfetch"))
        .unwrap_or_else(|| Path::new("data").to_path_buf())
}

/// Parse a bind address, accepting a bare port as shorthand for localhost
pub fn parse_bind(value: &str) -> Result<SocketAddr> {
    if let Ok(port) = value.parse::<u16>() {
        return Ok(SocketAddr::from(([127, 0, 0, 1], port)));
    }
    value
        .parse()
        .with_context(|| format!("Invalid bind address: {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_data_dir() {
        let config = Config::new("/srv/clipfetch");
        assert_eq!(config.cache_file(), PathBuf::from("/srv/clipfetch/cache.json"));
        assert_eq!(config.downloads_dir(), PathBuf::from("/srv/clipfetch/downloads"));
        assert_eq!(config.cookies_file(), PathBuf::from("/srv/clipfetch/cookies.txt"));
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.ytdlp_program, PathBuf::from("yt-dlp"));
        assert!(config.merge_output_format.is_none());
    }

    #[test]
    fn test_parse_bind() {
        assert_eq!(parse_bind("9000").unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(parse_bind("0.0.0.0:8080").unwrap().to_string(), "0.0.0.0:8080");
        assert!(parse_bind("localhost:abc").is_err());
    }

    #[test]
    fn test_prepare_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("data"));
        config.prepare().unwrap();
        assert!(config.downloads_dir().is_dir());
    }
}
