//! Batch resolution
//!
//! Turns a newline-separated URL list into local files, reusing cached
//! downloads whose files are still on disk. The cache snapshot is persisted
//! only once every URL in the batch has resolved; a failure anywhere leaves
//! the stored cache exactly as it was before the batch started.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::cache::{CacheError, CacheStore};
use crate::engine::{DownloadError, DownloadRequest, Downloader};

/// Errors that abort a whole batch
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("No URLs provided")]
    EmptyUrlList,

    #[error("{url}: {source}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ServiceError {
    /// Whether the caller supplied bad input
    pub fn is_validation(&self) -> bool {
        match self {
            ServiceError::EmptyUrlList => true,
            ServiceError::Download { source, .. } => source.is_validation(),
            ServiceError::Cache(_) => false,
        }
    }
}

/// A batch as submitted by the user
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Raw newline-separated URL list
    pub urls: String,
    pub quality: String,
    pub audio_only: bool,
}

impl BatchRequest {
    /// Trimmed, non-empty URLs in submission order
    pub fn url_list(&self) -> Vec<&str> {
        split_urls(&self.urls)
    }
}

/// Files resolved for a batch, in submission order
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub files: Vec<PathBuf>,
    /// URLs served from cache
    pub hits: usize,
    /// URLs handed to the engine
    pub downloads: usize,
}

/// Line boundaries accepted between URLs
const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\x0b', '\x0c', '\x1c', '\x1d', '\x1e', '\u{85}', '\u{2028}', '\u{2029}',
];

/// Split on any line break (bare `\r` included), trim, drop blanks
pub fn split_urls(raw: &str) -> Vec<&str> {
    raw.split(LINE_BREAKS)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Resolves URL batches against the cache and the downloader
#[derive(Clone)]
pub struct FetchService {
    cache: Arc<dyn CacheStore>,
    downloader: Downloader,
}

impl FetchService {
    pub fn new(cache: Arc<dyn CacheStore>, downloader: Downloader) -> Self {
        Self { cache, downloader }
    }

    /// Resolve every URL in the batch, one at a time
    pub async fn resolve_batch(&self, batch: &BatchRequest) -> Result<BatchOutcome, ServiceError> {
        let urls = batch.url_list();
        if urls.is_empty() {
            return Err(ServiceError::EmptyUrlList);
        }

        let mut snapshot = self.cache.load()?;
        let mut outcome = BatchOutcome::default();

        for url in urls {
            if let Some(path) = snapshot.live_path(url) {
                debug!(url = url, path = %path.display(), "Reusing cached download");
                outcome.files.push(path.to_path_buf());
                outcome.hits += 1;
                continue;
            }

            let request = DownloadRequest::new(url, batch.quality.as_str(), batch.audio_only);
            let path = match self.downloader.fetch(&request).await {
                Ok(path) => path,
                Err(source) => {
                    error!(url = url, error = %source, "Download failed, aborting batch");
                    return Err(ServiceError::Download {
                        url: url.to_string(),
                        source,
                    });
                }
            };

            snapshot.put(url, path.clone());
            outcome.files.push(path);
            outcome.downloads += 1;
        }

        self.cache.save(&snapshot)?;

        info!(
            files = outcome.files.len(),
            hits = outcome.hits,
            downloads = outcome.downloads,
            "Batch resolved"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSnapshot, JsonFileStore, MemoryStore};
    use crate::engine::downloader::testing::FakeEngine;
    use crate::engine::FormatSpec;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        downloads: PathBuf,
        engine: Arc<FakeEngine>,
        cache: Arc<MemoryStore>,
        service: FetchService,
    }

    fn fixture_with(engine: FakeEngine, cache: MemoryStore) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        let engine = Arc::new(engine);
        let cache = Arc::new(cache);
        let service = FetchService::new(cache.clone(), Downloader::new(engine.clone(), &downloads));
        Fixture {
            _dir: dir,
            downloads,
            engine,
            cache,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeEngine::new(), MemoryStore::new())
    }

    fn batch(urls: &str) -> BatchRequest {
        BatchRequest {
            urls: urls.to_string(),
            quality: "720".to_string(),
            audio_only: false,
        }
    }

    #[test]
    fn test_split_urls() {
        assert_eq!(
            split_urls("  https://a/1 \n\n\t\nhttps://a/2\r\n"),
            vec!["https://a/1", "https://a/2"]
        );
        assert!(split_urls(" \n \n").is_empty());
        assert_eq!(
            split_urls("https://a/1\rhttps://a/2"),
            vec!["https://a/1", "https://a/2"]
        );
        assert_eq!(
            split_urls("https://a/1\u{2028}https://a/2\x0chttps://a/3"),
            vec!["https://a/1", "https://a/2", "https://a/3"]
        );
    }

    #[tokio::test]
    async fn test_relative_downloads_dir_caches_absolute_paths() {
        let relative = PathBuf::from(format!("clipfetch-rel-{}", uuid::Uuid::new_v4()));
        let downloads = relative.join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();

        let cache = Arc::new(MemoryStore::new());
        let service = FetchService::new(
            cache.clone(),
            Downloader::new(Arc::new(FakeEngine::new()), &downloads),
        );
        let result = service.resolve_batch(&batch("https://a/1")).await;
        let cached = cache.load().unwrap();
        std::fs::remove_dir_all(&relative).unwrap();

        result.unwrap();
        let path = cached.get("https://a/1").unwrap();
        assert!(path.is_absolute());
        assert!(path.parent().unwrap().ends_with(&downloads));
    }

    #[tokio::test]
    async fn test_download_populates_cache() {
        let fx = fixture();
        let outcome = fx.service.resolve_batch(&batch("https://a/1")).await.unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.downloads, 1);
        let cached = fx.cache.load().unwrap();
        let path = cached.get("https://a/1").unwrap();
        assert!(path.exists());
        assert_eq!(path, outcome.files[0].as_path());
        assert!(path.starts_with(&fx.downloads));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_engine() {
        let fx = fixture();
        let first = fx.service.resolve_batch(&batch("https://a/1")).await.unwrap();
        let second = fx.service.resolve_batch(&batch("https://a/1")).await.unwrap();

        assert_eq!(fx.engine.call_count(), 1);
        assert_eq!(second.hits, 1);
        assert_eq!(second.downloads, 0);
        assert_eq!(first.files, second.files);
    }

    #[tokio::test]
    async fn test_deleted_file_is_downloaded_again() {
        let fx = fixture();
        let first = fx.service.resolve_batch(&batch("https://a/1")).await.unwrap();
        std::fs::remove_file(&first.files[0]).unwrap();

        let second = fx.service.resolve_batch(&batch("https://a/1")).await.unwrap();

        assert_eq!(fx.engine.call_count(), 2);
        assert_ne!(first.files[0], second.files[0]);
        assert_eq!(
            fx.cache.load().unwrap().get("https://a/1"),
            Some(second.files[0].as_path())
        );
    }

    #[tokio::test]
    async fn test_stale_entry_from_prior_run() {
        let mut seeded = CacheSnapshot::new();
        seeded.put("https://a/1", "/nonexistent/clipfetch/old.mp4");
        let fx = fixture_with(FakeEngine::new(), MemoryStore::with_snapshot(seeded));

        let outcome = fx.service.resolve_batch(&batch("https://a/1")).await.unwrap();
        assert_eq!(outcome.downloads, 1);
        assert_ne!(
            fx.cache.load().unwrap().get("https://a/1"),
            Some(Path::new("/nonexistent/clipfetch/old.mp4"))
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_validation_error() {
        let fx = fixture();
        for urls in ["", "   ", "\n \n\t"] {
            let err = fx.service.resolve_batch(&batch(urls)).await.unwrap_err();
            assert!(matches!(err, ServiceError::EmptyUrlList));
            assert!(err.is_validation());
        }
        assert_eq!(fx.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_order_preserved_and_blanks_skipped() {
        let fx = fixture();
        let outcome = fx
            .service
            .resolve_batch(&batch("https://a/1\n\n  https://a/2  \nhttps://a/3"))
            .await
            .unwrap();

        let urls: Vec<String> = fx.engine.calls().into_iter().map(|(u, _)| u).collect();
        assert_eq!(urls, vec!["https://a/1", "https://a/2", "https://a/3"]);
        assert_eq!(outcome.files.len(), 3);
        for (file, url) in outcome.files.iter().zip(&urls) {
            assert_eq!(std::fs::read_to_string(file).unwrap(), *url);
        }
    }

    #[tokio::test]
    async fn test_failure_aborts_batch_and_persists_nothing() {
        let fx = fixture_with(FakeEngine::new().failing_on("https://a/2"), MemoryStore::new());

        let err = fx
            .service
            .resolve_batch(&batch("https://a/1\nhttps://a/2\nhttps://a/3"))
            .await
            .unwrap_err();

        match &err {
            ServiceError::Download { url, .. } => assert_eq!(url, "https://a/2"),
            other => panic!("Expected Download error, got {:?}", other),
        }
        assert!(!err.is_validation());
        // a/3 never attempted, a/1 not persisted
        assert_eq!(fx.engine.call_count(), 2);
        assert!(fx.cache.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.mp4");
        std::fs::write(&kept, b"kept").unwrap();
        let mut seeded = CacheSnapshot::new();
        seeded.put("https://a/0", &kept);
        seeded.put("https://a/stale", "/nonexistent/clipfetch/stale.mp4");

        let fx = fixture_with(
            FakeEngine::new().failing_on("https://a/2"),
            MemoryStore::with_snapshot(seeded.clone()),
        );
        let err = fx
            .service
            .resolve_batch(&batch("https://a/0\nhttps://a/1\nhttps://a/stale\nhttps://a/2"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Download { .. }));
        // a/1 and the refreshed a/stale were resolved in memory only
        assert_eq!(fx.engine.call_count(), 3);
        assert_eq!(fx.cache.load().unwrap(), seeded);
    }

    #[tokio::test]
    async fn test_duplicate_url_downloads_once() {
        let fx = fixture();
        let outcome = fx
            .service
            .resolve_batch(&batch("https://a/1\nhttps://a/1"))
            .await
            .unwrap();

        assert_eq!(fx.engine.call_count(), 1);
        assert_eq!(outcome.hits, 1);
        assert_eq!(outcome.files[0], outcome.files[1]);
    }

    #[tokio::test]
    async fn test_audio_batch_ignores_quality() {
        let fx = fixture();
        let outcome = fx
            .service
            .resolve_batch(&BatchRequest {
                urls: "https://a/1".to_string(),
                quality: "whatever".to_string(),
                audio_only: true,
            })
            .await
            .unwrap();

        assert_eq!(fx.engine.calls()[0].1, FormatSpec::Audio);
        assert_eq!(
            outcome.files[0].extension().and_then(|e| e.to_str()),
            Some("mp3")
        );
    }

    #[tokio::test]
    async fn test_invalid_quality_is_validation_error() {
        let fx = fixture();
        let err = fx
            .service
            .resolve_batch(&BatchRequest {
                urls: "https://a/1".to_string(),
                quality: "high".to_string(),
                audio_only: false,
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(fx.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_json_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        let cache_path = dir.path().join("cache.json");
        let engine = Arc::new(FakeEngine::new());

        let service = FetchService::new(
            Arc::new(JsonFileStore::open(&cache_path).unwrap()),
            Downloader::new(engine.clone(), &downloads),
        );
        service.resolve_batch(&batch("https://a/1")).await.unwrap();

        // Fresh store instance reading the same document
        let restarted = FetchService::new(
            Arc::new(JsonFileStore::open(&cache_path).unwrap()),
            Downloader::new(engine.clone(), &downloads),
        );
        let outcome = restarted.resolve_batch(&batch("https://a/1")).await.unwrap();

        assert_eq!(outcome.hits, 1);
        assert_eq!(engine.call_count(), 1);
    }
}
