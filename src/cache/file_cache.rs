//! URL Cache Store
//!
//! Persists the URL -> local path mapping. The whole mapping is loaded at the
//! start of a batch and written back in full at the end; there is no locking
//! between concurrent batches, the last writer wins.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, trace};

use super::errors::CacheError;

/// In-memory view of the cache for a single batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    entries: BTreeMap<String, PathBuf>,
}

impl CacheSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lookup, regardless of whether the file still exists
    pub fn get(&self, url: &str) -> Option<&Path> {
        self.entries.get(url).map(PathBuf::as_path)
    }

    /// Lookup that only counts as a hit if the cached file is still on disk
    ///
    /// A stale entry is left in place; it is overwritten once a fresh
    /// download for the same URL succeeds.
    pub fn live_path(&self, url: &str) -> Option<&Path> {
        let path = self.get(url)?;
        if path.exists() {
            trace!(url = url, path = %path.display(), "Cache HIT");
            Some(path)
        } else {
            debug!(url = url, path = %path.display(), "Cached file is gone, treating as miss");
            None
        }
    }

    /// Insert or overwrite the entry for `url`
    pub fn put(&mut self, url: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(url.into(), path.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}

/// Backend that can load and persist a full cache snapshot
pub trait CacheStore: Send + Sync {
    /// Return the full persisted mapping, creating an empty one if none exists
    fn load(&self) -> Result<CacheSnapshot, CacheError>;

    /// Replace the persisted mapping with `snapshot`
    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError>;
}

/// Cache persisted as a single JSON object `{ "<url>": "<path>" }`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at `path`, creating the parent directory and an empty
    /// document if they do not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let store = Self { path: path.into() };

        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
            }
        }

        if !store.path.exists() {
            store.save(&CacheSnapshot::new())?;
            info!(path = %store.path.display(), "Initialized empty cache document");
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<CacheSnapshot, CacheError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.save(&CacheSnapshot::new())?;
                return Ok(CacheSnapshot::new());
            }
            Err(e) => return Err(CacheError::io(&self.path, e)),
        };

        if data.trim().is_empty() {
            return Ok(CacheSnapshot::new());
        }

        let entries: BTreeMap<String, PathBuf> =
            serde_json::from_str(&data).map_err(|source| CacheError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), entries = entries.len(), "Loaded cache");
        Ok(CacheSnapshot { entries })
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(&snapshot.entries)?;

        // Write atomically using tempfile
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| CacheError::io(parent, e))?;
        tmp.write_all(&json)
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| CacheError::io(&self.path, e.error))?;

        debug!(
            path = %self.path.display(),
            entries = snapshot.len(),
            "Saved cache"
        );
        Ok(())
    }
}

/// Cache kept in process memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<CacheSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of entries
    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<CacheSnapshot, CacheError> {
        let guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        let mut guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot.clone();
        Ok(())
    }
}
