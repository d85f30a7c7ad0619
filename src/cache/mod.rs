//! URL cache layer
//!
//! Maps a source URL to the local file it was downloaded to, so repeated
//! requests for the same URL can skip the download engine.

pub mod errors;
pub mod file_cache;

pub use errors::CacheError;
pub use file_cache::{CacheSnapshot, CacheStore, JsonFileStore, MemoryStore};
