//! Response packaging
//!
//! One resolved file is handed back as is. Several are bundled into a zip
//! written next to the downloads, with each entry stored under its base name.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Download name for multi-file bundles
pub const BUNDLE_FILENAME: &str = "downloaded_videos.zip";

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Nothing to package")]
    Empty,

    #[error("Failed to write bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to build zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Packaging task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A file ready to be returned to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Location on disk
    pub path: PathBuf,
    /// Name presented to the client
    pub filename: String,
    pub content_type: &'static str,
}

/// Base name of `path` as a displayable string
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Package resolved files, writing any bundle into `bundle_dir`
pub fn package(files: &[PathBuf], bundle_dir: &Path) -> Result<Package, PackageError> {
    match files {
        [] => Err(PackageError::Empty),
        [single] => Ok(Package {
            path: single.clone(),
            filename: base_name(single),
            content_type: OCTET_STREAM,
        }),
        many => {
            let bundle = bundle_dir.join(format!("package_{}.zip", Uuid::new_v4().simple()));
            write_bundle(many, &bundle)?;
            Ok(Package {
                path: bundle,
                filename: BUNDLE_FILENAME.to_string(),
                content_type: ZIP_CONTENT_TYPE,
            })
        }
    }
}

/// Async wrapper running [`package`] on the blocking pool
pub async fn package_blocking(
    files: Vec<PathBuf>,
    bundle_dir: PathBuf,
) -> Result<Package, PackageError> {
    tokio::task::spawn_blocking(move || package(&files, &bundle_dir)).await?
}

fn write_bundle(files: &[PathBuf], bundle: &Path) -> Result<(), PackageError> {
    let io_err = |source| PackageError::Io {
        path: bundle.to_path_buf(),
        source,
    };

    let out = File::create(bundle).map_err(io_err)?;
    let mut zip = ZipWriter::new(out);
    // Media is already compressed
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);

    let mut written: HashSet<String> = HashSet::new();
    for path in files {
        let name = base_name(path);
        if written.contains(&name) {
            debug!(path = %path.display(), "Skipping duplicate bundle entry");
            continue;
        }

        let mut source = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "File vanished before bundling, skipping");
                continue;
            }
            Err(e) => {
                return Err(PackageError::Io {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        zip.start_file(name.as_str(), options)?;
        io::copy(&mut source, &mut zip).map_err(io_err)?;
        written.insert(name);
    }

    zip.finish()?;
    info!(bundle = %bundle.display(), entries = written.len(), "Wrote bundle");
    Ok(())
}
