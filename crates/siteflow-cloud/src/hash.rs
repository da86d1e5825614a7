//! Content hashing and local file scanning
//!
//! Every deployable file is addressed by the SHA-256 of its contents.
//! Paths are stored relative to the build directory, forward-slash
//! normalized and without a leading slash, so the same tree hashes to
//! the same map on every platform.

use crate::error::{CloudError, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Names skipped while scanning a build directory
pub const DEFAULT_EXCLUDES: &[&str] = &[".DS_Store", "Thumbs.db", ".git"];

/// Deployment-relative path to hex content hash
pub type FileHashMap = BTreeMap<String, String>;

/// A file found in the local build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Relative key, e.g. `assets/app.js`
    pub path: String,
    /// Location on disk
    pub absolute_path: PathBuf,
    /// Hex SHA-256 of the contents
    pub hash: String,
    pub size: u64,
}

impl LocalFile {
    /// Build an entry that only carries a path and hash (no backing file).
    pub fn virtual_entry(path: impl Into<String>, hash: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            absolute_path: PathBuf::from(&path),
            path,
            hash: hash.into(),
            size: 0,
        }
    }
}

/// Hash a byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a file on disk without loading it fully into memory
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Convert a path below `root` into a deployment key.
///
/// Returns `None` for paths outside `root` or the root itself.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Walk `root` and hash every regular file, skipping `exclude` names.
///
/// Entries come back sorted by path.
pub fn scan_directory(root: &Path, exclude: &[&str]) -> Result<Vec<LocalFile>> {
    if !root.is_dir() {
        return Err(CloudError::BuildOutputNotFound(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|name| !exclude.contains(&name))
                .unwrap_or(true)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| CloudError::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = relative_key(root, entry.path()) else {
            continue;
        };
        let hash = hash_file(entry.path())?;
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        files.push(LocalFile {
            path: key,
            absolute_path: entry.path().to_path_buf(),
            hash,
            size,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), files = files.len(), "scanned build output");
    Ok(files)
}

/// [`scan_directory`] on the blocking pool, for callers inside the runtime
pub async fn scan_build_output(root: PathBuf, exclude: Vec<String>) -> Result<Vec<LocalFile>> {
    tokio::task::spawn_blocking(move || {
        let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
        scan_directory(&root, &exclude)
    })
    .await?
}

/// Collapse a manifest into the persisted hash map form
pub fn to_hash_map(files: &[LocalFile]) -> FileHashMap {
    files
        .iter()
        .map(|f| (f.path.clone(), f.hash.clone()))
        .collect()
}

/// MIME type sent with an uploaded object
pub fn content_type_for(path: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Cache-Control header for an uploaded object.
///
/// HTML is revalidated on every request; everything else is expected to be
/// fingerprinted by the build tool.
pub fn cache_control_for(path: &str) -> &'static str {
    if path.ends_with(".html") || path.ends_with(".htm") {
        "no-cache"
    } else {
        "public, max-age=31536000, immutable"
    }
}
