//! File change detection
//!
//! Compares the current build manifest with the hash map recorded by the
//! previous deploy and classifies every path as added, modified, unchanged
//! or deleted.

use crate::hash::{FileHashMap, LocalFile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Classification of a single path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum FileChange {
    /// Not present in the previous deploy
    Added { path: String, hash: String },
    /// Present with a different hash
    Modified {
        path: String,
        hash: String,
        previous_hash: String,
    },
    /// Present with the same hash
    Unchanged {
        path: String,
        hash: String,
        previous_hash: String,
    },
    /// Present before, gone from the current manifest
    Deleted { path: String, previous_hash: String },
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            FileChange::Added { path, .. }
            | FileChange::Modified { path, .. }
            | FileChange::Unchanged { path, .. }
            | FileChange::Deleted { path, .. } => path,
        }
    }

    /// Hash of the current contents, absent for deleted paths
    pub fn hash(&self) -> Option<&str> {
        match self {
            FileChange::Added { hash, .. }
            | FileChange::Modified { hash, .. }
            | FileChange::Unchanged { hash, .. } => Some(hash),
            FileChange::Deleted { .. } => None,
        }
    }

    pub fn previous_hash(&self) -> Option<&str> {
        match self {
            FileChange::Added { .. } => None,
            FileChange::Modified { previous_hash, .. }
            | FileChange::Unchanged { previous_hash, .. }
            | FileChange::Deleted { previous_hash, .. } => Some(previous_hash),
        }
    }
}

/// All changes between two deploys, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: Vec<FileChange>,
    pub modified: Vec<FileChange>,
    pub unchanged: Vec<FileChange>,
    pub deleted: Vec<FileChange>,
}

impl FileChanges {
    /// Number of paths that require remote work.
    ///
    /// Unchanged files are excluded.
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }

    /// Files from `manifest` that are new or changed
    pub fn files_to_upload<'a>(&self, manifest: &'a [LocalFile]) -> Vec<&'a LocalFile> {
        let wanted: HashSet<&str> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .map(|c| c.path())
            .collect();
        manifest
            .iter()
            .filter(|f| wanted.contains(f.path.as_str()))
            .collect()
    }

    /// Paths to remove from the remote store
    pub fn paths_to_delete(&self) -> Vec<String> {
        self.deleted.iter().map(|c| c.path().to_string()).collect()
    }

    pub fn stats(&self) -> IncrementalStats {
        IncrementalStats {
            needs_upload: self.added.len() + self.modified.len(),
            can_skip: self.unchanged.len(),
            needs_delete: self.deleted.len(),
        }
    }
}

impl std::fmt::Display for FileChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} modified, {} deleted, {} unchanged",
            self.added.len(),
            self.modified.len(),
            self.deleted.len(),
            self.unchanged.len()
        )
    }
}

/// Upload/skip/delete counts for an incremental deploy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalStats {
    pub needs_upload: usize,
    pub can_skip: usize,
    pub needs_delete: usize,
}

/// Classify `current` against the `previous` hash map.
///
/// Duplicate paths in `current` are a caller error and are not detected.
pub fn detect_changes(current: &[LocalFile], previous: &FileHashMap) -> FileChanges {
    let mut changes = FileChanges::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(current.len());

    for file in current {
        seen.insert(file.path.as_str());
        match previous.get(&file.path) {
            None => changes.added.push(FileChange::Added {
                path: file.path.clone(),
                hash: file.hash.clone(),
            }),
            Some(prev) if *prev != file.hash => changes.modified.push(FileChange::Modified {
                path: file.path.clone(),
                hash: file.hash.clone(),
                previous_hash: prev.clone(),
            }),
            Some(prev) => changes.unchanged.push(FileChange::Unchanged {
                path: file.path.clone(),
                hash: file.hash.clone(),
                previous_hash: prev.clone(),
            }),
        }
    }

    for (path, prev) in previous {
        if !seen.contains(path.as_str()) {
            changes.deleted.push(FileChange::Deleted {
                path: path.clone(),
                previous_hash: prev.clone(),
            });
        }
    }

    tracing::debug!(%changes, "detected file changes");
    changes
}
