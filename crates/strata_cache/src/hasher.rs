//! Content hashing and directory-listing change detection.

use std::path::Path;
use std::time::SystemTime;

use strata_common::ContentHash;

use crate::error::CacheError;
use crate::record::DependencyRecord;

/// Files added to or removed from a directory since its record was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirDiff {
    /// File names present now but not in the record.
    pub added: Vec<String>,
    /// File names in the record but no longer present.
    pub removed: Vec<String>,
}

impl DirDiff {
    /// Returns `true` if the listing is unchanged.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Utility for hashing files and comparing listings against records.
pub struct SourceHasher;

impl SourceHasher {
    /// Computes the content hash of a single file.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
        Ok(ContentHash::from_bytes(&content))
    }

    /// Compares the live file names of a directory against a record.
    ///
    /// Both result lists are sorted.
    pub fn diff_listing(current: &[String], record: &DependencyRecord) -> DirDiff {
        let mut added: Vec<String> = current
            .iter()
            .filter(|name| !record.entries.contains_key(*name))
            .cloned()
            .collect();
        let mut removed: Vec<String> = record
            .entries
            .keys()
            .filter(|name| !current.contains(name))
            .cloned()
            .collect();
        added.sort();
        removed.sort();
        DirDiff { added, removed }
    }

    /// Returns the newest modification time of `root` and everything below
    /// it, skipping hidden entries, or `None` if `root` does not exist.
    pub fn newest_mtime(root: &Path) -> Option<SystemTime> {
        let meta = std::fs::metadata(root).ok()?;
        let mut newest = meta.modified().ok()?;
        if meta.is_dir() {
            let entries = std::fs::read_dir(root).ok()?;
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if let Some(t) = Self::newest_mtime(&entry.path()) {
                    newest = newest.max(t);
                }
            }
        }
        Some(newest)
    }
}
