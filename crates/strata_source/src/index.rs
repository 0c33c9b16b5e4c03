//! Per-layer source-directory index.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use strata_common::LayerId;

use crate::entry::SourceEntry;

/// Extension of layer descriptor files; directories holding one belong to
/// another layer and are not walked.
const DESCRIPTOR_EXTENSION: &str = "layer";

/// Every source file of one layer, grouped by directory relative to the layer root.
///
/// Only files whose extension is in the configured set are indexed. Hidden
/// entries (names starting with `.`) are skipped, as are nested directories
/// that carry their own layer descriptor.
#[derive(Debug, Clone, Default)]
pub struct SrcDirIndex {
    root: PathBuf,
    dirs: BTreeMap<PathBuf, Vec<SourceEntry>>,
}

impl SrcDirIndex {
    /// Walks `root` and indexes every matching source file.
    ///
    /// A missing root yields an empty index; a layer with no sources is valid.
    pub fn scan(
        layer: LayerId,
        root: &Path,
        prefix: &str,
        extensions: &[String],
    ) -> Result<Self, io::Error> {
        let mut index = Self {
            root: root.to_path_buf(),
            dirs: BTreeMap::new(),
        };
        if root.is_dir() {
            index.walk(layer, prefix, extensions, PathBuf::new(), true)?;
        }
        for files in index.dirs.values_mut() {
            files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        }
        Ok(index)
    }

    fn walk(
        &mut self,
        layer: LayerId,
        prefix: &str,
        extensions: &[String],
        rel_dir: PathBuf,
        is_root: bool,
    ) -> Result<(), io::Error> {
        let abs_dir = self.root.join(&rel_dir);
        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&abs_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                subdirs.push(rel_dir.join(name.as_ref()));
            } else if file_type.is_file() {
                files.push(rel_dir.join(name.as_ref()));
            }
        }

        if !is_root && files.iter().any(|f| has_extension(f, DESCRIPTOR_EXTENSION)) {
            return Ok(());
        }

        let entries: Vec<SourceEntry> = files
            .into_iter()
            .filter(|f| extensions.iter().any(|ext| has_extension(f, ext)))
            .map(|rel| SourceEntry::new(layer, prefix, &self.root, rel))
            .collect();
        if !entries.is_empty() {
            self.dirs.insert(rel_dir, entries);
        }

        subdirs.sort();
        for sub in subdirs {
            self.walk(layer, prefix, extensions, sub, false)?;
        }
        Ok(())
    }

    /// Returns the layer root this index was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the indexed directories (relative to the root) in sorted order.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.keys().map(|p| p.as_path())
    }

    /// Returns the source files in a directory, sorted by relative path.
    pub fn files_in(&self, rel_dir: &Path) -> &[SourceEntry] {
        self.dirs.get(rel_dir).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Iterates over every indexed source file.
    pub fn entries(&self) -> impl Iterator<Item = &SourceEntry> {
        self.dirs.values().flatten()
    }

    /// Finds the file defining the given qualified type name.
    pub fn find_type(&self, type_name: &str) -> Option<&SourceEntry> {
        self.entries().find(|e| e.type_name.as_str() == type_name)
    }

    /// Finds a file by its path relative to the layer root.
    pub fn find_rel(&self, rel_path: &Path) -> Option<&SourceEntry> {
        let dir = rel_path.parent().unwrap_or(Path::new(""));
        self.files_in(dir).iter().find(|e| e.rel_path == rel_path)
    }

    /// Returns the total number of indexed files.
    pub fn len(&self) -> usize {
        self.dirs.values().map(Vec::len).sum()
    }

    /// Returns `true` if no source files were found.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}
