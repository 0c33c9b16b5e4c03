//! Immutable records for individual source files.

use std::path::PathBuf;

use strata_common::{LayerId, QualifiedName};

/// One source file discovered in a layer's source directory.
///
/// The qualified type name is the layer's package prefix followed by the
/// file's path relative to the layer root, with the extension stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// The layer whose directory holds this file.
    pub layer: LayerId,
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// Path relative to the layer root.
    pub rel_path: PathBuf,
    /// The qualified type name this file defines.
    pub type_name: QualifiedName,
}

impl SourceEntry {
    /// Creates an entry, deriving the type name from `prefix` and `rel_path`.
    pub fn new(layer: LayerId, prefix: &str, root: &std::path::Path, rel_path: PathBuf) -> Self {
        let type_name = QualifiedName::from_source_path(prefix, &rel_path);
        Self {
            layer,
            abs_path: root.join(&rel_path),
            rel_path,
            type_name,
        }
    }

    /// Returns the directory of this file relative to the layer root.
    ///
    /// Files at the layer root report an empty path.
    pub fn rel_dir(&self) -> PathBuf {
        self.rel_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    }

    /// Returns the file extension without the leading dot, or `""`.
    pub fn extension(&self) -> &str {
        self.rel_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}
