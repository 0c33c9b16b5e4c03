//! Dotted qualified names for types and layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A dotted, fully qualified name such as `app.model.Customer`.
///
/// Type names are derived from a source file's location: the owning layer's
/// package prefix followed by the file's path relative to the layer root,
/// with separators turned into dots and the extension stripped. Layer names
/// use the same dotted form and map onto directories the same way.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Wraps an already-dotted name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives a type name from a package prefix and a layer-relative path.
    ///
    /// `("app", "model/Customer.sc")` becomes `app.model.Customer`; an empty
    /// prefix yields `model.Customer`.
    pub fn from_source_path(prefix: &str, rel_path: &Path) -> Self {
        let stem = rel_path.with_extension("");
        let mut segments: Vec<String> = Vec::new();
        if !prefix.is_empty() {
            segments.push(prefix.to_string());
        }
        for component in stem.components() {
            if let Component::Normal(part) = component {
                segments.push(part.to_string_lossy().into_owned());
            }
        }
        Self(segments.join("."))
    }

    /// Returns the full dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the package part (everything before the last dot), or `""`.
    pub fn package(&self) -> &str {
        split_last(&self.0).0
    }

    /// Returns the base name (the last dotted segment).
    pub fn base_name(&self) -> &str {
        split_last(&self.0).1
    }

    /// Maps the dotted name onto a relative directory path (`a.b.c` → `a/b/c`).
    pub fn to_path(&self) -> PathBuf {
        dotted_to_path(&self.0)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Splits a dotted name into `(package, base)`.
pub fn split_last(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((pkg, base)) => (pkg, base),
        None => ("", name),
    }
}

/// Maps a dotted name onto a relative directory path.
pub fn dotted_to_path(name: &str) -> PathBuf {
    name.split('.').filter(|s| !s.is_empty()).collect()
}

/// Normalizes a dotted layer name into a single file-name-safe token.
///
/// Used to key per-layer persisted files (`app.main` → `app_main`).
pub fn normalize_layer_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
