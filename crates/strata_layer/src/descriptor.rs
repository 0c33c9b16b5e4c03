//! Layer descriptor files.
//!
//! A descriptor lives at `<searchRoot>/<dotted/name>/<base>.layer` and holds a
//! single `[layer]` table whose `name` must equal the expected dotted name.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use strata_common::name::{dotted_to_path, split_last};

/// File extension of layer descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "layer";

/// The declaration parsed from a layer descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDescriptor {
    /// The dotted layer name; must match the descriptor's location.
    pub name: String,
    /// Base layers, in order.
    #[serde(default)]
    pub extends: Vec<String>,
    /// Package prefix for the layer's types; inherited from a base when empty.
    #[serde(default)]
    pub package_prefix: String,
    /// Whether the layer is interpreted rather than compiled.
    #[serde(default)]
    pub dynamic: bool,
    /// Never treat the layer as dynamic.
    #[serde(default)]
    pub compiled_only: bool,
    /// Build this layer into its own output directory.
    #[serde(default)]
    pub build_separate: bool,
    /// Modifier applied to types that declare none.
    #[serde(default)]
    pub default_modifier: Option<String>,
    /// Lower values sort earlier among unrelated layers.
    #[serde(default)]
    pub sort_priority: i32,
    /// Layers whose features this layer replaces.
    #[serde(default)]
    pub replaces: Vec<String>,
    /// Runtimes this layer is restricted to; empty means all.
    #[serde(default)]
    pub runtimes: Vec<String>,
    /// Runtimes this layer is excluded from.
    #[serde(default)]
    pub exclude_runtimes: Vec<String>,
    /// Keep the layer known but out of the active stack.
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorFile {
    layer: LayerDescriptor,
}

/// Reasons a descriptor could not be turned into a [`LayerDescriptor`].
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// The descriptor file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The descriptor path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The descriptor is not valid TOML or has unknown fields.
    #[error("invalid layer descriptor {path}: {message}")]
    Syntax {
        /// The descriptor path.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },
    /// The declared name differs from the name implied by the file location.
    #[error("layer descriptor {path} declares '{found}', expected '{expected}'")]
    NameMismatch {
        /// The descriptor path.
        path: PathBuf,
        /// The name implied by the location.
        expected: String,
        /// The name in the file.
        found: String,
    },
}

/// Returns the descriptor path for `name` under one search root.
pub fn descriptor_path(search_root: &Path, name: &str) -> PathBuf {
    let (_, base) = split_last(name);
    search_root
        .join(dotted_to_path(name))
        .join(format!("{base}.{DESCRIPTOR_EXTENSION}"))
}

/// Reads and parses a descriptor, checking that it declares `expected_name`.
pub fn parse_descriptor(path: &Path, expected_name: &str) -> Result<LayerDescriptor, DescriptorError> {
    let content = std::fs::read_to_string(path).map_err(|e| DescriptorError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: DescriptorFile = toml::from_str(&content).map_err(|e| DescriptorError::Syntax {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    if file.layer.name != expected_name {
        return Err(DescriptorError::NameMismatch {
            path: path.to_path_buf(),
            expected: expected_name.to_string(),
            found: file.layer.name,
        });
    }
    Ok(file.layer)
}
