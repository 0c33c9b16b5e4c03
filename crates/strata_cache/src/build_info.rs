//! Per-build-layer build information.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::error::CacheError;

/// Name of the build-info file inside a build layer's output directory.
pub const BUILD_INFO_FILE: &str = "build-info.json";

/// What one build layer produced, read back by the next build of the same
/// layer and by every later build layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Dotted name of the build layer.
    pub layer: String,
    /// Type groups discovered in the layer, each with its ordered members.
    pub type_groups: BTreeMap<String, Vec<String>>,
    /// Types compiled into this build layer, mapped to the layer whose
    /// source defined them.
    pub compiled_artifacts: BTreeMap<String, String>,
    /// Hash of every generated file, keyed by path relative to the
    /// generated-source root. Later build layers compare against these to
    /// detect inherited outputs.
    pub generated_hashes: BTreeMap<PathBuf, ContentHash>,
    /// Set when a pass starts and cleared when it completes. A set flag on
    /// load means the last pass was cut short.
    pub interrupted: bool,
}

impl BuildInfo {
    /// Creates empty build info for `layer`.
    pub fn new(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            ..Self::default()
        }
    }

    /// Loads build info from a build layer directory, or `None` on any failure.
    pub fn load(build_layer_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(build_layer_dir.join(BUILD_INFO_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Writes build info into a build layer directory.
    pub fn save(&self, build_layer_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(build_layer_dir)
            .map_err(|e| CacheError::io(build_layer_dir, e))?;
        let path = build_layer_dir.join(BUILD_INFO_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(&path, e))
    }
}
