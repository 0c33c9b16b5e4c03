//! Per-directory dependency records.
//!
//! One record exists per (layer, source directory, phase). It maps each
//! source file in the directory to what was generated from it last time and
//! what it depended on, so the next build can decide which files to redo.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::error::CacheError;

/// Current record format. Records with another version are ignored.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// Milliseconds since the Unix epoch, saturating at zero for earlier times.
pub fn millis_since_epoch(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The dependency record for one source directory of one layer and phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Format version; see [`RECORD_FORMAT_VERSION`].
    pub format_version: u32,
    /// Dotted name of the owning layer.
    pub layer: String,
    /// Build phase name.
    pub phase: String,
    /// Start time of the pass that wrote this record, in epoch milliseconds.
    pub build_time_ms: u64,
    /// Per-file entries keyed by file name within the directory.
    pub entries: BTreeMap<String, DependencyEntry>,
}

/// What one source file produced and depended on in the last build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Generated outputs, relative to the layer's generated-source root.
    pub outputs: Vec<GeneratedOutput>,
    /// Absolute paths of source files this file depends on.
    pub file_deps: BTreeSet<PathBuf>,
    /// Types this file depends on, mapped to the layer that defined each one.
    pub type_deps: BTreeMap<String, String>,
    /// Type groups this file's type is a member of.
    pub groups: Vec<String>,
    /// Type groups whose membership this file's output is derived from.
    pub group_deps: Vec<String>,
    /// The outputs are submitted to the toolchain.
    #[serde(default)]
    pub needs_compile: bool,
    /// The file failed to parse, generate, or compile last time.
    pub errored: bool,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    /// Path relative to the generated-source root.
    pub rel_path: PathBuf,
    /// Content hash of the generated bytes.
    pub hash: ContentHash,
    /// An earlier build layer produced identical bytes; only a zero-length
    /// marker was written here and the file is not compiled again.
    pub inherited: bool,
}

impl DependencyRecord {
    /// Creates an empty record stamped with `build_time`.
    pub fn new(layer: &str, phase: &str, build_time: SystemTime) -> Self {
        Self {
            format_version: RECORD_FORMAT_VERSION,
            layer: layer.to_string(),
            phase: phase.to_string(),
            build_time_ms: millis_since_epoch(build_time),
            entries: BTreeMap::new(),
        }
    }

    /// The build time as a [`SystemTime`].
    pub fn build_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.build_time_ms)
    }

    /// Returns `true` if `t` is strictly later than this record's build time.
    pub fn is_older_than(&self, t: SystemTime) -> bool {
        millis_since_epoch(t) > self.build_time_ms
    }

    /// Loads a record, returning `None` if it is missing, unreadable, or of
    /// another format version.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let record: Self = serde_json::from_str(&content).ok()?;
        (record.format_version == RECORD_FORMAT_VERSION).then_some(record)
    }

    /// Writes the record, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| CacheError::io(path, e))
    }
}
