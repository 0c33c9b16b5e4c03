//! Checksummed binary artifact storage.
//!
//! Artifacts are stored as binary files in subdirectories of a store root.
//! Each artifact has a header containing magic bytes, format version, and a
//! checksum for integrity validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::error::CacheError;

/// Magic bytes identifying a Strata artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"STRA";

/// Current artifact format version. Increment on breaking changes to
/// the header or payload format.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Header prepended to every stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"STRA"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Content hash of the payload data.
    pub checksum: ContentHash,
}

/// Store for binary artifacts under caller-chosen keys.
///
/// Each artifact is stored at `<root>/<subdir>/<key>.<ext>` with a validated
/// binary header.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a new artifact store rooted at the given directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Ensures that the given subdirectory exists.
    pub fn ensure_dirs(&self, subdir: &str) -> Result<(), CacheError> {
        let dir = self.root.join(subdir);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir,
            source: e,
        })
    }

    /// Returns the file path for an artifact with the given key.
    pub fn artifact_path(&self, subdir: &str, key: &str, ext: &str) -> PathBuf {
        self.root.join(subdir).join(format!("{key}.{ext}"))
    }

    /// Writes an artifact under `key`, replacing any previous one.
    pub fn write_artifact(
        &self,
        subdir: &str,
        key: &str,
        ext: &str,
        data: &[u8],
    ) -> Result<PathBuf, CacheError> {
        self.ensure_dirs(subdir)?;
        let path = self.artifact_path(subdir, key, ext);

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        std::fs::write(&path, &output).map_err(|e| CacheError::io(&path, e))?;
        Ok(path)
    }

    /// Reads an artifact, validating its header.
    ///
    /// Returns `None` if the file doesn't exist, the header is invalid,
    /// the format version doesn't match, or the checksum doesn't verify.
    pub fn read_artifact(&self, subdir: &str, key: &str, ext: &str) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.artifact_path(subdir, key, ext)).ok()?;
        if raw.len() < 4 {
            return None;
        }

        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: ArtifactHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;
        if header.magic != ARTIFACT_MAGIC || header.format_version != ARTIFACT_FORMAT_VERSION {
            return None;
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }
        Some(payload.to_vec())
    }

    /// Removes artifacts whose key is not in `live_keys`, returning how many
    /// were removed.
    pub fn gc(&self, subdir: &str, ext: &str, live_keys: &[&str]) -> Result<usize, CacheError> {
        let dir = self.root.join(subdir);
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !live_keys.contains(&stem) {
                    std::fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
