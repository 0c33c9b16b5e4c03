//! Persisted per-layer type indexes.
//!
//! Each layer's index lists the types its sources define. Indexes are stored
//! per runtime under `idx/types_<runtime>/<normalized layer>.idx` and are
//! only trusted while no file in the layer's tree is newer than the index.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::name::normalize_layer_name;
use strata_source::modified_time;

use crate::artifact::ArtifactStore;
use crate::error::CacheError;
use crate::hasher::SourceHasher;

const INDEX_EXT: &str = "idx";

/// The types defined by one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIndex {
    /// Dotted layer name.
    pub layer: String,
    /// One entry per source file, sorted by type name.
    pub entries: Vec<TypeIndexEntry>,
}

/// One indexed type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIndexEntry {
    /// Qualified type name.
    pub type_name: String,
    /// Source path relative to the layer root.
    pub rel_path: PathBuf,
}

/// Reads and writes [`TypeIndex`] files for every runtime.
pub struct TypeIndexStore {
    store: ArtifactStore,
}

impl TypeIndexStore {
    /// Creates a store under `<build_root>/idx`.
    pub fn new(build_root: &Path) -> Self {
        Self {
            store: ArtifactStore::new(&build_root.join("idx")),
        }
    }

    fn subdir(runtime: &str) -> String {
        format!("types_{}", normalize_layer_name(runtime))
    }

    /// Path of the index file for `layer` under `runtime`.
    pub fn index_path(&self, runtime: &str, layer: &str) -> PathBuf {
        self.store
            .artifact_path(&Self::subdir(runtime), &normalize_layer_name(layer), INDEX_EXT)
    }

    /// Writes the index for one layer.
    pub fn save(&self, runtime: &str, index: &TypeIndex) -> Result<(), CacheError> {
        let data = bincode::serde::encode_to_vec(index, bincode::config::standard()).map_err(
            |e| CacheError::Serialization {
                reason: e.to_string(),
            },
        )?;
        self.store.write_artifact(
            &Self::subdir(runtime),
            &normalize_layer_name(&index.layer),
            INDEX_EXT,
            &data,
        )?;
        Ok(())
    }

    /// Loads the index for `layer` if it exists, validates, and is not older
    /// than any file under `layer_root`.
    pub fn load(&self, runtime: &str, layer: &str, layer_root: &Path) -> Option<TypeIndex> {
        let index_time = modified_time(&self.index_path(runtime, layer))?;
        if let Some(tree_time) = SourceHasher::newest_mtime(layer_root) {
            if tree_time > index_time {
                return None;
            }
        }
        let data = self.store.read_artifact(
            &Self::subdir(runtime),
            &normalize_layer_name(layer),
            INDEX_EXT,
        )?;
        let (index, _): (TypeIndex, usize) =
            bincode::serde::decode_from_slice(&data, bincode::config::standard()).ok()?;
        (index.layer == layer).then_some(index)
    }

    /// Removes the indexes of layers that are no longer in `live_layers`.
    pub fn retain(&self, runtime: &str, live_layers: &[String]) -> Result<usize, CacheError> {
        let keys: Vec<String> = live_layers.iter().map(|l| normalize_layer_name(l)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.store.gc(&Self::subdir(runtime), INDEX_EXT, &keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn index() -> TypeIndex {
        TypeIndex {
            layer: "app.main".into(),
            entries: vec![TypeIndexEntry {
                type_name: "app.Customer".into(),
                rel_path: PathBuf::from("Customer.sc"),
            }],
        }
    }

    fn backdate(path: &Path, secs: u64) {
        File::open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn save_and_load_when_fresh() {
        let build = tempfile::tempdir().unwrap();
        let layer = tempfile::tempdir().unwrap();
        std::fs::write(layer.path().join("Customer.sc"), "type Customer").unwrap();
        backdate(&layer.path().join("Customer.sc"), 100);
        backdate(layer.path(), 100);

        let store = TypeIndexStore::new(build.path());
        store.save("jvm", &index()).unwrap();
        assert!(store.index_path("jvm", "app.main").ends_with("idx/types_jvm/app_main.idx"));
        assert_eq!(store.load("jvm", "app.main", layer.path()), Some(index()));
        assert!(store.load("js", "app.main", layer.path()).is_none());
    }

    #[test]
    fn stale_when_tree_is_newer() {
        let build = tempfile::tempdir().unwrap();
        let layer = tempfile::tempdir().unwrap();
        let store = TypeIndexStore::new(build.path());
        store.save("jvm", &index()).unwrap();
        backdate(&store.index_path("jvm", "app.main"), 100);
        std::fs::write(layer.path().join("New.sc"), "type New").unwrap();
        assert!(store.load("jvm", "app.main", layer.path()).is_none());
    }

    #[test]
    fn retain_drops_removed_layers() {
        let build = tempfile::tempdir().unwrap();
        let store = TypeIndexStore::new(build.path());
        store.save("jvm", &index()).unwrap();
        let mut other = index();
        other.layer = "app.old".into();
        store.save("jvm", &other).unwrap();
        assert_eq!(store.retain("jvm", &["app.main".to_string()]).unwrap(), 1);
    }
}
