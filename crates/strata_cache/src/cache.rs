//! Build-root layout and access to persisted build state.
//!
//! ```text
//! <build_root>/
//!   deps/<package path>/<rel dir>/<layer>-<phase>.deps
//!   layers/<layer>/build-info.json
//!   layers/<layer>/gen/...        generated sources
//!   layers/<layer>/classes/...    compiled artifacts
//!   idx/types_<runtime>/<layer>.idx
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use strata_common::name::{dotted_to_path, normalize_layer_name};

use crate::build_info::BuildInfo;
use crate::error::CacheError;
use crate::record::DependencyRecord;
use crate::type_index::TypeIndexStore;

/// Entry point to everything persisted under one build root.
pub struct BuildCache {
    build_root: PathBuf,
    type_indexes: TypeIndexStore,
}

impl BuildCache {
    /// Creates a cache rooted at `build_root`. Nothing is read until asked.
    pub fn new(build_root: &Path) -> Self {
        Self {
            build_root: build_root.to_path_buf(),
            type_indexes: TypeIndexStore::new(build_root),
        }
    }

    /// The build root.
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Path of the dependency record for one directory of a layer.
    ///
    /// `package_prefix` places the record under the layer's package path so
    /// layers with different prefixes never share a directory.
    pub fn record_path(&self, layer: &str, package_prefix: &str, rel_dir: &Path, phase: &str) -> PathBuf {
        self.build_root
            .join("deps")
            .join(dotted_to_path(package_prefix))
            .join(rel_dir)
            .join(format!("{}-{phase}.deps", normalize_layer_name(layer)))
    }

    /// Loads a dependency record, treating it as missing when it predates
    /// `descriptor_mtime`.
    pub fn load_record(&self, path: &Path, descriptor_mtime: Option<SystemTime>) -> Option<DependencyRecord> {
        let record = DependencyRecord::load(path)?;
        match descriptor_mtime {
            Some(t) if record.is_older_than(t) => {
                tracing::debug!(path = %path.display(), "dependency record older than layer descriptor");
                None
            }
            _ => Some(record),
        }
    }

    /// Output directory of a build layer.
    pub fn build_layer_dir(&self, layer: &str) -> PathBuf {
        self.build_root.join("layers").join(normalize_layer_name(layer))
    }

    /// Generated-source root of a build layer.
    pub fn gen_dir(&self, layer: &str) -> PathBuf {
        self.build_layer_dir(layer).join("gen")
    }

    /// Compiled-artifact root of a build layer.
    pub fn classes_dir(&self, layer: &str) -> PathBuf {
        self.build_layer_dir(layer).join("classes")
    }

    /// Loads the build info of a build layer.
    pub fn load_build_info(&self, layer: &str) -> Option<BuildInfo> {
        BuildInfo::load(&self.build_layer_dir(layer))
    }

    /// Saves the build info of a build layer.
    pub fn save_build_info(&self, info: &BuildInfo) -> Result<(), CacheError> {
        info.save(&self.build_layer_dir(&info.layer))
    }

    /// The type-index store.
    pub fn type_indexes(&self) -> &TypeIndexStore {
        &self.type_indexes
    }

    /// Deletes everything under the build root.
    pub fn clean(&self) -> Result<(), CacheError> {
        if self.build_root.exists() {
            std::fs::remove_dir_all(&self.build_root).map_err(|e| CacheError::io(&self.build_root, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn layout_paths() {
        let cache = BuildCache::new(Path::new("/b"));
        assert_eq!(
            cache.record_path("app.main", "com.acme", Path::new("model"), "process"),
            PathBuf::from("/b/deps/com/acme/model/app_main-process.deps")
        );
        assert_eq!(cache.gen_dir("app.main"), PathBuf::from("/b/layers/app_main/gen"));
        assert_eq!(
            cache.classes_dir("app.main"),
            PathBuf::from("/b/layers/app_main/classes")
        );
    }

    #[test]
    fn record_older_than_descriptor_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path());
        let path = cache.record_path("l", "", Path::new(""), "process");
        let built = SystemTime::now() - Duration::from_secs(60);
        DependencyRecord::new("l", "process", built).save(&path).unwrap();

        assert!(cache.load_record(&path, None).is_some());
        assert!(cache.load_record(&path, Some(built - Duration::from_secs(1))).is_some());
        assert!(cache.load_record(&path, Some(SystemTime::now())).is_none());
    }

    #[test]
    fn build_info_roundtrip_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("build");
        let cache = BuildCache::new(&root);
        cache.save_build_info(&BuildInfo::new("app.main")).unwrap();
        assert!(cache.load_build_info("app.main").is_some());
        cache.clean().unwrap();
        assert!(!root.exists());
        cache.clean().unwrap();
    }
}
