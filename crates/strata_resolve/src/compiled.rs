//! Compiled artifacts available as a resolution fallback.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use strata_cache::BuildInfo;
use strata_common::name::dotted_to_path;
use strata_common::{Ident, Interner, LayerId};

/// Handle to a [`CompiledArtifact`] in a [`CompiledIndex`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CompiledId(u32);

impl CompiledId {
    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// One compiled type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Qualified type name.
    pub type_name: String,
    /// Build layer whose output directory holds the artifact.
    pub build_layer: LayerId,
    /// Layer whose source the artifact was compiled from. `None` when that
    /// layer is not part of this stack, e.g. a prebuilt package.
    pub defining_layer: Option<LayerId>,
    /// Location of the compiled output.
    pub path: PathBuf,
}

/// Compiled artifacts keyed by interned type name.
///
/// A later insert for the same name replaces the earlier mapping; the older
/// artifact stays addressable by its id until the owning build layer is
/// cleared.
#[derive(Debug, Default)]
pub struct CompiledIndex {
    artifacts: Vec<Option<CompiledArtifact>>,
    by_name: HashMap<Ident, CompiledId>,
    loaded: HashSet<Ident>,
}

impl CompiledIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an artifact and makes it the current mapping for its name.
    pub fn insert(&mut self, interner: &Interner, artifact: CompiledArtifact) -> CompiledId {
        let id = CompiledId(self.artifacts.len() as u32);
        let ident = interner.get_or_intern(&artifact.type_name);
        self.artifacts.push(Some(artifact));
        self.by_name.insert(ident, id);
        id
    }

    /// Records every artifact a build layer's build info lists. Artifacts
    /// sit at `<classes_dir>/<type path>.<extension>`; defining layers are
    /// looked up by name through `layer_for`.
    pub fn insert_build_info(
        &mut self,
        interner: &Interner,
        build_layer: LayerId,
        classes_dir: &Path,
        extension: &str,
        info: &BuildInfo,
        layer_for: impl Fn(&str) -> Option<LayerId>,
    ) -> usize {
        for (type_name, defining) in &info.compiled_artifacts {
            let path = classes_dir
                .join(dotted_to_path(type_name))
                .with_extension(extension);
            self.insert(
                interner,
                CompiledArtifact {
                    type_name: type_name.clone(),
                    build_layer,
                    defining_layer: layer_for(defining),
                    path,
                },
            );
        }
        info.compiled_artifacts.len()
    }

    /// Current artifact for `name`.
    pub fn lookup(&self, name: Ident) -> Option<CompiledId> {
        self.by_name.get(&name).copied()
    }

    /// Returns the artifact for `id`, or `None` once its layer was cleared.
    pub fn get(&self, id: CompiledId) -> Option<&CompiledArtifact> {
        self.artifacts.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Marks `name` as handed out to a running process.
    pub fn mark_loaded(&mut self, name: Ident) {
        self.loaded.insert(name);
    }

    /// Returns `true` if the compiled form of `name` was handed out. A
    /// rebuild of such a type leaves the running process with a stale model.
    pub fn is_loaded(&self, name: Ident) -> bool {
        self.loaded.contains(&name)
    }

    /// Drops every artifact built into, or compiled from, `layer`.
    pub fn clear_layer(&mut self, layer: LayerId) -> usize {
        let mut removed = 0;
        for slot in &mut self.artifacts {
            let owned = slot
                .as_ref()
                .is_some_and(|a| a.build_layer == layer || a.defining_layer == Some(layer));
            if owned {
                *slot = None;
                removed += 1;
            }
        }
        let artifacts = &self.artifacts;
        self.by_name
            .retain(|_, id| artifacts.get(id.0 as usize).is_some_and(Option::is_some));
        removed
    }

    /// Number of names with a current artifact.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no name has an artifact.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
