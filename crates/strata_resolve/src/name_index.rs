//! Package and base-name index with override chains.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use strata_common::name::split_last;
use strata_common::{Ident, Interner, LayerId};
use strata_layer::LayerStack;

use crate::compiled::CompiledIndex;

/// What an index slot points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    /// A source file.
    Source(PathBuf),
    /// A compiled artifact.
    Compiled(PathBuf),
}

/// One entry of an override chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSlot {
    /// The artifact.
    pub artifact: ArtifactRef,
    /// Owning layer, if it belongs to this stack.
    pub layer: Option<LayerId>,
    /// The entry this one overrides.
    pub prev: Option<usize>,
}

/// Maps `(package, base name)` to the most specific artifact, keeping the
/// overridden ones reachable through `prev` links.
///
/// Compiled artifacts are inserted first, then source entries layer by layer
/// in ascending position, so a chain reads from the highest source layer
/// down to the oldest compiled form.
#[derive(Debug)]
pub struct NameIndex {
    interner: Arc<Interner>,
    slots: Vec<NameSlot>,
    heads: HashMap<(Ident, Ident), usize>,
}

impl NameIndex {
    /// Creates an empty index.
    pub fn new(interner: Arc<Interner>) -> Self {
        Self {
            interner,
            slots: Vec::new(),
            heads: HashMap::new(),
        }
    }

    /// Rebuilds the index from the compiled artifacts and the active layers.
    pub fn rebuild(&mut self, stack: &LayerStack, compiled: &CompiledIndex, compiled_names: &[String]) {
        self.slots.clear();
        self.heads.clear();
        for name in compiled_names {
            let Some(ident) = self.interner.get(name) else { continue };
            let Some(artifact) = compiled.lookup(ident).and_then(|id| compiled.get(id)) else {
                continue;
            };
            self.insert(
                name,
                ArtifactRef::Compiled(artifact.path.clone()),
                artifact.defining_layer,
            );
        }
        for layer in stack.layers() {
            for entry in layer.src_index.entries() {
                self.insert(
                    entry.type_name.as_str(),
                    ArtifactRef::Source(entry.abs_path.clone()),
                    Some(layer.id),
                );
            }
        }
    }

    /// Pushes an artifact on top of the chain for `qualified`.
    pub fn insert(&mut self, qualified: &str, artifact: ArtifactRef, layer: Option<LayerId>) {
        let key = self.key(qualified);
        let prev = self.heads.get(&key).copied();
        self.slots.push(NameSlot {
            artifact,
            layer,
            prev,
        });
        self.heads.insert(key, self.slots.len() - 1);
    }

    /// The most specific artifact for `qualified`.
    pub fn lookup(&self, qualified: &str) -> Option<&NameSlot> {
        let key = self.existing_key(qualified)?;
        self.heads.get(&key).map(|&i| &self.slots[i])
    }

    /// The whole override chain for `qualified`, most specific first.
    pub fn chain(&self, qualified: &str) -> Vec<&NameSlot> {
        let mut out = Vec::new();
        let mut next = self
            .existing_key(qualified)
            .and_then(|key| self.heads.get(&key).copied());
        while let Some(i) = next {
            let slot = &self.slots[i];
            out.push(slot);
            next = slot.prev;
        }
        out
    }

    /// Sorted base names defined in `package`.
    pub fn package_members(&self, package: &str) -> Vec<String> {
        let Some(pkg) = self.interner.get(package) else {
            return Vec::new();
        };
        let members: BTreeSet<&str> = self
            .heads
            .keys()
            .filter(|(p, _)| *p == pkg)
            .map(|(_, base)| self.interner.resolve(*base))
            .collect();
        members.into_iter().map(str::to_string).collect()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// Returns `true` if the index holds no names.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    fn key(&self, qualified: &str) -> (Ident, Ident) {
        let (pkg, base) = split_last(qualified);
        (self.interner.get_or_intern(pkg), self.interner.get_or_intern(base))
    }

    fn existing_key(&self, qualified: &str) -> Option<(Ident, Ident)> {
        let (pkg, base) = split_last(qualified);
        Some((self.interner.get(pkg)?, self.interner.get(base)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::CompiledArtifact;
    use std::fs;
    use strata_layer::Layer;
    use strata_source::SrcDirIndex;

    fn push_layer(stack: &mut LayerStack, root: &std::path::Path, name: &str, files: &[&str]) -> LayerId {
        let dir = root.join(name);
        for file in files {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "type").unwrap();
        }
        let id = stack.reserve();
        let mut layer = Layer::new(id, name, dir.clone());
        layer.src_index = SrcDirIndex::scan(id, &dir, "app", &["sc".to_string()]).unwrap();
        let pos = stack.len();
        stack.insert_at(layer, pos);
        id
    }

    #[test]
    fn chain_runs_from_highest_source_to_compiled() {
        let tmp = tempfile::tempdir().unwrap();
        let interner = Arc::new(Interner::new());
        let mut stack = LayerStack::new();
        let base = push_layer(&mut stack, tmp.path(), "base", &["model/Customer.sc"]);
        let top = push_layer(&mut stack, tmp.path(), "top", &["model/Customer.sc"]);

        let mut compiled = CompiledIndex::new();
        compiled.insert(
            &interner,
            CompiledArtifact {
                type_name: "app.model.Customer".into(),
                build_layer: base,
                defining_layer: Some(base),
                path: PathBuf::from("/classes/app/model/Customer"),
            },
        );

        let mut index = NameIndex::new(Arc::clone(&interner));
        index.rebuild(&stack, &compiled, &["app.model.Customer".to_string()]);

        let chain = index.chain("app.model.Customer");
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].layer, Some(top));
        assert_eq!(chain[1].layer, Some(base));
        assert!(matches!(chain[2].artifact, ArtifactRef::Compiled(_)));
        assert_eq!(index.lookup("app.model.Customer"), Some(chain[0]));
    }

    #[test]
    fn package_members_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let interner = Arc::new(Interner::new());
        let mut stack = LayerStack::new();
        push_layer(&mut stack, tmp.path(), "base", &["model/Order.sc", "model/Customer.sc", "Main.sc"]);
        let mut index = NameIndex::new(interner);
        index.rebuild(&stack, &CompiledIndex::new(), &[]);
        assert_eq!(index.package_members("app.model"), vec!["Customer", "Order"]);
        assert_eq!(index.package_members("app"), vec!["Main"]);
        assert!(index.package_members("other").is_empty());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn unknown_name_has_empty_chain() {
        let index = NameIndex::new(Arc::new(Interner::new()));
        assert!(index.lookup("app.Nope").is_none());
        assert!(index.chain("app.Nope").is_empty());
    }
}
