//! A single resolved layer.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::SystemTime;

use strata_common::name::split_last;
use strata_common::LayerId;
use strata_source::SrcDirIndex;

/// One slice of application source, placed in a [`LayerStack`](crate::LayerStack).
///
/// `position` is the layer's index in the active stack and changes when
/// compiled layers are inserted ahead of it; `id` never changes.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Stable arena handle.
    pub id: LayerId,
    /// Unique dotted name, e.g. `app.main`.
    pub name: String,
    /// Directory name (last dotted segment).
    pub dir_name: String,
    /// Package prefix prepended to every type defined by this layer.
    pub package_prefix: String,
    /// Resolved dotted names of the base layers, in declared order.
    pub extends: Vec<String>,
    /// Handles of the base layers, parallel to `extends`.
    pub base_ids: Vec<LayerId>,
    /// Interpreted rather than compiled.
    pub dynamic: bool,
    /// Never dynamic.
    pub compiled_only: bool,
    /// Built into its own output directory.
    pub build_separate: bool,
    /// Known but not part of the active stack.
    pub disabled: bool,
    /// Modifier applied to types that declare none.
    pub default_modifier: Option<String>,
    /// Index in the active stack; meaningless while inactive.
    pub position: usize,
    /// Lower values sort earlier among unrelated layers.
    pub sort_priority: i32,
    /// Layers whose features this layer replaces.
    pub replaces: Vec<String>,
    /// Later layers that declared they replace this one.
    pub replaced_by: BTreeSet<String>,
    /// Runtimes this layer is restricted to; empty means all.
    pub runtimes: Vec<String>,
    /// Runtimes this layer is excluded from.
    pub exclude_runtimes: Vec<String>,
    /// Placeholder standing in for a descriptor that failed to parse.
    pub stub: bool,
    /// The descriptor file, when one was found.
    pub descriptor_path: Option<PathBuf>,
    /// Modification time of the descriptor when it was read.
    pub descriptor_mtime: Option<SystemTime>,
    /// The directory containing the descriptor and the layer's sources.
    pub layer_root: PathBuf,
    /// Every source file of the layer.
    pub src_index: SrcDirIndex,
}

impl Layer {
    /// Creates a layer with default flags and no sources.
    pub fn new(id: LayerId, name: &str, layer_root: PathBuf) -> Self {
        Self {
            id,
            name: name.to_string(),
            dir_name: split_last(name).1.to_string(),
            package_prefix: String::new(),
            extends: Vec::new(),
            base_ids: Vec::new(),
            dynamic: false,
            compiled_only: false,
            build_separate: false,
            disabled: false,
            default_modifier: None,
            position: 0,
            sort_priority: 0,
            replaces: Vec::new(),
            replaced_by: BTreeSet::new(),
            runtimes: Vec::new(),
            exclude_runtimes: Vec::new(),
            stub: false,
            descriptor_path: None,
            descriptor_mtime: None,
            layer_root,
            src_index: SrcDirIndex::default(),
        }
    }

    /// Returns `true` if this layer participates in the given runtime.
    ///
    /// An exclusion always wins; otherwise an empty `runtimes` list means the
    /// layer applies everywhere.
    pub fn include_for_runtime(&self, runtime: &str) -> bool {
        if self.exclude_runtimes.iter().any(|r| r == runtime) {
            return false;
        }
        self.runtimes.is_empty() || self.runtimes.iter().any(|r| r == runtime)
    }

    /// The name under which the layer's own descriptor is visible as a type:
    /// the descriptor path relative to its search root, dotted
    /// (`app.main` → `app.main.main`).
    pub fn model_type_name(&self) -> String {
        format!("{}.{}", self.name, self.dir_name)
    }

    /// Returns `true` if `name` is one of this layer's direct bases.
    pub fn directly_extends(&self, name: &str) -> bool {
        self.extends.iter().any(|e| e == name)
    }
}
