//! Locates, parses, and places layers into a [`LayerStack`].

use std::path::{Path, PathBuf};

use strata_common::name::split_last;
use strata_common::LayerId;
use strata_diagnostics::{Diagnostic, DiagnosticSink};
use strata_source::{modified_time, Location, SrcDirIndex};

use crate::codes::{L001, L002, L003, L004};
use crate::descriptor::{self, parse_descriptor, LayerDescriptor};
use crate::error::LayerError;
use crate::layer::Layer;
use crate::stack::LayerStack;

/// Resolves layer names against a search path and places them in a stack.
///
/// Each call to [`resolve_layer`](Self::resolve_layer) first resolves the
/// layer's `extends` list depth-first, so by the time a layer is placed all of
/// its bases are already in the stack. Placement:
///
/// 1. A name reached again while still pending is an extends cycle.
/// 2. The package prefix is inherited from the first base that has one.
/// 3. `dynamic` is the declared flag, or any base being dynamic, or the
///    request flag; `compiled_only` forces it off.
/// 4. The first dynamic layer is appended and starts the dynamic suffix;
///    later dynamic layers are appended too.
/// 5. A compiled layer is inserted at the start of an existing dynamic suffix.
/// 6. Otherwise the stack is scanned backward from the end: the scan stops at
///    the first layer this one extends, and the insertion point moves before
///    every unrelated layer with a strictly higher sort priority or that is
///    extended by a layer this one replaces.
/// 7. The layer is registered under its short name, dotted name, and model
///    type name.
pub struct LayerResolver<'a> {
    search_path: &'a [PathBuf],
    source_extensions: &'a [String],
    sink: &'a DiagnosticSink,
    pending: Vec<String>,
}

impl<'a> LayerResolver<'a> {
    /// Creates a resolver over `search_path`, indexing files with the given
    /// extensions and reporting recoverable problems to `sink`.
    pub fn new(
        search_path: &'a [PathBuf],
        source_extensions: &'a [String],
        sink: &'a DiagnosticSink,
    ) -> Self {
        Self {
            search_path,
            source_extensions,
            sink,
            pending: Vec::new(),
        }
    }

    /// Returns the first descriptor for `name` found on the search path.
    pub fn locate_descriptor(&self, name: &str) -> Option<PathBuf> {
        self.search_path
            .iter()
            .map(|root| descriptor::descriptor_path(root, name))
            .find(|p| p.is_file())
    }

    /// Resolves every requested name, returning the active ids of the
    /// requested layers in request order. Disabled layers are left out.
    pub fn resolve(
        &mut self,
        stack: &mut LayerStack,
        names: &[String],
        dynamic_by_default: bool,
    ) -> Result<Vec<LayerId>, LayerError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match self.resolve_layer(stack, name, dynamic_by_default)? {
                Some(id) if stack.is_active(id) => ids.push(id),
                Some(_) => {}
                None => {
                    return Err(LayerError::UnresolvedLayer {
                        name: name.clone(),
                        referenced_by: None,
                    })
                }
            }
        }
        Ok(ids)
    }

    /// Resolves and places one layer.
    ///
    /// Returns `Ok(None)` if no descriptor exists for `name`; the caller may
    /// retry under another prefix. A layer already in the stack is returned
    /// as-is.
    pub fn resolve_layer(
        &mut self,
        stack: &mut LayerStack,
        name: &str,
        requested_dynamic: bool,
    ) -> Result<Option<LayerId>, LayerError> {
        if let Some(id) = stack.find(name) {
            if stack.get(id).is_some_and(|l| l.name == name) {
                return Ok(Some(id));
            }
        }
        if let Some(start) = self.pending.iter().position(|p| p == name) {
            let mut cycle: Vec<String> = self.pending[start..].to_vec();
            cycle.push(name.to_string());
            return Err(LayerError::ExtendsCycle { cycle });
        }

        let Some(path) = self.locate_descriptor(name) else {
            self.sink.emit(
                Diagnostic::warning(L001, format!("layer '{name}' not found"))
                    .with_note(format!("searched {}", display_search_path(self.search_path))),
            );
            return Ok(None);
        };
        let layer_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let desc = match parse_descriptor(&path, name) {
            Ok(desc) => desc,
            Err(err) => {
                self.sink.emit(
                    Diagnostic::error(L002, err.to_string())
                        .at(Location::file(&path))
                        .with_note("a placeholder layer was created in its place"),
                );
                let id = stack.reserve();
                let mut layer = Layer::new(id, name, layer_root);
                layer.stub = true;
                layer.dynamic = requested_dynamic;
                layer.descriptor_mtime = modified_time(&path);
                layer.descriptor_path = Some(path);
                self.place(stack, layer)?;
                return Ok(Some(id));
            }
        };

        self.pending.push(name.to_string());
        let bases = self.resolve_bases(stack, name, &desc);
        self.pending.pop();
        let bases = bases?;

        let id = stack.reserve();
        let mut layer = Layer::new(id, name, layer_root);
        layer.descriptor_mtime = modified_time(&path);
        layer.descriptor_path = Some(path);
        self.apply_descriptor(stack, &mut layer, desc, bases, requested_dynamic)?;

        if layer.disabled {
            self.sink.emit(Diagnostic::note(
                L003,
                format!("layer '{name}' is disabled and will not be built"),
            ));
            let dotted = layer.name.clone();
            stack.add_inactive(layer);
            stack.register_key(&dotted, id);
            return Ok(Some(id));
        }

        self.place(stack, layer)?;
        Ok(Some(id))
    }

    fn resolve_bases(
        &mut self,
        stack: &mut LayerStack,
        name: &str,
        desc: &LayerDescriptor,
    ) -> Result<Vec<LayerId>, LayerError> {
        let group = split_last(name).0;
        let mut bases = Vec::with_capacity(desc.extends.len());
        for ext in &desc.extends {
            let mut found = self.resolve_layer(stack, ext, false)?;
            if found.is_none() && !group.is_empty() && !ext.starts_with(&format!("{group}.")) {
                found = self.resolve_layer(stack, &format!("{group}.{ext}"), false)?;
            }
            let Some(base) = found else {
                return Err(LayerError::UnresolvedLayer {
                    name: ext.clone(),
                    referenced_by: Some(name.to_string()),
                });
            };
            if !stack.is_active(base) {
                self.sink.emit(Diagnostic::warning(
                    L004,
                    format!("layer '{name}' extends disabled layer '{ext}'; ignoring it"),
                ));
                continue;
            }
            bases.push(base);
        }
        Ok(bases)
    }

    fn apply_descriptor(
        &self,
        stack: &LayerStack,
        layer: &mut Layer,
        desc: LayerDescriptor,
        bases: Vec<LayerId>,
        requested_dynamic: bool,
    ) -> Result<(), LayerError> {
        let base_layers: Vec<&Layer> = bases.iter().filter_map(|id| stack.get(*id)).collect();

        layer.package_prefix = if desc.package_prefix.is_empty() {
            base_layers
                .iter()
                .map(|b| b.package_prefix.as_str())
                .find(|p| !p.is_empty())
                .unwrap_or("")
                .to_string()
        } else {
            desc.package_prefix
        };

        let base_dynamic = base_layers.iter().find(|b| b.dynamic);
        layer.compiled_only = desc.compiled_only;
        layer.dynamic = !desc.compiled_only
            && (desc.dynamic || base_dynamic.is_some() || requested_dynamic);
        if desc.compiled_only {
            if let Some(base) = base_dynamic {
                return Err(LayerError::CompiledExtendsDynamic {
                    layer: layer.name.clone(),
                    base: base.name.clone(),
                });
            }
        }

        layer.extends = base_layers.iter().map(|b| b.name.clone()).collect();
        layer.base_ids = bases;
        layer.build_separate = desc.build_separate;
        layer.disabled = desc.disabled;
        layer.default_modifier = desc.default_modifier;
        layer.sort_priority = desc.sort_priority;
        layer.replaces = desc.replaces;
        layer.runtimes = desc.runtimes;
        layer.exclude_runtimes = desc.exclude_runtimes;
        layer.src_index = SrcDirIndex::scan(
            layer.id,
            &layer.layer_root,
            &layer.package_prefix,
            self.source_extensions,
        )
        .map_err(|e| LayerError::Io {
            path: layer.layer_root.clone(),
            source: e,
        })?;
        Ok(())
    }

    /// Inserts a fully described layer at its sorted position and registers
    /// its lookup keys.
    fn place(&self, stack: &mut LayerStack, layer: Layer) -> Result<(), LayerError> {
        let model_name = layer.model_type_name();
        for other in stack.layers() {
            if other.src_index.find_type(&model_name).is_some() {
                return Err(LayerError::NameCollision {
                    layer: layer.name.clone(),
                    type_name: model_name,
                    other: other.name.clone(),
                });
            }
        }

        let pos = if layer.dynamic {
            stack.len()
        } else if let Some(first_dynamic) = stack.first_dynamic() {
            first_dynamic
        } else {
            sorted_position(stack, &layer)
        };

        let id = layer.id;
        let name = layer.name.clone();
        let short = layer.dir_name.clone();
        let replaces = layer.replaces.clone();
        tracing::debug!(layer = %name, position = pos, dynamic = layer.dynamic, "placing layer");
        stack.insert_at(layer, pos);

        stack.register_key(&name, id);
        stack.register_key(&model_name, id);
        if short != name {
            // short names go to the first layer that claims them
            stack.register_key(&short, id);
        }
        for replaced in replaces {
            if let Some(rid) = stack.find(&replaced) {
                if let Some(r) = stack.get_mut(rid) {
                    r.replaced_by.insert(name.clone());
                }
            }
        }
        Ok(())
    }
}

/// Step 6 of placement, applied literally: when the priority rule and the
/// replaces rule disagree the later-scanned (lower) layer wins, because the
/// insertion point only ever moves down.
fn sorted_position(stack: &LayerStack, layer: &Layer) -> usize {
    let replaced: Vec<LayerId> = layer
        .replaces
        .iter()
        .filter_map(|name| stack.find(name))
        .collect();

    let mut insert_at = stack.len();
    for pos in (0..stack.len()).rev() {
        let Some(other) = stack.at(pos) else { continue };
        if layer.base_ids.iter().any(|b| *b == other.id || stack.extends(*b, other.id)) {
            break;
        }
        let extended_by_replaced = replaced.iter().any(|r| stack.extends(*r, other.id));
        if other.sort_priority > layer.sort_priority || extended_by_replaced {
            insert_at = pos;
        }
    }
    insert_at
}

fn display_search_path(search_path: &[PathBuf]) -> String {
    search_path
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Tree {
        dir: tempfile::TempDir,
    }

    impl Tree {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn root(&self) -> PathBuf {
            self.dir.path().to_path_buf()
        }

        fn layer(&self, name: &str, body: &str) -> PathBuf {
            let path = descriptor::descriptor_path(self.dir.path(), name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("[layer]\nname = \"{name}\"\n{body}")).unwrap();
            path.parent().unwrap().to_path_buf()
        }
    }

    fn resolve(tree: &Tree, names: &[&str], dynamic: bool) -> (LayerStack, Result<Vec<LayerId>, LayerError>, DiagnosticSink) {
        let search = vec![tree.root()];
        let exts = vec!["sc".to_string()];
        let sink = DiagnosticSink::new();
        let mut stack = LayerStack::new();
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let result = LayerResolver::new(&search, &exts, &sink).resolve(&mut stack, &names, dynamic);
        (stack, result, sink)
    }

    fn order(stack: &LayerStack) -> Vec<String> {
        stack.layers().map(|l| l.name.clone()).collect()
    }

    #[test]
    fn base_precedes_extender() {
        let tree = Tree::new();
        tree.layer("a", "");
        tree.layer("b", "extends = [\"a\"]");
        let (stack, result, _) = resolve(&tree, &["b"], false);
        result.unwrap();
        assert_eq!(order(&stack), vec!["a", "b"]);
        let a = stack.find("a").unwrap();
        let b = stack.find("b").unwrap();
        assert_eq!(stack[b].position, stack[a].position + 1);
    }

    #[test]
    fn cycle_names_both_layers() {
        let tree = Tree::new();
        tree.layer("a", "extends = [\"b\"]");
        tree.layer("b", "extends = [\"a\"]");
        let (_, result, _) = resolve(&tree, &["a"], false);
        match result.unwrap_err() {
            LayerError::ExtendsCycle { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn prefix_inherited_from_first_base() {
        let tree = Tree::new();
        tree.layer("sys.core", "package_prefix = \"sys\"");
        tree.layer("app.main", "extends = [\"sys.core\"]");
        let (stack, result, _) = resolve(&tree, &["app.main"], false);
        result.unwrap();
        assert_eq!(stack[stack.find("app.main").unwrap()].package_prefix, "sys");
    }

    #[test]
    fn extends_retried_with_group_prefix() {
        let tree = Tree::new();
        tree.layer("app.util", "");
        tree.layer("app.main", "extends = [\"util\"]");
        let (stack, result, sink) = resolve(&tree, &["app.main"], false);
        result.unwrap();
        assert_eq!(order(&stack), vec!["app.util", "app.main"]);
        assert_eq!(stack[stack.find("app.main").unwrap()].extends, vec!["app.util"]);
        // the first attempt under the bare name warns
        assert!(sink.diagnostics().iter().any(|d| d.code == L001));
    }

    #[test]
    fn unresolved_extends_is_fatal() {
        let tree = Tree::new();
        tree.layer("app.main", "extends = [\"missing\"]");
        let (_, result, _) = resolve(&tree, &["app.main"], false);
        assert!(matches!(
            result.unwrap_err(),
            LayerError::UnresolvedLayer { name, referenced_by: Some(by) } if name == "missing" && by == "app.main"
        ));
    }

    #[test]
    fn parse_failure_creates_stub() {
        let tree = Tree::new();
        let dir = tree.layer("broken", "");
        fs::write(dir.join("broken.layer"), "not toml [[[").unwrap();
        let (stack, result, sink) = resolve(&tree, &["broken"], false);
        result.unwrap();
        let l = &stack[stack.find("broken").unwrap()];
        assert!(l.stub);
        assert!(sink.has_errors());
    }

    #[test]
    fn dynamic_inherited_and_forced_off_by_compiled_only() {
        let tree = Tree::new();
        tree.layer("a", "dynamic = true");
        tree.layer("b", "extends = [\"a\"]");
        let (stack, result, _) = resolve(&tree, &["b"], false);
        result.unwrap();
        assert!(stack[stack.find("b").unwrap()].dynamic);

        let tree = Tree::new();
        tree.layer("c", "compiled_only = true");
        let (stack, result, _) = resolve(&tree, &["c"], true);
        result.unwrap();
        assert!(!stack[stack.find("c").unwrap()].dynamic);
    }

    #[test]
    fn compiled_only_over_dynamic_base_is_rejected() {
        let tree = Tree::new();
        tree.layer("a", "dynamic = true");
        tree.layer("b", "extends = [\"a\"]\ncompiled_only = true");
        let (_, result, _) = resolve(&tree, &["b"], false);
        assert!(matches!(result.unwrap_err(), LayerError::CompiledExtendsDynamic { .. }));
    }

    #[test]
    fn compiled_inserted_before_dynamic_suffix() {
        let tree = Tree::new();
        tree.layer("a", "");
        tree.layer("d", "dynamic = true");
        tree.layer("c", "");
        tree.layer("e", "");
        let (stack, result, _) = resolve(&tree, &["a", "d", "c", "e"], false);
        result.unwrap();
        assert_eq!(order(&stack), vec!["a", "c", "e", "d"]);
        assert_eq!(stack.first_dynamic(), Some(3));
    }

    #[test]
    fn higher_priority_layers_sort_later() {
        let tree = Tree::new();
        tree.layer("a", "sort_priority = 10");
        tree.layer("b", "sort_priority = 0");
        let (stack, result, _) = resolve(&tree, &["a", "b"], false);
        result.unwrap();
        assert_eq!(order(&stack), vec!["b", "a"]);
    }

    #[test]
    fn equal_priority_keeps_request_order() {
        let tree = Tree::new();
        tree.layer("a", "");
        tree.layer("b", "");
        let (stack, result, _) = resolve(&tree, &["a", "b"], false);
        result.unwrap();
        assert_eq!(order(&stack), vec!["a", "b"]);
    }

    #[test]
    fn scan_stops_at_extended_layer() {
        let tree = Tree::new();
        tree.layer("a", "sort_priority = 10");
        tree.layer("b", "extends = [\"a\"]");
        let (stack, result, _) = resolve(&tree, &["b"], false);
        result.unwrap();
        // b has the lower priority but may never move before its base
        assert_eq!(order(&stack), vec!["a", "b"]);
    }

    #[test]
    fn replaces_moves_before_layers_extended_by_replaced() {
        let tree = Tree::new();
        tree.layer("base", "");
        tree.layer("feature", "extends = [\"base\"]");
        tree.layer("other", "");
        tree.layer("alt", "replaces = [\"feature\"]");
        let (stack, result, _) = resolve(&tree, &["feature", "other", "alt"], false);
        result.unwrap();
        // `base` is extended by the replaced `feature`, so `alt` moves before it
        assert_eq!(order(&stack), vec!["alt", "base", "feature", "other"]);
        let feature = stack.find("feature").unwrap();
        assert!(stack[feature].replaced_by.contains("alt"));
    }

    #[test]
    fn replaces_rule_wins_over_equal_priority_scan() {
        // `alt` has the highest priority, so the priority rule alone would
        // append it; the replaces rule still moves it below `base`
        let tree = Tree::new();
        tree.layer("base", "");
        tree.layer("other", "sort_priority = 0");
        tree.layer("feature", "extends = [\"base\"]\nsort_priority = 0");
        tree.layer("alt", "replaces = [\"feature\"]\nsort_priority = 5");
        let (stack, result, _) = resolve(&tree, &["other", "feature", "alt"], false);
        result.unwrap();
        assert_eq!(order(&stack), vec!["other", "alt", "base", "feature"]);
    }

    #[test]
    fn disabled_layer_is_inactive() {
        let tree = Tree::new();
        tree.layer("a", "disabled = true");
        tree.layer("b", "");
        let (stack, result, sink) = resolve(&tree, &["a", "b"], false);
        let ids = result.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(order(&stack), vec!["b"]);
        assert_eq!(stack.inactive_ids().len(), 1);
        assert!(sink.diagnostics().iter().any(|d| d.code == L003));
    }

    #[test]
    fn registered_under_all_keys() {
        let tree = Tree::new();
        tree.layer("app.main", "");
        let (stack, result, _) = resolve(&tree, &["app.main"], false);
        let id = result.unwrap()[0];
        assert_eq!(stack.find("app.main"), Some(id));
        assert_eq!(stack.find("main"), Some(id));
        assert_eq!(stack.find("app.main.main"), Some(id));
    }

    #[test]
    fn model_name_collision_is_fatal() {
        let tree = Tree::new();
        let root = tree.layer("lib", "");
        fs::create_dir_all(root.join("app/main")).unwrap();
        fs::write(root.join("app/main/main.sc"), "type main").unwrap();
        tree.layer("app.main", "extends = [\"lib\"]");
        let (_, result, _) = resolve(&tree, &["app.main"], false);
        assert!(matches!(result.unwrap_err(), LayerError::NameCollision { .. }));
    }

    #[test]
    fn sources_are_indexed_with_prefix() {
        let tree = Tree::new();
        let root = tree.layer("app.main", "package_prefix = \"app\"");
        fs::write(root.join("Customer.sc"), "type Customer").unwrap();
        let (stack, result, _) = resolve(&tree, &["app.main"], false);
        let id = result.unwrap()[0];
        assert!(stack[id].src_index.find_type("app.Customer").is_some());
        assert!(stack[id].descriptor_mtime.is_some());
    }
}
