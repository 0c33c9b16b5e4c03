//! One layer stack with its resolution cache and scheduler.

use std::collections::HashSet;
use std::sync::Arc;

use strata_build::{BuildContext, BuildStats, BuildStatus, Phase, ProcessorLoader, Scheduler};
use strata_cache::{TypeIndex, TypeIndexEntry};
use strata_common::{InternalError, LayerId, StrataResult};
use strata_layer::{LayerResolver, LayerStack};
use strata_resolve::{NameIndex, Resolved, TypeCache};
use strata_source::SrcDirIndex;
use tracing::{debug, info, warn};

use crate::context::SharedContext;
use crate::error::EngineError;

/// Builds and resolves types for one runtime.
///
/// An engine is driven through passes: [`begin_pass`](Self::begin_pass)
/// forgets the previous pass and picks up source changes,
/// [`build_layer`](Self::build_layer) builds layers in ascending position,
/// and [`finish_pass`](Self::finish_pass) settles the caches.
/// [`build_all`](Self::build_all) does all three.
pub struct Engine {
    runtime: String,
    ctx: Arc<SharedContext>,
    stack: LayerStack,
    types: TypeCache,
    names: NameIndex,
    scheduler: Scheduler,
    requested: Vec<LayerId>,
    errored: bool,
}

impl Engine {
    /// Creates an engine with the default processors and toolchain.
    /// Runtimes after the first build into their own directory; see
    /// [`BuildOptions::build_dir_for`](strata_config::BuildOptions::build_dir_for).
    pub fn new(runtime: &str, ctx: Arc<SharedContext>) -> Self {
        let mut options = ctx.options.clone();
        options.build_dir = ctx.options.build_dir_for(runtime);
        let scheduler = Scheduler::with_defaults(&options);
        Self::with_scheduler(runtime, ctx, scheduler)
    }

    /// Creates an engine around a preconfigured scheduler.
    pub fn with_scheduler(runtime: &str, ctx: Arc<SharedContext>, scheduler: Scheduler) -> Self {
        Self {
            runtime: runtime.to_string(),
            types: TypeCache::new(Arc::clone(&ctx.interner)),
            names: NameIndex::new(Arc::clone(&ctx.interner)),
            ctx,
            stack: LayerStack::new(),
            scheduler,
            requested: Vec::new(),
            errored: false,
        }
    }

    /// Runtime this engine builds for.
    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// The layer stack.
    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// The resolution cache.
    pub fn types(&self) -> &TypeCache {
        &self.types
    }

    /// The package/name index as of the last pass.
    pub fn names(&self) -> &NameIndex {
        &self.names
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access to the scheduler, for registering processors.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Work done since the current pass began.
    pub fn stats(&self) -> &BuildStats {
        self.scheduler.stats()
    }

    /// Ids of the layers that were asked for by name.
    pub fn requested(&self) -> &[LayerId] {
        &self.requested
    }

    /// Returns `true` if any build in this engine failed.
    pub fn has_errors(&self) -> bool {
        self.errored
    }

    /// Resolves the requested layers into an empty stack.
    pub fn init(&mut self, names: &[String]) -> Result<Vec<LayerId>, EngineError> {
        self.add_layers(names)
    }

    /// Resolves more layers into the stack, keeping only those that apply
    /// to this engine's runtime. Returns the ids of the layers added.
    pub fn add_layers(&mut self, names: &[String]) -> Result<Vec<LayerId>, EngineError> {
        let ctx = Arc::clone(&self.ctx);
        let options = &ctx.options;
        let before: HashSet<LayerId> = self.stack.layers().map(|l| l.id).collect();
        let mut resolver = LayerResolver::new(&options.layer_search_path, &options.source_extensions, &ctx.sink);
        let ids = resolver.resolve(&mut self.stack, names, options.dynamic_by_default)?;

        let excluded: Vec<LayerId> = self
            .stack
            .layers()
            .filter(|l| !before.contains(&l.id) && !l.include_for_runtime(&self.runtime))
            .map(|l| l.id)
            .collect();
        for id in excluded {
            if let Some(layer) = self.stack.remove(id) {
                debug!(layer = %layer.name, runtime = %self.runtime, "layer excluded from runtime");
            }
        }

        let mut added: Vec<LayerId> = self
            .stack
            .active_ids()
            .iter()
            .copied()
            .filter(|id| !before.contains(id))
            .collect();
        if !before.is_empty() {
            added.sort_by_key(|id| self.stack.get(*id).map(|l| l.position));
            for id in &added {
                self.types.layer_inserted(&self.stack, *id);
            }
            self.scheduler.reset_states();
        }
        self.requested
            .extend(ids.into_iter().filter(|id| self.stack.is_active(*id)));
        self.rebuild_names();
        info!(runtime = %self.runtime, layers = self.stack.len(), added = added.len(), "layers resolved");
        Ok(added)
    }

    /// Removes a layer and everything cached about it. Returns `false` if
    /// no such layer is in the stack.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let Some(id) = self.stack.find(name) else { return false };
        let Some(layer) = self.stack.remove(id) else { return false };
        self.types.layer_removed(&layer);
        self.requested.retain(|r| *r != id);
        self.scheduler.reset_states();
        self.rebuild_names();
        info!(layer = %layer.name, runtime = %self.runtime, "layer removed");
        true
    }

    /// Starts a pass: forgets previous pass states and rescans sources.
    pub fn begin_pass(&mut self) {
        self.scheduler.reset_states();
        self.scheduler.reset_stats();
        self.refresh_sources();
    }

    /// Rescans every layer's sources and drops cache entries for names
    /// that appeared or disappeared.
    fn refresh_sources(&mut self) {
        let extensions = self.ctx.options.source_extensions.clone();
        let ids: Vec<LayerId> = self.stack.active_ids().to_vec();
        let mut changed: Vec<String> = Vec::new();
        for id in ids {
            let Some(layer) = self.stack.get_mut(id) else { continue };
            let index = match SrcDirIndex::scan(id, &layer.layer_root, &layer.package_prefix, &extensions) {
                Ok(index) => index,
                Err(e) => {
                    warn!(layer = %layer.name, error = %e, "cannot rescan layer sources");
                    continue;
                }
            };
            let old: HashSet<&str> = layer.src_index.entries().map(|e| e.type_name.as_str()).collect();
            let new: HashSet<&str> = index.entries().map(|e| e.type_name.as_str()).collect();
            changed.extend(old.symmetric_difference(&new).map(|n| n.to_string()));
            layer.src_index = index;
        }
        for name in &changed {
            self.types.invalidate_name(name);
        }
    }

    /// Builds one layer in both phases.
    pub fn build_layer(&mut self, id: LayerId) -> StrataResult<BuildStatus> {
        let mut status = BuildStatus::NoFilesToCompile;
        for phase in Phase::ALL {
            status = status.merge(self.build_phase(id, phase)?);
        }
        Ok(status)
    }

    /// The stored status of `id` if every phase of it has started in the
    /// current pass.
    pub fn built_status(&self, id: LayerId) -> Option<BuildStatus> {
        Phase::ALL.iter().try_fold(BuildStatus::NoFilesToCompile, |status, phase| {
            let state = self.scheduler.state(id, *phase).filter(|s| s.is_started())?;
            Some(status.merge(state.status))
        })
    }

    /// Marks this engine failed because a peer it aggregates failed.
    pub(crate) fn record_peer_failure(&mut self) {
        self.errored = true;
    }

    /// Builds one layer in one phase.
    pub fn build_phase(&mut self, id: LayerId, phase: Phase) -> StrataResult<BuildStatus> {
        let mut ctx = BuildContext {
            stack: &self.stack,
            types: &mut self.types,
            sink: &self.ctx.sink,
        };
        let status = self.scheduler.build(&mut ctx, id, phase)?;
        if status.is_error() {
            self.errored = true;
        }
        Ok(status)
    }

    /// Returns `true` if a build of `id` that ended with `status` requires
    /// the whole pass to start over so later layers see the new compiled
    /// output.
    pub fn needs_restart(&self, id: LayerId, status: BuildStatus) -> bool {
        if !self.ctx.options.build_all_per_layer || status != BuildStatus::NewCompiledFiles {
            return false;
        }
        let build_layers = self.stack.build_layers();
        build_layers.contains(&id) && build_layers.last() != Some(&id)
    }

    /// Runs a complete pass over every active layer.
    pub fn build_all(&mut self) -> StrataResult<BuildStatus> {
        self.begin_pass();
        let status = self.build_active()?;
        self.finish_pass();
        Ok(status)
    }

    fn build_active(&mut self) -> StrataResult<BuildStatus> {
        let mut status = BuildStatus::NoFilesToCompile;
        for id in self.stack.active_ids().to_vec() {
            let layer_status = self.build_layer(id)?;
            status = status.merge(layer_status);
            if self.needs_restart(id, layer_status) {
                info!(runtime = %self.runtime, "new compiled files in a lower build layer; restarting");
                self.scheduler.restart_pass();
                return Ok(status.merge(self.build_active()?));
            }
        }
        Ok(status)
    }

    /// Ends a pass: evicts transformed declarations, reloads the compiled
    /// artifact index, rebuilds the name index, and saves type indexes.
    pub fn finish_pass(&mut self) {
        self.scheduler.finish_pass(&mut self.types);
        self.types.set_full_build_done(true);
        self.refresh_compiled();
        self.rebuild_names();
        self.save_type_indexes();
    }

    /// Starts the next pass from scratch, ignoring dependency records.
    pub fn rebuild_all(&mut self) {
        self.scheduler.rebuild_all();
        self.errored = false;
    }

    fn refresh_compiled(&mut self) {
        let interner = Arc::clone(&self.ctx.interner);
        let extension = self.scheduler.artifact_extension().to_string();
        for id in self.stack.build_layers() {
            let Some(layer) = self.stack.get(id) else { continue };
            let info = self.scheduler.build_info(&layer.name).clone();
            let classes = self.scheduler.cache().classes_dir(&layer.name);
            let stack = &self.stack;
            let compiled = self.types.compiled_mut();
            compiled.clear_layer(id);
            compiled.insert_build_info(&interner, id, &classes, &extension, &info, |name| stack.find(name));
        }
    }

    fn rebuild_names(&mut self) {
        let mut compiled_names: Vec<String> = Vec::new();
        for id in self.stack.build_layers() {
            let Some(layer) = self.stack.get(id) else { continue };
            if let Some(info) = self.scheduler.cache().load_build_info(&layer.name) {
                compiled_names.extend(info.compiled_artifacts.into_keys());
            }
        }
        self.names
            .rebuild(&self.stack, self.types.compiled(), &compiled_names);
    }

    fn save_type_indexes(&self) {
        let store = self.scheduler.cache().type_indexes();
        let mut live = Vec::new();
        for layer in self.stack.layers() {
            let mut entries: Vec<TypeIndexEntry> = layer
                .src_index
                .entries()
                .map(|e| TypeIndexEntry {
                    type_name: e.type_name.as_str().to_string(),
                    rel_path: e.rel_path.clone(),
                })
                .collect();
            entries.sort_by(|a, b| a.type_name.cmp(&b.type_name));
            let index = TypeIndex {
                layer: layer.name.clone(),
                entries,
            };
            if let Err(err) = store.save(&self.runtime, &index) {
                warn!(layer = %layer.name, %err, "cannot write type index");
            }
            live.push(layer.name.clone());
        }
        if let Err(err) = store.retain(&self.runtime, &live) {
            warn!(runtime = %self.runtime, %err, "cannot prune type indexes");
        }
    }

    /// The persisted type index of `layer`, if it is still current.
    pub fn type_index(&self, layer: &str) -> Option<TypeIndex> {
        let id = self.stack.find(layer)?;
        let root = &self.stack.get(id)?.layer_root;
        self.scheduler
            .cache()
            .type_indexes()
            .load(&self.runtime, layer, root)
    }

    /// Looks up a layer id by short or dotted name.
    pub fn layer_id(&self, name: &str) -> Option<LayerId> {
        self.stack.find(name)
    }

    /// Resolves `name` as seen from layer `from`, or from the top of the
    /// stack, parsing sources as needed.
    pub fn resolve(&mut self, name: &str, from: Option<LayerId>) -> Option<Resolved> {
        let mut loader = ProcessorLoader::new(self.scheduler.registry(), &self.stack, &self.ctx.sink);
        self.types.resolve(&self.stack, &mut loader, name, from)
    }

    /// Answers from cached state without parsing; see [`TypeCache::peek`].
    pub fn peek(&self, name: &str, from: Option<LayerId>) -> Option<Option<Resolved>> {
        self.types.peek(&self.stack, name, from)
    }

    /// Name of the layer that defines a resolved type.
    pub fn describe(&self, resolved: Resolved) -> StrataResult<String> {
        match resolved {
            Resolved::Source(id) => {
                let decl = self
                    .types
                    .decl(id)
                    .ok_or_else(|| InternalError::new(format!("resolved to disposed {id:?}")))?;
                let layer = self.stack.get(decl.layer).map(|l| l.name.as_str()).unwrap_or("?");
                Ok(format!("{} (source, layer {layer}): {}", decl.name, decl.source.display()))
            }
            Resolved::Compiled(id) => {
                let artifact = self
                    .types
                    .compiled()
                    .get(id)
                    .ok_or_else(|| InternalError::new(format!("unknown compiled id {}", id.as_raw())))?;
                Ok(format!("{} (compiled): {}", artifact.type_name, artifact.path.display()))
            }
        }
    }
}
