//! The per-layer incremental build scheduler.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use strata_cache::{
    BuildCache, BuildInfo, DependencyEntry, DependencyRecord, GeneratedOutput, SourceHasher,
};
use strata_common::name::dotted_to_path;
use strata_common::{ContentHash, InternalError, LayerId, QualifiedName, StrataResult};
use strata_config::BuildOptions;
use strata_diagnostics::{Diagnostic, DiagnosticSink};
use strata_layer::{Layer, LayerStack};
use strata_resolve::{Resolved, TypeCache};
use strata_source::{modified_time, Location, SourceEntry};
use tracing::{debug, info, warn};

use crate::codes::{B001, B002, B003, E002, W001};
use crate::directive::DirectiveProcessor;
use crate::loader::{report_parse_error, ProcessorLoader};
use crate::phase::{BuildStatus, PassState, Phase};
use crate::processor::{GenerateContext, ParsedFile, ProcessorRegistry};
use crate::state::{BuildState, BuildStats};
use crate::toolchain::{toolchain_for, Toolchain};

/// Engine state a build reads and updates.
pub struct BuildContext<'a> {
    /// The layer stack being built.
    pub stack: &'a LayerStack,
    /// The resolution cache, updated as files are parsed.
    pub types: &'a mut TypeCache,
    /// Where problems are reported.
    pub sink: &'a DiagnosticSink,
}

/// Where a compiled layer's outputs go.
#[derive(Debug, Clone)]
struct Target {
    build_layer: String,
    build_position: usize,
    gen_root: PathBuf,
    classes_root: PathBuf,
    /// Build layers below this one, ascending.
    prior: Vec<String>,
    search_path: Vec<PathBuf>,
}

/// Work decided for one source directory.
#[derive(Debug)]
struct DirPlan {
    rel_dir: PathBuf,
    record_path: PathBuf,
    entries: BTreeMap<String, DependencyEntry>,
    old_build_time: Option<SystemTime>,
    files: Vec<SourceEntry>,
    generate: BTreeSet<String>,
    compile_only: BTreeSet<String>,
}

enum Decision {
    UpToDate,
    CompileOnly,
    Generate(&'static str),
}

/// Builds layers one (layer, phase) pass at a time.
///
/// Each pass moves through [`PassState`]: [`prepare`](Self::prepare) loads
/// dependency records and queues work, [`build`](Self::build) executes it.
/// Calling `build` again for a pass that already started returns the stored
/// status, so prerequisite chains can request the same layer repeatedly.
pub struct Scheduler {
    cache: BuildCache,
    registry: ProcessorRegistry,
    toolchain: Box<dyn Toolchain>,
    skip_compile: bool,
    force_full: bool,
    files: Option<BTreeSet<PathBuf>>,
    generated_extension: String,
    package_repository: Option<PathBuf>,
    states: HashMap<(LayerId, Phase), BuildState>,
    plans: HashMap<(LayerId, Phase), Vec<DirPlan>>,
    queued_this_pass: HashSet<PathBuf>,
    build_infos: HashMap<String, BuildInfo>,
    interrupted: HashSet<String>,
    interrupt_reported: HashSet<String>,
    unhandled_extensions: HashSet<String>,
    stats: BuildStats,
}

impl Scheduler {
    /// Creates a scheduler with an explicit registry and toolchain.
    pub fn new(options: &BuildOptions, registry: ProcessorRegistry, toolchain: Box<dyn Toolchain>) -> Self {
        Self {
            cache: BuildCache::new(&options.build_dir),
            registry,
            toolchain,
            skip_compile: options.skip_compile,
            force_full: options.force_full_rebuild,
            files: options
                .files
                .as_ref()
                .map(|files| files.iter().cloned().collect()),
            generated_extension: options.generated_extension.clone(),
            package_repository: options.package_repository.clone(),
            states: HashMap::new(),
            plans: HashMap::new(),
            queued_this_pass: HashSet::new(),
            build_infos: HashMap::new(),
            interrupted: HashSet::new(),
            interrupt_reported: HashSet::new(),
            unhandled_extensions: HashSet::new(),
            stats: BuildStats::default(),
        }
    }

    /// Creates a scheduler with the directive processor for the configured
    /// source extensions and the configured toolchain.
    pub fn with_defaults(options: &BuildOptions) -> Self {
        let mut registry = ProcessorRegistry::new();
        registry.register(
            Box::new(DirectiveProcessor::new(options.source_extensions.clone())),
            0,
        );
        Self::new(options, registry, toolchain_for(&options.toolchain))
    }

    /// The processor registry, for registering more processors.
    pub fn registry_mut(&mut self) -> &mut ProcessorRegistry {
        &mut self.registry
    }

    /// The processor registry.
    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Persisted build state.
    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Extension of compiled artifacts.
    pub fn artifact_extension(&self) -> &str {
        self.toolchain.artifact_extension()
    }

    /// The state of a pass, if it was prepared.
    pub fn state(&self, layer: LayerId, phase: Phase) -> Option<&BuildState> {
        self.states.get(&(layer, phase))
    }

    /// Counters since the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Clears the work counters.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Forgets every pass state so the next build walks all layers again.
    pub fn reset_states(&mut self) {
        self.states.clear();
        self.plans.clear();
        self.queued_this_pass.clear();
        self.build_infos.clear();
        self.interrupted.clear();
        self.interrupt_reported.clear();
    }

    /// Starts the current pass over. Work counters are kept.
    pub fn restart_pass(&mut self) {
        self.reset_states();
        self.stats.restarts += 1;
    }

    /// Resets every pass and makes the next pass ignore dependency records.
    pub fn rebuild_all(&mut self) {
        self.reset_states();
        self.force_full = true;
    }

    /// Returns `true` if the next pass ignores dependency records.
    pub fn is_forcing_full(&self) -> bool {
        self.force_full
    }

    /// Ends a build pass: drops transformed declarations from the cache,
    /// clears pending changes, and stops forcing full rescans.
    pub fn finish_pass(&mut self, types: &mut TypeCache) {
        types.evict_transformed();
        types.clear_pending();
        self.force_full = false;
        self.queued_this_pass.clear();
        self.interrupted.clear();
        self.interrupt_reported.clear();
    }

    /// The build info of a build layer as last loaded or written.
    pub fn build_info(&mut self, build_layer: &str) -> &BuildInfo {
        self.info_mut(build_layer)
    }

    fn info_mut(&mut self, name: &str) -> &mut BuildInfo {
        match self.build_infos.entry(name.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let info = self
                    .cache
                    .load_build_info(name)
                    .unwrap_or_else(|| BuildInfo::new(name));
                if info.interrupted {
                    warn!(layer = name, "previous build was interrupted; rescanning");
                    self.interrupted.insert(name.to_string());
                }
                v.insert(info)
            }
        }
    }

    fn save_info(&mut self, name: &str) {
        let dir = self.cache.build_layer_dir(name);
        let info = self.info_mut(name);
        if let Err(err) = info.save(&dir) {
            warn!(layer = name, %err, "cannot write build info");
        }
    }

    fn target_for(&self, stack: &LayerStack, layer: &Layer) -> Option<Target> {
        if layer.dynamic {
            return None;
        }
        let build = stack.get(stack.build_layer_for(layer.position)?)?;
        let prior: Vec<String> = stack
            .build_layers()
            .into_iter()
            .filter_map(|id| stack.get(id))
            .filter(|l| l.position < build.position)
            .map(|l| l.name.clone())
            .collect();
        let classes_root = self.cache.classes_dir(&build.name);
        let mut search_path: Vec<PathBuf> = prior.iter().map(|n| self.cache.classes_dir(n)).collect();
        search_path.push(classes_root.clone());
        search_path.extend(self.package_repository.clone());
        Some(Target {
            build_layer: build.name.clone(),
            build_position: build.position,
            gen_root: self.cache.gen_dir(&build.name),
            classes_root,
            prior,
            search_path,
        })
    }

    /// Loads the dependency records of `layer` and queues its work.
    ///
    /// Does nothing for a pass that is already prepared or started.
    pub fn prepare(&mut self, ctx: &mut BuildContext<'_>, layer_id: LayerId, phase: Phase) -> StrataResult<()> {
        let key = (layer_id, phase);
        if self.states.get(&key).is_some_and(|s| s.pass != PassState::NotStarted) {
            return Ok(());
        }
        let stack = ctx.stack;
        let layer = stack
            .get(layer_id)
            .ok_or_else(|| InternalError::new(format!("prepare of disposed {layer_id:?}")))?;
        let target = self.target_for(stack, layer);

        let mut force = self.force_full;
        if let Some(t) = &target {
            self.info_mut(&t.build_layer);
            if self.interrupted.contains(&t.build_layer) {
                force = true;
                if self.interrupt_reported.insert(t.build_layer.clone()) {
                    ctx.sink.emit(Diagnostic::note(
                        B003,
                        format!("last build of '{}' was interrupted; rebuilding it fully", t.build_layer),
                    ));
                }
            }
        }

        let mut plans = Vec::new();
        let dirs: Vec<PathBuf> = layer.src_index.dirs().map(Path::to_path_buf).collect();
        for rel_dir in dirs {
            if let Some(plan) = self.plan_dir(ctx, layer, target.as_ref(), phase, &rel_dir, force) {
                plans.push(plan);
            }
        }

        let mut queued: HashSet<PathBuf> = self.queued_this_pass.clone();
        for plan in &plans {
            queued.extend(plan.queued_paths());
        }
        propagate_file_deps(&mut plans, &mut queued);
        if let Some(files) = &self.files {
            for plan in &mut plans {
                restrict_to(plan, files);
            }
        }

        let mut state = BuildState {
            pass: PassState::Prepared,
            ..BuildState::default()
        };
        for plan in &plans {
            state.walked_dirs.push(plan.rel_dir.clone());
            state.to_generate.extend(plan.queued_paths());
            state
                .to_compile
                .extend(plan.compile_only.iter().map(|name| plan.abs_path(name)));
        }
        debug!(
            layer = %layer.name,
            %phase,
            generate = state.to_generate.len(),
            compile = state.to_compile.len(),
            "prepared"
        );
        self.queued_this_pass.extend(state.to_generate.iter().cloned());
        self.states.insert(key, state);
        self.plans.insert(key, plans);
        Ok(())
    }

    fn plan_dir(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        target: Option<&Target>,
        phase: Phase,
        rel_dir: &Path,
        force: bool,
    ) -> Option<DirPlan> {
        let all_files = layer.src_index.files_in(rel_dir);
        let mut files = Vec::new();
        for file in all_files {
            if !self.handles(ctx.sink, layer, file, phase) {
                continue;
            }
            if target.is_some_and(|t| is_shadowed(ctx.stack, layer, t.build_position, file)) {
                continue;
            }
            files.push(file.clone());
        }

        let record_path = self
            .cache
            .record_path(&layer.name, &layer.package_prefix, rel_dir, phase.as_str());
        let old = if force {
            None
        } else {
            self.cache.load_record(&record_path, layer.descriptor_mtime)
        };
        if files.is_empty() && old.is_none() {
            return None;
        }

        let mut plan = DirPlan {
            rel_dir: rel_dir.to_path_buf(),
            record_path,
            entries: BTreeMap::new(),
            old_build_time: None,
            files,
            generate: BTreeSet::new(),
            compile_only: BTreeSet::new(),
        };

        let Some(old) = old else {
            debug!(layer = %layer.name, dir = %rel_dir.display(), "full rescan");
            plan.generate = plan.files.iter().map(file_name).collect();
            return Some(plan);
        };

        let build_time = old.build_time();
        plan.old_build_time = Some(build_time);
        let dir_abs = layer.layer_root.join(rel_dir);
        if modified_time(&dir_abs).is_some_and(|t| t > build_time) {
            let listing: Vec<String> = all_files.iter().map(file_name).collect();
            let diff = SourceHasher::diff_listing(&listing, &old);
            for name in &diff.removed {
                self.drop_removed(ctx, layer, target, rel_dir, name, old.entries.get(name));
            }
        }
        plan.entries = old.entries;
        let live: HashSet<String> = plan.files.iter().map(file_name).collect();
        plan.entries.retain(|name, _| live.contains(name));

        for file in &plan.files {
            let name = file_name(file);
            let decision = match plan.entries.get(&name) {
                None => Decision::Generate("new file"),
                Some(entry) if target.is_some_and(|t| self.inherited_diverged(t, entry)) => {
                    Decision::Generate("inherited output diverged")
                }
                Some(entry) => self.check_entry(ctx.stack, layer, target, file, entry, build_time),
            };
            match decision {
                Decision::UpToDate => {}
                Decision::CompileOnly => {
                    debug!(file = %file.abs_path.display(), "compile only");
                    plan.compile_only.insert(name);
                }
                Decision::Generate(reason) => {
                    debug!(file = %file.abs_path.display(), reason, "regenerate");
                    plan.generate.insert(name);
                }
            }
        }
        Some(plan)
    }

    fn handles(&mut self, sink: &DiagnosticSink, layer: &Layer, file: &SourceEntry, phase: Phase) -> bool {
        if self.registry.find(&layer.name, file.extension(), phase).is_some() {
            return true;
        }
        if self.registry.find_any(&layer.name, file.extension()).is_none()
            && self.unhandled_extensions.insert(file.extension().to_string())
        {
            sink.emit(
                Diagnostic::note(B002, format!("no processor for '.{}' files; skipping them", file.extension()))
                    .at(Location::file(&file.abs_path)),
            );
        }
        false
    }

    fn check_entry(
        &self,
        stack: &LayerStack,
        layer: &Layer,
        target: Option<&Target>,
        file: &SourceEntry,
        entry: &DependencyEntry,
        build_time: SystemTime,
    ) -> Decision {
        if entry.errored {
            return Decision::Generate("failed last time");
        }
        let Some(output_time) = self.output_time(target, entry, build_time) else {
            return Decision::Generate("output missing");
        };
        if modified_time(&file.abs_path).is_some_and(|t| t > output_time) {
            return Decision::Generate("source changed");
        }
        for dep in &entry.file_deps {
            if self.queued_this_pass.contains(dep) {
                return Decision::Generate("dependency regenerated");
            }
            match modified_time(dep) {
                Some(t) if t > output_time => return Decision::Generate("dependency changed"),
                None => return Decision::Generate("dependency removed"),
                _ => {}
            }
        }
        for (type_name, recorded) in &entry.type_deps {
            let current = defining_layer(stack, type_name, layer.position)
                .map(|l| l.name.as_str())
                .unwrap_or_default();
            if current != recorded {
                return Decision::Generate("type dependency overridden");
            }
        }
        if let Some(t) = target {
            if entry.needs_compile && !self.skip_compile {
                let ext = self.toolchain.artifact_extension();
                for out in entry.outputs.iter().filter(|o| !o.inherited) {
                    let generated = t.gen_root.join(&out.rel_path);
                    let artifact = t.classes_root.join(out.rel_path.with_extension(ext));
                    let stale = match (modified_time(&generated), modified_time(&artifact)) {
                        (Some(g), Some(a)) => g > a,
                        _ => true,
                    };
                    if stale {
                        return Decision::CompileOnly;
                    }
                }
            }
        }
        Decision::UpToDate
    }

    /// Returns `true` if an output recorded as inherited no longer matches
    /// the output of the earlier build layer it was inherited from.
    fn inherited_diverged(&mut self, target: &Target, entry: &DependencyEntry) -> bool {
        entry
            .outputs
            .iter()
            .filter(|o| o.inherited)
            .any(|o| self.prior_hash(target, &o.rel_path) != Some(o.hash))
    }

    /// The oldest modification time among an entry's outputs, looking in
    /// earlier build layers for outputs missing here. `None` if an output is
    /// missing everywhere.
    fn output_time(&self, target: Option<&Target>, entry: &DependencyEntry, build_time: SystemTime) -> Option<SystemTime> {
        let Some(t) = target else {
            return Some(build_time);
        };
        if entry.outputs.is_empty() {
            return Some(build_time);
        }
        let mut oldest: Option<SystemTime> = None;
        for out in &entry.outputs {
            let time = modified_time(&t.gen_root.join(&out.rel_path)).or_else(|| {
                t.prior
                    .iter()
                    .find_map(|name| modified_time(&self.cache.gen_dir(name).join(&out.rel_path)))
            })?;
            oldest = Some(oldest.map_or(time, |o| o.min(time)));
        }
        oldest
    }

    fn drop_removed(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        target: Option<&Target>,
        rel_dir: &Path,
        name: &str,
        entry: Option<&DependencyEntry>,
    ) {
        let rel = rel_dir.join(name);
        ctx.sink.emit(
            Diagnostic::warning(B001, format!("source file '{}' was removed", rel.display()))
                .at(Location::file(layer.layer_root.join(&rel))),
        );
        let type_name = QualifiedName::from_source_path(&layer.package_prefix, &rel);
        ctx.types.invalidate_name(type_name.as_str());
        let Some(t) = target else { return };
        let ext = self.toolchain.artifact_extension().to_string();
        let info = self.info_mut(&t.build_layer);
        if let Some(entry) = entry {
            for out in &entry.outputs {
                remove_if_present(&t.gen_root.join(&out.rel_path));
                remove_if_present(&t.classes_root.join(out.rel_path.with_extension(&ext)));
                info.generated_hashes.remove(&out.rel_path);
            }
        }
        if info.compiled_artifacts.get(type_name.as_str()) == Some(&layer.name) {
            info.compiled_artifacts.remove(type_name.as_str());
        }
    }

    /// Builds one layer in one phase.
    ///
    /// Returns `Err` only for a disposed layer id. Parse, generation, and
    /// compile failures are reported to the sink and yield
    /// [`BuildStatus::Error`].
    pub fn build(&mut self, ctx: &mut BuildContext<'_>, layer_id: LayerId, phase: Phase) -> StrataResult<BuildStatus> {
        let key = (layer_id, phase);
        if let Some(state) = self.states.get(&key) {
            if state.is_started() {
                return Ok(state.status);
            }
        }
        self.prepare(ctx, layer_id, phase)?;
        let stack = ctx.stack;
        let layer = stack
            .get(layer_id)
            .ok_or_else(|| InternalError::new(format!("build of disposed {layer_id:?}")))?;
        if let Some(state) = self.states.get_mut(&key) {
            state.pass = PassState::Started;
        }
        let target = self.target_for(stack, layer);
        if let Some(t) = &target {
            self.info_mut(&t.build_layer).interrupted = true;
            self.save_info(&t.build_layer);
        }

        let pass_start = SystemTime::now();
        let mut plans = self.plans.remove(&key).unwrap_or_default();
        let mut parsed: HashMap<PathBuf, ParsedFile> = HashMap::new();
        let mut errors: BTreeSet<PathBuf> = BTreeSet::new();
        self.parse_queued(ctx, layer, phase, &mut plans, &mut parsed, &mut errors);

        let groups = match &target {
            Some(t) => self.settle_groups(ctx, layer, phase, t, &mut plans, &mut parsed, &mut errors),
            None => BTreeMap::new(),
        };

        let mut status = BuildStatus::NoFilesToCompile;
        for plan in &mut plans {
            let dir_status = self.process_dir(
                ctx,
                layer,
                phase,
                target.as_ref(),
                plan,
                &parsed,
                &groups,
                &mut errors,
                pass_start,
            );
            status = status.merge(dir_status);
        }
        if !errors.is_empty() {
            status = BuildStatus::Error;
        }

        if let Some(t) = &target {
            let info = self.info_mut(&t.build_layer);
            let prefix = format!("{}/", layer.name);
            info.type_groups.retain(|k, _| !k.starts_with(&prefix));
            for (group, members) in &groups {
                info.type_groups.insert(format!("{prefix}{group}"), members.clone());
            }
            info.interrupted = false;
            self.save_info(&t.build_layer);
        }

        info!(layer = %layer.name, %phase, %status, errors = errors.len(), "layer built");
        if let Some(state) = self.states.get_mut(&key) {
            state.pass = PassState::Processed;
            state.status = status;
            state.errors = errors;
        }
        Ok(status)
    }

    fn parse_queued(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        phase: Phase,
        plans: &mut [DirPlan],
        parsed: &mut HashMap<PathBuf, ParsedFile>,
        errors: &mut BTreeSet<PathBuf>,
    ) {
        for plan in plans.iter_mut() {
            for file in &plan.files {
                let name = file_name(file);
                if !plan.generate.contains(&name)
                    || parsed.contains_key(&file.abs_path)
                    || errors.contains(&file.abs_path)
                {
                    continue;
                }
                let Some(processor) = self.registry.find(&layer.name, file.extension(), phase) else {
                    continue;
                };
                self.stats.parsed.push(file.abs_path.clone());
                match processor.parse(file) {
                    Ok(result) => {
                        for type_name in &result.defined_types {
                            ctx.types.invalidate_name(type_name);
                            ctx.types.mark_pending(type_name);
                        }
                        parsed.insert(file.abs_path.clone(), result);
                    }
                    Err(err) => {
                        report_parse_error(ctx.sink, &err);
                        errors.insert(file.abs_path.clone());
                        plan.entries.entry(name).or_default().errored = true;
                    }
                }
            }
        }
    }

    /// Computes the type-group membership of `layer` and forces group
    /// dependents into generation until membership stops changing.
    #[allow(clippy::too_many_arguments)]
    fn settle_groups(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        phase: Phase,
        target: &Target,
        plans: &mut [DirPlan],
        parsed: &mut HashMap<PathBuf, ParsedFile>,
        errors: &mut BTreeSet<PathBuf>,
    ) -> BTreeMap<String, Vec<String>> {
        let prefix = format!("{}/", layer.name);
        let previous: BTreeMap<String, Vec<String>> = self
            .info_mut(&target.build_layer)
            .type_groups
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|g| (g.to_string(), v.clone())))
            .collect();
        loop {
            let (membership, changed_members) = group_membership(plans, parsed);
            let mut changed: BTreeSet<&str> = BTreeSet::new();
            for (group, members) in &membership {
                if previous.get(group) != Some(members) || changed_members.contains(group) {
                    changed.insert(group);
                }
            }
            for group in previous.keys() {
                if !membership.contains_key(group) {
                    changed.insert(group);
                }
            }

            let mut forced = false;
            for plan in plans.iter_mut() {
                let mut newly = Vec::new();
                for file in &plan.files {
                    let name = file_name(file);
                    if plan.generate.contains(&name) {
                        continue;
                    }
                    let deps = plan.entries.get(&name).map(|e| e.group_deps.as_slice()).unwrap_or_default();
                    if deps.iter().any(|g| changed.contains(g.as_str())) {
                        newly.push(name);
                    }
                }
                for name in newly {
                    debug!(layer = %layer.name, file = %name, "type group changed");
                    plan.compile_only.remove(&name);
                    plan.generate.insert(name);
                    forced = true;
                }
            }
            if !forced {
                return membership;
            }

            let mut queued = self.queued_this_pass.clone();
            for plan in plans.iter() {
                queued.extend(plan.queued_paths());
            }
            propagate_file_deps(plans, &mut queued);
            if let Some(files) = &self.files {
                for plan in plans.iter_mut() {
                    restrict_to(plan, files);
                }
            }
            self.queued_this_pass.extend(queued);
            self.parse_queued(ctx, layer, phase, plans, parsed, errors);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_dir(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        phase: Phase,
        target: Option<&Target>,
        plan: &mut DirPlan,
        parsed: &HashMap<PathBuf, ParsedFile>,
        groups: &BTreeMap<String, Vec<String>>,
        errors: &mut BTreeSet<PathBuf>,
        pass_start: SystemTime,
    ) -> BuildStatus {
        let ext = self.toolchain.artifact_extension().to_string();
        let mut batch: Vec<(String, PathBuf)> = Vec::new();

        for file in &plan.files {
            let name = file_name(file);
            if plan.generate.contains(&name) {
                let Some(result) = parsed.get(&file.abs_path) else { continue };
                let previous = plan.entries.get(&name).cloned().unwrap_or_default();
                let mut entry = DependencyEntry {
                    outputs: Vec::new(),
                    file_deps: result.file_deps.iter().cloned().collect(),
                    type_deps: result
                        .type_deps
                        .iter()
                        .map(|ty| {
                            let owner = defining_layer(ctx.stack, ty, layer.position)
                                .map(|l| l.name.clone())
                                .unwrap_or_default();
                            (ty.clone(), owner)
                        })
                        .collect(),
                    groups: result.groups.clone(),
                    group_deps: result.group_deps.clone(),
                    needs_compile: result.needs_compile,
                    errored: false,
                };

                if let Some(t) = target {
                    match self.generate_file(ctx, layer, phase, t, file, result, groups, &previous) {
                        Some(outputs) => {
                            if result.needs_compile && !self.skip_compile {
                                for out in outputs.iter().filter(|o| !o.inherited) {
                                    batch.push((name.clone(), t.gen_root.join(&out.rel_path)));
                                }
                            }
                            for ty in &result.defined_types {
                                if ctx.types.is_compiled_loaded(ty) {
                                    ctx.sink.emit(Diagnostic::warning(
                                        W001,
                                        format!("compiled model for '{ty}' is stale; restart to pick up the change"),
                                    ));
                                }
                            }
                            entry.outputs = outputs;
                        }
                        None => {
                            errors.insert(file.abs_path.clone());
                            entry.errored = true;
                            entry.outputs = previous.outputs;
                        }
                    }
                }

                self.cache_declaration(ctx, file, result, target.is_some());
                plan.entries.insert(name, entry);
            } else if plan.compile_only.contains(&name) {
                if let (Some(t), Some(entry)) = (target, plan.entries.get(&name)) {
                    for out in entry.outputs.iter().filter(|o| !o.inherited) {
                        batch.push((name.clone(), t.gen_root.join(&out.rel_path)));
                    }
                }
            }
        }

        let mut status = BuildStatus::NoFilesToCompile;
        if let (Some(t), false) = (target, batch.is_empty()) {
            status = self.compile_batch(ctx, layer, t, plan, &batch, &ext, errors);
        }

        let keep_old_time = self.files.is_some();
        let build_time = match plan.old_build_time {
            Some(old) if keep_old_time => old,
            _ => pass_start,
        };
        let mut record = DependencyRecord::new(&layer.name, phase.as_str(), build_time);
        record.entries = std::mem::take(&mut plan.entries);
        if let Err(err) = record.save(&plan.record_path) {
            warn!(path = %plan.record_path.display(), %err, "cannot write dependency record");
        }
        status
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_file(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        phase: Phase,
        target: &Target,
        file: &SourceEntry,
        result: &ParsedFile,
        groups: &BTreeMap<String, Vec<String>>,
        previous: &DependencyEntry,
    ) -> Option<Vec<GeneratedOutput>> {
        let processor = self.registry.find(&layer.name, file.extension(), phase)?;
        let gen_ctx = GenerateContext {
            output_root: &target.gen_root,
            generated_extension: &self.generated_extension,
            groups,
        };
        let generated = match processor.generate(file, result, &gen_ctx) {
            Ok(files) => files,
            Err(err) => {
                ctx.sink
                    .emit(Diagnostic::error(E002, err.message).at(Location::file(&err.path)));
                return None;
            }
        };
        self.stats.generated.push(file.abs_path.clone());

        let mut outputs = Vec::with_capacity(generated.len());
        for output in generated {
            let hash = ContentHash::from_bytes(&output.contents);
            let inherited = self.prior_hash(target, &output.rel_path) == Some(hash);
            let path = target.gen_root.join(&output.rel_path);
            let bytes: &[u8] = if inherited { &[] } else { &output.contents };
            let written = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::write(&path, bytes));
            if let Err(e) = written {
                ctx.sink.emit(
                    Diagnostic::error(E002, format!("cannot write generated file: {e}"))
                        .at(Location::file(&path)),
                );
                return None;
            }
            let info = self.info_mut(&target.build_layer);
            if inherited {
                debug!(path = %output.rel_path.display(), "inherited from earlier build layer");
                info.generated_hashes.remove(&output.rel_path);
                self.stats.inherited.push(path);
            } else {
                info.generated_hashes.insert(output.rel_path.clone(), hash);
            }
            outputs.push(GeneratedOutput {
                rel_path: output.rel_path,
                hash,
                inherited,
            });
        }

        for old in &previous.outputs {
            if !outputs.iter().any(|o| o.rel_path == old.rel_path) {
                remove_if_present(&target.gen_root.join(&old.rel_path));
            }
        }
        Some(outputs)
    }

    fn prior_hash(&mut self, target: &Target, rel_path: &Path) -> Option<ContentHash> {
        for name in target.prior.clone() {
            if let Some(hash) = self.info_mut(&name).generated_hashes.get(rel_path) {
                return Some(*hash);
            }
        }
        None
    }

    /// Records a parsed file in the resolution cache. Declarations lowered
    /// for compilation are marked transformed.
    fn cache_declaration(&self, ctx: &mut BuildContext<'_>, file: &SourceEntry, result: &ParsedFile, transformed: bool) {
        let mut loader = ProcessorLoader::new(&self.registry, ctx.stack, ctx.sink);
        loader.prime(file.abs_path.clone(), result.clone());
        let resolved = ctx
            .types
            .resolve(ctx.stack, &mut loader, file.type_name.as_str(), Some(file.layer));
        if let (Some(Resolved::Source(id)), true) = (resolved, transformed) {
            ctx.types.mark_transformed(id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_batch(
        &mut self,
        ctx: &mut BuildContext<'_>,
        layer: &Layer,
        target: &Target,
        plan: &mut DirPlan,
        batch: &[(String, PathBuf)],
        ext: &str,
        errors: &mut BTreeSet<PathBuf>,
    ) -> BuildStatus {
        let out_dir = target
            .classes_root
            .join(dotted_to_path(&layer.package_prefix))
            .join(&plan.rel_dir);
        let files: Vec<PathBuf> = batch.iter().map(|(_, p)| p.clone()).collect();
        let is_new = files.iter().any(|f| {
            f.file_stem()
                .map_or(true, |stem| !out_dir.join(stem).with_extension(ext).exists())
        });

        self.stats.toolchain_runs += 1;
        self.stats.compiled.extend(files.iter().cloned());
        let outcome = self.toolchain.compile(&files, &out_dir, &target.search_path);
        if !outcome.is_success() {
            for diag in outcome.diagnostics {
                ctx.sink.emit(diag);
            }
            for (name, _) in batch {
                if let Some(entry) = plan.entries.get_mut(name) {
                    entry.errored = true;
                }
                errors.insert(plan.abs_path(name));
            }
            return BuildStatus::Error;
        }

        let info = self.info_mut(&target.build_layer);
        for (name, _) in batch {
            if let Some(file) = plan.files.iter().find(|f| file_name(f) == *name) {
                info.compiled_artifacts
                    .insert(file.type_name.as_str().to_string(), layer.name.clone());
            }
        }
        if is_new {
            BuildStatus::NewCompiledFiles
        } else {
            BuildStatus::ChangedCompiledFiles
        }
    }
}

impl DirPlan {
    fn abs_path(&self, name: &str) -> PathBuf {
        self.files
            .iter()
            .find(|f| file_name(f) == name)
            .map(|f| f.abs_path.clone())
            .unwrap_or_else(|| self.rel_dir.join(name))
    }

    fn queued_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files
            .iter()
            .filter(|f| self.generate.contains(&file_name(f)))
            .map(|f| f.abs_path.clone())
    }
}

fn file_name(entry: &SourceEntry) -> String {
    entry
        .rel_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Queues every file recorded to depend on a queued file, until nothing
/// changes.
fn propagate_file_deps(plans: &mut [DirPlan], queued: &mut HashSet<PathBuf>) {
    loop {
        let mut changed = false;
        for plan in plans.iter_mut() {
            let mut newly = Vec::new();
            for file in &plan.files {
                let name = file_name(file);
                if plan.generate.contains(&name) {
                    continue;
                }
                let depends = plan
                    .entries
                    .get(&name)
                    .is_some_and(|e| e.file_deps.iter().any(|d| queued.contains(d)));
                if depends {
                    newly.push((name, file.abs_path.clone()));
                }
            }
            for (name, path) in newly {
                debug!(file = %path.display(), "dependency queued");
                plan.compile_only.remove(&name);
                plan.generate.insert(name);
                queued.insert(path);
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
}

fn restrict_to(plan: &mut DirPlan, files: &BTreeSet<PathBuf>) {
    let allowed: HashSet<String> = plan
        .files
        .iter()
        .filter(|f| files.contains(&f.abs_path))
        .map(file_name)
        .collect();
    plan.generate.retain(|name| allowed.contains(name));
}

/// Current ordered membership of every group in the plans, plus the groups
/// with a member queued for generation.
fn group_membership(
    plans: &[DirPlan],
    parsed: &HashMap<PathBuf, ParsedFile>,
) -> (BTreeMap<String, Vec<String>>, BTreeSet<String>) {
    let mut membership: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut changed = BTreeSet::new();
    for plan in plans {
        for file in &plan.files {
            let name = file_name(file);
            let groups: &[String] = match parsed.get(&file.abs_path) {
                Some(result) => &result.groups,
                None => plan.entries.get(&name).map(|e| e.groups.as_slice()).unwrap_or_default(),
            };
            for group in groups {
                membership
                    .entry(group.clone())
                    .or_default()
                    .push(file.type_name.as_str().to_string());
                if plan.generate.contains(&name) {
                    changed.insert(group.clone());
                }
            }
        }
    }
    for members in membership.values_mut() {
        members.sort();
    }
    (membership, changed)
}

/// Returns `true` if a layer above `layer`, up to its build layer, defines
/// the same type.
fn is_shadowed(stack: &LayerStack, layer: &Layer, build_position: usize, file: &SourceEntry) -> bool {
    (layer.position + 1..=build_position)
        .filter_map(|pos| stack.at(pos))
        .any(|l| l.src_index.find_type(file.type_name.as_str()).is_some())
}

/// The highest layer at or below `position` whose sources define `type_name`.
fn defining_layer<'s>(stack: &'s LayerStack, type_name: &str, position: usize) -> Option<&'s Layer> {
    (0..=position)
        .rev()
        .filter_map(|pos| stack.at(pos))
        .find(|l| l.src_index.find_type(type_name).is_some())
}

fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "cannot remove stale output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use strata_common::Interner;
    use strata_source::SrcDirIndex;
    use tempfile::TempDir;

    use crate::codes::{B001, E001};

    fn set_age(path: &Path, secs: u64) {
        let t = SystemTime::now() - Duration::from_secs(secs);
        fs::File::open(path).unwrap().set_modified(t).unwrap();
    }

    fn age_tree(path: &Path, secs: u64) {
        if path.is_dir() {
            for entry in fs::read_dir(path).unwrap() {
                age_tree(&entry.unwrap().path(), secs);
            }
        }
        set_age(path, secs);
    }

    fn mark_dir_changed(path: &Path) {
        let t = SystemTime::now() + Duration::from_secs(10);
        fs::File::open(path).unwrap().set_modified(t).unwrap();
    }

    struct Harness {
        _tmp: TempDir,
        root: PathBuf,
        stack: LayerStack,
        types: TypeCache,
        sink: DiagnosticSink,
        scheduler: Scheduler,
    }

    impl Harness {
        /// Layers bottom first; every layer but the last is built separately.
        fn new(layers: &[(&str, &[(&str, &str)])]) -> Self {
            Self::with_options(layers, |_| {})
        }

        fn with_options(layers: &[(&str, &[(&str, &str)])], tweak: impl FnOnce(&mut BuildOptions)) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().to_path_buf();
            let mut options = BuildOptions::for_root(&root);
            tweak(&mut options);
            let mut stack = LayerStack::new();
            for (pos, (name, files)) in layers.iter().enumerate() {
                let src = root.join("src").join(name);
                fs::create_dir_all(&src).unwrap();
                for (rel, body) in *files {
                    fs::write(src.join(rel), body).unwrap();
                }
                age_tree(&src, 1000);
                let id = stack.reserve();
                let mut layer = Layer::new(id, name, src.clone());
                layer.package_prefix = "app".to_string();
                layer.build_separate = pos + 1 < layers.len();
                layer.src_index = SrcDirIndex::scan(id, &src, "app", &options.source_extensions).unwrap();
                stack.insert_at(layer, pos);
            }
            Self {
                _tmp: tmp,
                types: TypeCache::new(Arc::new(Interner::new())),
                sink: DiagnosticSink::new(),
                scheduler: Scheduler::with_defaults(&options),
                root,
                stack,
            }
        }

        fn src(&self, layer: &str) -> PathBuf {
            self.root.join("src").join(layer)
        }

        fn gen(&self, build_layer: &str, rel: &str) -> PathBuf {
            self.scheduler.cache().gen_dir(build_layer).join(rel)
        }

        fn rescan(&mut self, pos: usize) {
            let id = self.stack.active_ids()[pos];
            let layer = self.stack.get_mut(id).unwrap();
            layer.src_index = SrcDirIndex::scan(id, &layer.layer_root, "app", &["sc".to_string()]).unwrap();
        }

        fn pass(&mut self) -> BuildStatus {
            self.scheduler.reset_states();
            self.scheduler.reset_stats();
            let ids = self.stack.active_ids().to_vec();
            let mut ctx = BuildContext {
                stack: &self.stack,
                types: &mut self.types,
                sink: &self.sink,
            };
            let mut status = BuildStatus::NoFilesToCompile;
            for id in ids {
                for phase in Phase::ALL {
                    status = status.merge(self.scheduler.build(&mut ctx, id, phase).unwrap());
                }
            }
            self.scheduler.finish_pass(&mut self.types);
            status
        }

        fn age_build(&self) {
            age_tree(&self.root.join("build"), 100);
        }

        fn generated_names(&self) -> Vec<String> {
            let mut names: Vec<String> = self
                .scheduler
                .stats()
                .generated
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    #[test]
    fn first_build_generates_and_compiles() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n"), ("B.sc", "@depends A.sc\nb\n")])]);
        assert_eq!(h.pass(), BuildStatus::NewCompiledFiles);
        assert_eq!(h.generated_names(), vec!["A.sc", "B.sc"]);
        assert_eq!(h.scheduler.stats().toolchain_runs, 1);
        assert!(h.gen("app", "app/A.gen").exists());
        let classes = h.scheduler.cache().classes_dir("app");
        assert!(classes.join("app/A.out").exists());
        assert!(classes.join("app/B.out").exists());
        assert!(!h.sink.has_errors());
    }

    #[test]
    fn unchanged_tree_rebuilds_nothing() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n"), ("B.sc", "b\n")])]);
        h.pass();
        h.age_build();
        assert_eq!(h.pass(), BuildStatus::NoFilesToCompile);
        assert!(h.scheduler.stats().is_noop());
        assert!(h.scheduler.stats().parsed.is_empty());
    }

    #[test]
    fn touched_file_regenerates_itself_and_dependents() {
        let mut h = Harness::new(&[(
            "app",
            &[("A.sc", "a\n"), ("B.sc", "@depends A.sc\n"), ("C.sc", "c\n")],
        )]);
        h.pass();
        h.age_build();
        set_age(&h.src("app").join("A.sc"), 50);
        assert_eq!(h.pass(), BuildStatus::ChangedCompiledFiles);
        assert_eq!(h.generated_names(), vec!["A.sc", "B.sc"]);
        assert_eq!(h.scheduler.stats().compiled.len(), 2);
        assert_eq!(h.pass(), BuildStatus::NoFilesToCompile);
        assert!(h.scheduler.stats().is_noop());
    }

    #[test]
    fn parse_error_fails_the_layer_and_is_retried() {
        let mut h = Harness::new(&[("app", &[("A.sc", "@error broken\n"), ("B.sc", "b\n")])]);
        assert_eq!(h.pass(), BuildStatus::Error);
        assert!(h.sink.diagnostics().iter().any(|d| d.code == E001));
        let id = h.stack.active_ids()[0];
        let state = h.scheduler.state(id, Phase::Process).unwrap();
        assert_eq!(state.errors.len(), 1);
        assert!(h.gen("app", "app/B.gen").exists());

        h.age_build();
        assert_eq!(h.pass(), BuildStatus::Error);
        assert_eq!(h.scheduler.stats().parsed.len(), 1);
    }

    #[test]
    fn identical_output_in_higher_build_layer_is_inherited() {
        let mut h = Harness::new(&[("base", &[("Same.sc", "x\n")]), ("top", &[("Same.sc", "x\n")])]);
        h.pass();
        let stats = h.scheduler.stats();
        assert_eq!(stats.inherited.len(), 1);
        assert_eq!(stats.toolchain_runs, 1);
        let marker = h.gen("top", "app/Same.gen");
        assert_eq!(fs::metadata(&marker).unwrap().len(), 0);
        assert!(fs::metadata(h.gen("base", "app/Same.gen")).unwrap().len() > 0);
    }

    #[test]
    fn inherited_output_is_regenerated_when_the_earlier_layer_changes() {
        let mut h = Harness::new(&[("base", &[("Same.sc", "x\n")]), ("top", &[("Same.sc", "x\n")])]);
        h.pass();
        h.age_build();
        let base_src = h.src("base").join("Same.sc");
        fs::write(&base_src, "y\n").unwrap();
        set_age(&base_src, 50);
        h.pass();
        assert_eq!(h.generated_names(), vec!["Same.sc", "Same.sc"]);
        assert!(h.scheduler.stats().inherited.is_empty());
        assert_eq!(
            fs::read_to_string(h.gen("top", "app/Same.gen")).unwrap(),
            "// generated from app.Same\nx\n"
        );
        assert!(h.scheduler.cache().classes_dir("top").join("app/Same.out").exists());
    }

    #[test]
    fn type_dependency_overridden_by_a_new_layer_regenerates_the_user() {
        let mut h = Harness::new(&[
            ("lib", &[("X.sc", "x\n")]),
            ("app", &[("B.sc", "@uses app.X\nb\n"), ("C.sc", "c\n")]),
        ]);
        h.pass();
        h.age_build();

        let mid_src = h.root.join("src").join("mid");
        fs::create_dir_all(&mid_src).unwrap();
        fs::write(mid_src.join("X.sc"), "x2\n").unwrap();
        age_tree(&mid_src, 1000);
        let id = h.stack.reserve();
        let mut mid = Layer::new(id, "mid", mid_src.clone());
        mid.package_prefix = "app".to_string();
        mid.src_index = SrcDirIndex::scan(id, &mid_src, "app", &["sc".to_string()]).unwrap();
        h.stack.insert_at(mid, 1);

        h.pass();
        assert_eq!(h.generated_names(), vec!["B.sc", "X.sc"]);
    }

    #[test]
    fn rebuilding_a_loaded_compiled_type_warns() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n"), ("B.sc", "b\n")])]);
        h.pass();
        let ident = h.types.interner().get_or_intern("app.A");
        h.types.compiled_mut().mark_loaded(ident);

        h.age_build();
        set_age(&h.src("app").join("A.sc"), 50);
        h.pass();
        let stale: Vec<_> = h.sink.diagnostics().into_iter().filter(|d| d.code == W001).collect();
        assert_eq!(stale.len(), 1);
        assert!(stale[0].message.contains("app.A"));
    }

    #[test]
    fn different_output_in_higher_build_layer_is_compiled() {
        let mut h = Harness::new(&[("base", &[("Same.sc", "x\n")]), ("top", &[("Same.sc", "y\n")])]);
        h.pass();
        assert!(h.scheduler.stats().inherited.is_empty());
        assert_eq!(h.scheduler.stats().toolchain_runs, 2);
    }

    #[test]
    fn reentering_a_started_pass_returns_stored_status() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n")])]);
        let id = h.stack.active_ids()[0];
        let mut ctx = BuildContext {
            stack: &h.stack,
            types: &mut h.types,
            sink: &h.sink,
        };
        let first = h.scheduler.build(&mut ctx, id, Phase::Process).unwrap();
        let again = h.scheduler.build(&mut ctx, id, Phase::Process).unwrap();
        assert_eq!(first, again);
        assert_eq!(h.scheduler.stats().parsed.len(), 1);
        assert_eq!(h.scheduler.state(id, Phase::Process).unwrap().pass, PassState::Processed);
    }

    #[test]
    fn prepare_queues_without_building() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n")])]);
        let id = h.stack.active_ids()[0];
        let mut ctx = BuildContext {
            stack: &h.stack,
            types: &mut h.types,
            sink: &h.sink,
        };
        h.scheduler.prepare(&mut ctx, id, Phase::Process).unwrap();
        let state = h.scheduler.state(id, Phase::Process).unwrap();
        assert_eq!(state.pass, PassState::Prepared);
        assert_eq!(state.to_generate.len(), 1);
        assert!(h.scheduler.stats().parsed.is_empty());
    }

    #[test]
    fn removed_source_warns_and_drops_outputs() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n"), ("B.sc", "b\n")])]);
        h.pass();
        h.age_build();
        fs::remove_file(h.src("app").join("B.sc")).unwrap();
        mark_dir_changed(&h.src("app"));
        h.rescan(0);
        h.pass();
        assert!(h.sink.diagnostics().iter().any(|d| d.code == B001));
        assert!(!h.gen("app", "app/B.gen").exists());
        assert!(h.scheduler.stats().is_noop());
    }

    #[test]
    fn new_group_member_regenerates_collectors() {
        let mut h = Harness::new(&[(
            "app",
            &[("A.sc", "@group entities\n"), ("Registry.sc", "@collects entities\n")],
        )]);
        h.pass();
        h.age_build();
        let src = h.src("app");
        fs::write(src.join("B.sc"), "@group entities\n").unwrap();
        set_age(&src.join("B.sc"), 50);
        mark_dir_changed(&src);
        h.rescan(0);
        h.pass();
        assert_eq!(h.generated_names(), vec!["B.sc", "Registry.sc"]);
        let text = fs::read_to_string(h.gen("app", "app/Registry.gen")).unwrap();
        assert!(text.contains("// group entities: app.A, app.B"));
    }

    #[test]
    fn skip_compile_generates_only() {
        let mut h = Harness::with_options(&[("app", &[("A.sc", "a\n")])], |o| o.skip_compile = true);
        assert_eq!(h.pass(), BuildStatus::NoFilesToCompile);
        assert!(h.gen("app", "app/A.gen").exists());
        assert_eq!(h.scheduler.stats().toolchain_runs, 0);
    }

    #[test]
    fn nocompile_output_is_not_compiled() {
        let mut h = Harness::new(&[("app", &[("Doc.sc", "@nocompile\n")])]);
        h.pass();
        assert!(h.gen("app", "app/Doc.gen").exists());
        assert_eq!(h.scheduler.stats().toolchain_runs, 0);
    }

    #[test]
    fn missing_artifact_is_compiled_again() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n")])]);
        h.pass();
        h.age_build();
        fs::remove_file(h.scheduler.cache().classes_dir("app").join("app/A.out")).unwrap();
        assert_eq!(h.pass(), BuildStatus::NewCompiledFiles);
        assert!(h.scheduler.stats().generated.is_empty());
        assert_eq!(h.scheduler.stats().compiled.len(), 1);
    }

    #[test]
    fn interrupted_build_is_rescanned() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n")])]);
        h.pass();
        h.age_build();
        let mut info = h.scheduler.cache().load_build_info("app").unwrap();
        info.interrupted = true;
        h.scheduler.cache().save_build_info(&info).unwrap();
        h.pass();
        assert_eq!(h.generated_names(), vec!["A.sc"]);
        assert!(h.sink.diagnostics().iter().any(|d| d.code == B003));
        assert!(!h.scheduler.cache().load_build_info("app").unwrap().interrupted);
    }

    #[test]
    fn explicit_file_list_limits_generation() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n"), ("B.sc", "b\n")])]);
        let only = h.src("app").join("B.sc");
        h.scheduler.files = Some(BTreeSet::from([only]));
        h.pass();
        assert_eq!(h.generated_names(), vec!["B.sc"]);
    }

    #[test]
    fn dynamic_layer_is_parsed_but_not_generated() {
        let mut h = Harness::new(&[("app", &[("A.sc", "a\n")]), ("dyn", &[("D.sc", "@uses app.A\n")])]);
        let id = h.stack.active_ids()[1];
        let layer = h.stack.remove(id).unwrap();
        let new_id = h.stack.reserve();
        let mut moved = Layer::new(new_id, &layer.name, layer.layer_root.clone());
        moved.package_prefix = layer.package_prefix.clone();
        moved.dynamic = true;
        moved.src_index = SrcDirIndex::scan(new_id, &layer.layer_root, "app", &["sc".to_string()]).unwrap();
        h.stack.insert_at(moved, 1);

        h.pass();
        assert_eq!(h.generated_names(), vec!["A.sc"]);
        assert!(h.scheduler.stats().parsed.iter().any(|p| p.ends_with("D.sc")));
        assert!(!h.scheduler.cache().gen_dir("dyn").exists());
    }
}
