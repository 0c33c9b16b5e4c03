//! Conformance test helpers for the Strata build engine.
//!
//! A [`Fixture`] is a throwaway project on disk: layer descriptors and source
//! files under `layers/`, build output under `build/`. It controls file
//! timestamps explicitly so incremental decisions never depend on how fast
//! the test runs, and it builds [`Engine`]s whose toolchain records every
//! file it is asked to compile.

#![warn(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use strata_build::{
    CompileOutcome, CopyToolchain, DirectiveProcessor, ProcessorRegistry, Scheduler, Toolchain,
};
use strata_cache::BuildCache;
use strata_common::LayerId;
use strata_config::BuildOptions;
use strata_diagnostics::DiagnosticSink;
use strata_engine::{Engine, SharedContext};
use strata_layer::{LayerError, LayerResolver, LayerStack};
use tempfile::TempDir;

/// Seconds sources are backdated by when written.
const SOURCE_AGE: u64 = 1000;
/// Seconds build output is backdated by between builds.
const BUILD_AGE: u64 = 100;
/// Seconds a touched file is backdated by: newer than aged output, older than now.
const TOUCH_AGE: u64 = 50;

/// A [`Toolchain`] that copies like [`CopyToolchain`] and remembers every
/// file it was given.
pub struct RecordingToolchain {
    inner: CopyToolchain,
    compiled: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingToolchain {
    /// Creates a toolchain appending to `compiled`.
    pub fn new(artifact_extension: &str, compiled: Arc<Mutex<Vec<PathBuf>>>) -> Self {
        Self {
            inner: CopyToolchain::new(artifact_extension),
            compiled,
        }
    }
}

impl Toolchain for RecordingToolchain {
    fn compile(&self, files: &[PathBuf], output_dir: &Path, search_path: &[PathBuf]) -> CompileOutcome {
        self.compiled.lock().extend(files.iter().cloned());
        self.inner.compile(files, output_dir, search_path)
    }

    fn artifact_extension(&self) -> &str {
        self.inner.artifact_extension()
    }
}

/// The outcome of resolving layers without building.
pub struct Resolution {
    /// The stack as far as resolution got.
    pub stack: LayerStack,
    /// Ids of the requested layers, or the structural error.
    pub result: Result<Vec<LayerId>, LayerError>,
    /// Diagnostics reported along the way.
    pub sink: DiagnosticSink,
}

impl Resolution {
    /// Active layer names in ascending position.
    pub fn order(&self) -> Vec<String> {
        self.stack.layers().map(|l| l.name.clone()).collect()
    }

    /// Position of the named layer.
    pub fn position(&self, name: &str) -> Option<usize> {
        let id = self.stack.find(name)?;
        self.stack.get(id).map(|l| l.position)
    }
}

/// A temporary Strata project.
pub struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    options: BuildOptions,
    compiled: Arc<Mutex<Vec<PathBuf>>>,
}

impl Fixture {
    /// Creates an empty project with default options.
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let options = BuildOptions::for_root(&root);
        Self {
            _tmp: tmp,
            root,
            options,
            compiled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Options used for new engines.
    pub fn options_mut(&mut self) -> &mut BuildOptions {
        &mut self.options
    }

    /// Directory of the layer `name` under `layers/`.
    pub fn layer_dir(&self, name: &str) -> PathBuf {
        self.root.join("layers").join(name.replace('.', "/"))
    }

    /// Writes a layer descriptor with the extra `[layer]` keys in `body`,
    /// plus source files, all backdated.
    pub fn layer(&self, name: &str, body: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.layer_dir(name);
        fs::create_dir_all(&dir).expect("create layer dir");
        let base = name.rsplit('.').next().unwrap_or(name);
        let descriptor = dir.join(format!("{base}.layer"));
        fs::write(&descriptor, format!("[layer]\nname = \"{name}\"\n{body}")).expect("write descriptor");
        set_age(&descriptor, SOURCE_AGE);
        for (rel, text) in files {
            self.write(name, rel, text);
        }
        set_age(&dir, SOURCE_AGE);
        dir
    }

    /// Writes one backdated source file into a layer.
    pub fn write(&self, layer: &str, rel: &str, text: &str) -> PathBuf {
        let path = self.layer_dir(layer).join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create source dir");
        }
        fs::write(&path, text).expect("write source");
        set_age(&path, SOURCE_AGE);
        if let Some(parent) = path.parent() {
            set_age(parent, SOURCE_AGE);
        }
        path
    }

    /// Moves a source file's modification time forward past the last build
    /// without changing its contents.
    pub fn touch(&self, layer: &str, rel: &str) {
        set_age(&self.layer_dir(layer).join(rel), TOUCH_AGE);
    }

    /// Backdates all build output. Call between builds.
    pub fn age_build(&self) {
        age_tree(&self.options.build_dir, BUILD_AGE);
    }

    /// Resolves `names` into a fresh stack without building.
    pub fn resolve(&self, names: &[&str]) -> Resolution {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let sink = DiagnosticSink::new();
        let mut stack = LayerStack::new();
        let result = LayerResolver::new(&self.options.layer_search_path, &self.options.source_extensions, &sink)
            .resolve(&mut stack, &names, self.options.dynamic_by_default);
        Resolution { stack, result, sink }
    }

    /// An engine for the default runtime whose toolchain records into this
    /// fixture.
    pub fn engine(&self) -> Engine {
        let mut registry = ProcessorRegistry::new();
        registry.register(Box::new(DirectiveProcessor::new(self.options.source_extensions.clone())), 0);
        let toolchain = RecordingToolchain::new(&self.options.toolchain.artifact_extension, Arc::clone(&self.compiled));
        let scheduler = Scheduler::new(&self.options, registry, Box::new(toolchain));
        let ctx = Arc::new(SharedContext::new(self.options.clone(), DiagnosticSink::new()));
        Engine::with_scheduler(strata_config::DEFAULT_RUNTIME, ctx, scheduler)
    }

    /// File names handed to the toolchain since the last call, sorted.
    pub fn take_compiled(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .compiled
            .lock()
            .drain(..)
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    /// Path of a generated file in a build layer's output.
    pub fn generated(&self, build_layer: &str, rel: &str) -> PathBuf {
        BuildCache::new(&self.options.build_dir)
            .gen_dir(build_layer)
            .join(rel)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted file names of the sources an engine generated in its last pass.
pub fn generated_names(engine: &Engine) -> Vec<String> {
    let mut names: Vec<String> = engine
        .stats()
        .generated
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

fn set_age(path: &Path, secs: u64) {
    let t = SystemTime::now() - Duration::from_secs(secs);
    if let Ok(file) = fs::File::open(path) {
        let _ = file.set_modified(t);
    }
}

fn age_tree(path: &Path, secs: u64) {
    if path.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                age_tree(&entry.path(), secs);
            }
        }
    }
    set_age(path, secs);
}
