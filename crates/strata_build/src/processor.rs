//! The front-end seam: file processors and their registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use strata_source::SourceEntry;

use crate::phase::Phase;

/// Structural information a processor extracts from one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    /// Qualified names of the types the file defines.
    pub defined_types: Vec<String>,
    /// Absolute paths of other source files this file depends on.
    pub file_deps: Vec<PathBuf>,
    /// Qualified names of types this file refers to.
    pub type_deps: Vec<String>,
    /// Generated outputs are submitted to the toolchain.
    pub needs_compile: bool,
    /// Type groups the file's type belongs to.
    pub groups: Vec<String>,
    /// Type groups whose membership the file's output is derived from.
    pub group_deps: Vec<String>,
    /// Processor-specific body carried from parsing to generation.
    pub body: Vec<String>,
}

/// A file failed to parse.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {message}", path.display())]
pub struct ParseError {
    /// The file.
    pub path: PathBuf,
    /// One-based line of the problem, when known.
    pub line: Option<u32>,
    /// What went wrong.
    pub message: String,
}

/// A parsed file could not be turned into output.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {message}", path.display())]
pub struct GenerateError {
    /// The file.
    pub path: PathBuf,
    /// What went wrong.
    pub message: String,
}

/// One generated file, relative to the generated-source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Path relative to the generated-source root.
    pub rel_path: PathBuf,
    /// File contents.
    pub contents: Vec<u8>,
}

/// Inputs to [`FileProcessor::generate`] beyond the parsed file.
pub struct GenerateContext<'a> {
    /// Root that generated paths are relative to.
    pub output_root: &'a Path,
    /// Extension for generated files.
    pub generated_extension: &'a str,
    /// Current ordered membership of every type group in the layer.
    pub groups: &'a BTreeMap<String, Vec<String>>,
}

/// Parses and generates one kind of source file.
///
/// Processors are registered globally or for one layer, in priority order;
/// see [`ProcessorRegistry`].
pub trait FileProcessor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// File extensions (without the dot) this processor handles.
    fn extensions(&self) -> &[String];

    /// The phase this processor runs in.
    fn phase(&self) -> Phase;

    /// Extracts the structure of `entry`.
    fn parse(&self, entry: &SourceEntry) -> Result<ParsedFile, ParseError>;

    /// Produces the generated files for a parsed source file.
    fn generate(
        &self,
        entry: &SourceEntry,
        parsed: &ParsedFile,
        ctx: &GenerateContext<'_>,
    ) -> Result<Vec<GeneratedFile>, GenerateError>;
}

struct Registration {
    priority: i32,
    processor: Box<dyn FileProcessor>,
}

/// Processors registered globally and per layer.
///
/// Lookups try the layer's own processors first, then the global ones; within
/// each list the highest priority wins and equal priorities keep
/// registration order.
#[derive(Default)]
pub struct ProcessorRegistry {
    global: Vec<Registration>,
    per_layer: BTreeMap<String, Vec<Registration>>,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a processor for every layer.
    pub fn register(&mut self, processor: Box<dyn FileProcessor>, priority: i32) {
        insert_sorted(&mut self.global, Registration { priority, processor });
    }

    /// Registers a processor for one layer only.
    pub fn register_for_layer(&mut self, layer: &str, processor: Box<dyn FileProcessor>, priority: i32) {
        let list = self.per_layer.entry(layer.to_string()).or_default();
        insert_sorted(list, Registration { priority, processor });
    }

    /// The processor for files with `extension` in `layer` during `phase`.
    pub fn find(&self, layer: &str, extension: &str, phase: Phase) -> Option<&dyn FileProcessor> {
        self.candidates(layer)
            .find(|p| p.phase() == phase && p.extensions().iter().any(|e| e == extension))
    }

    /// The processor for `extension` in `layer` in whichever phase comes
    /// first.
    pub fn find_any(&self, layer: &str, extension: &str) -> Option<&dyn FileProcessor> {
        Phase::ALL
            .iter()
            .find_map(|phase| self.find(layer, extension, *phase))
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.global.len() + self.per_layer.values().map(Vec::len).sum::<usize>()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn candidates<'a>(&'a self, layer: &str) -> impl Iterator<Item = &'a dyn FileProcessor> + 'a {
        let own = self.per_layer.get(layer).map(Vec::as_slice).unwrap_or_default();
        own.iter()
            .chain(self.global.iter())
            .map(|r| r.processor.as_ref())
    }
}

fn insert_sorted(list: &mut Vec<Registration>, registration: Registration) {
    let at = list
        .iter()
        .position(|r| r.priority < registration.priority)
        .unwrap_or(list.len());
    list.insert(at, registration);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        name: &'static str,
        exts: Vec<String>,
        phase: Phase,
    }

    impl Fake {
        fn boxed(name: &'static str, ext: &str, phase: Phase) -> Box<dyn FileProcessor> {
            Box::new(Fake {
                name,
                exts: vec![ext.to_string()],
                phase,
            })
        }
    }

    impl FileProcessor for Fake {
        fn name(&self) -> &str {
            self.name
        }

        fn extensions(&self) -> &[String] {
            &self.exts
        }

        fn phase(&self) -> Phase {
            self.phase
        }

        fn parse(&self, _entry: &SourceEntry) -> Result<ParsedFile, ParseError> {
            Ok(ParsedFile::default())
        }

        fn generate(
            &self,
            _entry: &SourceEntry,
            _parsed: &ParsedFile,
            _ctx: &GenerateContext<'_>,
        ) -> Result<Vec<GeneratedFile>, GenerateError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn higher_priority_wins() {
        let mut reg = ProcessorRegistry::new();
        reg.register(Fake::boxed("low", "sc", Phase::Process), 0);
        reg.register(Fake::boxed("high", "sc", Phase::Process), 10);
        assert_eq!(reg.find("any", "sc", Phase::Process).unwrap().name(), "high");
    }

    #[test]
    fn equal_priority_keeps_registration_order() {
        let mut reg = ProcessorRegistry::new();
        reg.register(Fake::boxed("first", "sc", Phase::Process), 0);
        reg.register(Fake::boxed("second", "sc", Phase::Process), 0);
        assert_eq!(reg.find("any", "sc", Phase::Process).unwrap().name(), "first");
    }

    #[test]
    fn layer_processors_shadow_global_ones() {
        let mut reg = ProcessorRegistry::new();
        reg.register(Fake::boxed("global", "sc", Phase::Process), 100);
        reg.register_for_layer("app.ui", Fake::boxed("ui", "sc", Phase::Process), 0);
        assert_eq!(reg.find("app.ui", "sc", Phase::Process).unwrap().name(), "ui");
        assert_eq!(reg.find("app.core", "sc", Phase::Process).unwrap().name(), "global");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn lookup_respects_phase_and_extension() {
        let mut reg = ProcessorRegistry::new();
        reg.register(Fake::boxed("prep", "tpl", Phase::Prepare), 0);
        assert!(reg.find("any", "tpl", Phase::Process).is_none());
        assert!(reg.find("any", "sc", Phase::Prepare).is_none());
        assert_eq!(reg.find_any("any", "tpl").unwrap().name(), "prep");
    }
}
