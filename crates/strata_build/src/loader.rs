//! Declaration loading through the processor registry.

use std::collections::HashMap;
use std::path::PathBuf;

use strata_diagnostics::{Diagnostic, DiagnosticSink};
use strata_layer::LayerStack;
use strata_resolve::{DeclLoader, TypeDecl};
use strata_source::{Location, SourceEntry};
use tracing::debug;

use crate::codes::{B002, E001};
use crate::processor::{ParseError, ParsedFile, ProcessorRegistry};

/// A [`DeclLoader`] that parses files with the registered processors.
///
/// The scheduler primes the loader with files it has just parsed so the
/// resolution cache picks up those results without a second parse.
pub struct ProcessorLoader<'a> {
    registry: &'a ProcessorRegistry,
    stack: &'a LayerStack,
    sink: &'a DiagnosticSink,
    primed: HashMap<PathBuf, ParsedFile>,
}

impl<'a> ProcessorLoader<'a> {
    /// Creates a loader reporting parse errors to `sink`.
    pub fn new(registry: &'a ProcessorRegistry, stack: &'a LayerStack, sink: &'a DiagnosticSink) -> Self {
        Self {
            registry,
            stack,
            sink,
            primed: HashMap::new(),
        }
    }

    /// Supplies an already-parsed result for `path`.
    pub fn prime(&mut self, path: PathBuf, parsed: ParsedFile) {
        self.primed.insert(path, parsed);
    }

    fn parse(&self, entry: &SourceEntry) -> Option<ParsedFile> {
        let layer = self.stack.get(entry.layer).map(|l| l.name.as_str()).unwrap_or_default();
        let Some(processor) = self.registry.find_any(layer, entry.extension()) else {
            self.sink.emit(
                Diagnostic::note(B002, format!("no processor for '.{}' files", entry.extension()))
                    .at(Location::file(&entry.abs_path)),
            );
            return None;
        };
        match processor.parse(entry) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                report_parse_error(self.sink, &err);
                None
            }
        }
    }
}

impl DeclLoader for ProcessorLoader<'_> {
    fn load(&mut self, entry: &SourceEntry, position: usize) -> Option<TypeDecl> {
        let parsed = match self.primed.remove(&entry.abs_path) {
            Some(parsed) => parsed,
            None => {
                debug!(path = %entry.abs_path.display(), position, "parsing on first lookup");
                self.parse(entry)?
            }
        };
        let mut decl = TypeDecl::new(entry.type_name.as_str(), entry.layer, entry.abs_path.clone());
        decl.type_deps = parsed.type_deps;
        Some(decl)
    }
}

/// Emits a parse error into `sink`.
pub(crate) fn report_parse_error(sink: &DiagnosticSink, err: &ParseError) {
    let location = match err.line {
        Some(line) => Location::line(&err.path, line),
        None => Location::file(&err.path),
    };
    sink.emit(Diagnostic::error(E001, err.message.clone()).at(location));
}
