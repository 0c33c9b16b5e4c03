//! State shared by every engine of a session.

use std::path::PathBuf;
use std::sync::Arc;

use strata_common::Interner;
use strata_config::BuildOptions;
use strata_diagnostics::DiagnosticSink;

/// Passed explicitly to every engine instead of living in globals.
pub struct SharedContext {
    /// Interned type and package names.
    pub interner: Arc<Interner>,
    /// Where every engine reports problems.
    pub sink: DiagnosticSink,
    /// Session options.
    pub options: BuildOptions,
}

impl SharedContext {
    /// Creates a context with a fresh interner.
    pub fn new(options: BuildOptions, sink: DiagnosticSink) -> Self {
        Self {
            interner: Arc::new(Interner::new()),
            sink,
            options,
        }
    }

    /// The shared package-repository store, if configured.
    pub fn package_repository(&self) -> Option<&PathBuf> {
        self.options.package_repository.as_ref()
    }
}
