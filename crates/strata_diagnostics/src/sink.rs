//! Thread-safe diagnostic accumulator with an optional forwarding handler.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives each diagnostic as it is emitted.
///
/// Installed on a [`DiagnosticSink`] to surface messages immediately, e.g. to a
/// terminal or an IDE, instead of only after the build returns.
pub trait MessageHandler: Send + Sync {
    /// Called once per emitted diagnostic, in emission order.
    fn handle(&self, diag: &Diagnostic);
}

/// A thread-safe accumulator for diagnostics emitted during resolution and builds.
///
/// Every engine of a session shares one sink. The error count is tracked
/// atomically for fast `has_errors` checks without locking the diagnostic
/// vector.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
    handler: Option<Box<dyn MessageHandler>>,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
            handler: None,
        }
    }

    /// Creates a sink that forwards every diagnostic to `handler` as well as
    /// accumulating it.
    pub fn with_handler(handler: Box<dyn MessageHandler>) -> Self {
        Self {
            handler: Some(handler),
            ..Self::new()
        }
    }

    /// Emits a diagnostic into the sink.
    ///
    /// If the diagnostic has [`Severity::Error`], the error count is incremented atomically.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(handler) = &self.handler {
            handler.handle(&diag);
        }
        self.diagnostics.lock().push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
