//! Diagnostic codes emitted while building.

use strata_diagnostics::{Category, DiagnosticCode};

/// A source file failed to parse.
pub const E001: DiagnosticCode = DiagnosticCode::new(Category::Error, 1);

/// A processor failed to generate output for a parsed file.
pub const E002: DiagnosticCode = DiagnosticCode::new(Category::Error, 2);

/// The toolchain rejected a directory batch.
pub const E003: DiagnosticCode = DiagnosticCode::new(Category::Error, 3);

/// A type whose compiled form is loaded by a running process was rebuilt.
/// The process keeps the old model until it restarts.
pub const W001: DiagnosticCode = DiagnosticCode::new(Category::Warning, 1);

/// A source file recorded by the last build no longer exists.
pub const B001: DiagnosticCode = DiagnosticCode::new(Category::Build, 1);

/// No processor handles a file's extension; the file is skipped.
pub const B002: DiagnosticCode = DiagnosticCode::new(Category::Build, 2);

/// The previous build of a build layer was interrupted.
pub const B003: DiagnosticCode = DiagnosticCode::new(Category::Build, 3);
