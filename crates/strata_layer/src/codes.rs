//! Diagnostic codes for layer-stack resolution.
//!
//! Codes `L001`--`L004` are emitted into the diagnostic sink. Structural
//! failures (cycles, unresolvable names) are returned as [`LayerError`](crate::LayerError)
//! instead.

use strata_diagnostics::{Category, DiagnosticCode};

/// No descriptor was found for a layer name on the search path.
pub const L001: DiagnosticCode = DiagnosticCode::new(Category::Layer, 1);

/// A descriptor exists but could not be parsed; a stub layer stands in for it.
pub const L002: DiagnosticCode = DiagnosticCode::new(Category::Layer, 2);

/// A layer is disabled and was moved to the inactive list.
pub const L003: DiagnosticCode = DiagnosticCode::new(Category::Layer, 3);

/// A layer extends a disabled layer; the base is ignored.
pub const L004: DiagnosticCode = DiagnosticCode::new(Category::Layer, 4);
