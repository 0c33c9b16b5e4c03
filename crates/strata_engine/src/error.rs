//! Errors that stop an engine from being set up.

use strata_common::InternalError;
use strata_layer::LayerError;

/// A fatal engine error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Layer-stack resolution failed.
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// An engine invariant was broken.
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// The configuration names no such runtime.
    #[error("unknown runtime '{0}'")]
    UnknownRuntime(String),
}
