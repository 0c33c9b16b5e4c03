//! Structural errors that abort layer-stack resolution.

use std::path::PathBuf;

/// A configuration error in the layer graph.
///
/// These are fatal: continuing would leave the stack and every index keyed
/// on it inconsistent. Recoverable problems such as a missing or unparsable
/// descriptor are reported as diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// A layer transitively extends itself.
    #[error("extends cycle: {}", .cycle.join(" -> "))]
    ExtendsCycle {
        /// The resolution path, starting and ending with the same layer.
        cycle: Vec<String>,
    },

    /// A requested or extended layer could not be found on the search path.
    #[error("layer '{name}' not found{}", referenced_suffix(.referenced_by))]
    UnresolvedLayer {
        /// The name that failed to resolve.
        name: String,
        /// The layer whose `extends` named it, if any.
        referenced_by: Option<String>,
    },

    /// A layer's model type name is already declared elsewhere.
    #[error("layer '{layer}' collides with type '{type_name}' declared in layer '{other}'")]
    NameCollision {
        /// The layer being placed.
        layer: String,
        /// The clashing qualified name.
        type_name: String,
        /// The layer that already declares it.
        other: String,
    },

    /// A compiled-only layer extends a dynamic one and cannot precede it.
    #[error("compiled-only layer '{layer}' extends dynamic layer '{base}'")]
    CompiledExtendsDynamic {
        /// The compiled-only layer.
        layer: String,
        /// Its dynamic base.
        base: String,
    },

    /// A layer directory could not be scanned.
    #[error("failed to scan layer directory {path}: {source}")]
    Io {
        /// The directory.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

fn referenced_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(by) => format!(" (extended by '{by}')"),
        None => String::new(),
    }
}
