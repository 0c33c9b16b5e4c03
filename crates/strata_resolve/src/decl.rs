//! Parsed type declarations and the loader seam.

use std::path::PathBuf;

use strata_common::LayerId;
use strata_source::SourceEntry;

use crate::arena::DeclId;
use crate::compiled::CompiledId;

/// A type declaration parsed from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    /// Qualified type name.
    pub name: String,
    /// Layer whose source defined the declaration.
    pub layer: LayerId,
    /// Absolute path of the source file.
    pub source: PathBuf,
    /// Qualified names this declaration refers to.
    pub type_deps: Vec<String>,
    /// Set once the declaration went through output generation. Transformed
    /// declarations are evicted from the cache when a build pass finishes.
    pub transformed: bool,
}

impl TypeDecl {
    /// Creates an untransformed declaration.
    pub fn new(name: impl Into<String>, layer: LayerId, source: PathBuf) -> Self {
        Self {
            name: name.into(),
            layer,
            source,
            type_deps: Vec::new(),
            transformed: false,
        }
    }
}

/// The outcome of resolving a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// A source declaration from a layer in scope.
    Source(DeclId),
    /// A previously compiled artifact.
    Compiled(CompiledId),
}

/// Parses source entries into declarations on demand.
///
/// Returning `None` means the file failed to parse; the loader is expected
/// to have reported why.
pub trait DeclLoader {
    /// Parses `entry`, which sits in the layer at `position`.
    fn load(&mut self, entry: &SourceEntry, position: usize) -> Option<TypeDecl>;
}
