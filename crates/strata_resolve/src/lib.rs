//! Type resolution for the Strata engine.
//!
//! Resolves qualified type names to the declaration in the highest layer at
//! or below a reference position. Declarations are parsed lazily on first
//! request and memoized in a [`TypeCache`]; after a full build, names with no
//! source in scope can fall back to compiled artifacts recorded in a
//! [`CompiledIndex`]. A [`NameIndex`] keeps the per-package override chains
//! used by tooling.

#![warn(missing_docs)]

pub mod arena;
pub mod cache;
pub mod compiled;
pub mod decl;
pub mod name_index;

pub use arena::{Arena, DeclId};
pub use cache::{CacheStats, TypeCache};
pub use compiled::{CompiledArtifact, CompiledId, CompiledIndex};
pub use decl::{DeclLoader, Resolved, TypeDecl};
pub use name_index::{ArtifactRef, NameIndex, NameSlot};
