//! Shared foundational types used across the Strata layered build engine.
//!
//! This crate provides content hashing, interned qualified names, stable layer
//! identifiers, dotted-name helpers, and the internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod ids;
pub mod name;
pub mod result;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use ids::LayerId;
pub use name::QualifiedName;
pub use result::{InternalError, StrataResult};
