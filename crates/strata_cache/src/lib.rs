//! Persisted build state for incremental builds.
//!
//! This crate stores the per-directory [`DependencyRecord`]s the scheduler
//! uses to decide what to regenerate, the per-build-layer [`BuildInfo`], and
//! checksummed binary [`TypeIndex`] files. Every read is fail-safe: a
//! missing, corrupt, or incompatible file is a cache miss that triggers a
//! full rescan, never an error.

#![warn(missing_docs)]

pub mod artifact;
pub mod build_info;
pub mod cache;
pub mod error;
pub mod hasher;
pub mod record;
pub mod type_index;

pub use artifact::ArtifactStore;
pub use build_info::BuildInfo;
pub use cache::BuildCache;
pub use error::CacheError;
pub use hasher::{DirDiff, SourceHasher};
pub use record::{millis_since_epoch, DependencyEntry, DependencyRecord, GeneratedOutput};
pub use type_index::{TypeIndex, TypeIndexEntry, TypeIndexStore};
