//! Source files of a layer: entries, per-layer directory indexes, file stamps,
//! and display locations for diagnostics.
//!
//! This crate provides the immutable [`SourceEntry`] record, the
//! [`SrcDirIndex`] that lists every source file of one layer grouped by
//! directory, and the [`Location`] type used when reporting a problem in a file.

#![warn(missing_docs)]

pub mod entry;
pub mod index;
pub mod location;
pub mod stamp;

pub use entry::SourceEntry;
pub use index::SrcDirIndex;
pub use location::Location;
pub use stamp::{is_newer, modified_time};
