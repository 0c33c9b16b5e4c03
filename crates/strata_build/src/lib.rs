//! Dependency-tracked incremental build scheduler.
//!
//! The [`Scheduler`] walks one layer at a time, deciding per source
//! directory which files need generating or only compiling by comparing the
//! persisted [`DependencyRecord`](strata_cache::DependencyRecord) against
//! file timestamps and the current layer stack. Files are parsed and
//! generated by [`FileProcessor`]s and compiled by a [`Toolchain`].
//!
//! # Pipeline
//!
//! ```text
//! prepare: load records → diff listings → queue generate / compile-only
//!          → propagate through file deps and type groups
//! build:   parse → generate → detect inherited outputs → compile per directory
//!          → persist records and build info
//! ```

#![warn(missing_docs)]

pub mod codes;
pub mod directive;
pub mod loader;
pub mod phase;
pub mod processor;
pub mod scheduler;
pub mod state;
pub mod toolchain;

pub use directive::DirectiveProcessor;
pub use loader::ProcessorLoader;
pub use phase::{BuildStatus, PassState, Phase};
pub use processor::{
    FileProcessor, GenerateContext, GenerateError, GeneratedFile, ParseError, ParsedFile,
    ProcessorRegistry,
};
pub use scheduler::{BuildContext, Scheduler};
pub use state::{BuildState, BuildStats};
pub use toolchain::{toolchain_for, CommandToolchain, CompileOutcome, CopyToolchain, Toolchain};
