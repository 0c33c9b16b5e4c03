//! Parsing and validation of `strata.toml` project configuration files.
//!
//! This crate reads the project configuration file into a strongly-typed
//! [`ProjectConfig`] and merges it with command-line overrides into the
//! [`BuildOptions`] record every engine instance is created with.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod options;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use options::{resolve_options, BuildOptions, OptionOverrides, DEFAULT_RUNTIME};
pub use types::*;
