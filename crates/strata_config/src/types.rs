//! Configuration types deserialized from `strata.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// The top-level project configuration parsed from `strata.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata and the requested layers.
    pub project: ProjectMeta,
    /// Search path, build directory, and package repository locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Build scheduling settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// The external compiler invoked on generated files.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Named runtimes; one engine is created per runtime.
    #[serde(default)]
    pub runtimes: BTreeMap<String, RuntimeConfig>,
}

/// Core project metadata required in every `strata.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Dotted names of the layers to build, in request order.
    #[serde(default)]
    pub layers: Vec<String>,
}

/// Filesystem locations, relative to the project root.
#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    /// Directories searched for layer descriptors, in order.
    #[serde(default = "default_search")]
    pub search: Vec<String>,
    /// Root of all build output.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    /// Shared store of prebuilt packages, if any.
    #[serde(default)]
    pub package_repository: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            search: default_search(),
            build_dir: default_build_dir(),
            package_repository: None,
        }
    }
}

fn default_search() -> Vec<String> {
    vec!["layers".to_string()]
}

fn default_build_dir() -> String {
    "build".to_string()
}

/// Build scheduling settings.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Treat every requested layer as dynamic unless it is compiled-only.
    #[serde(default)]
    pub dynamic_by_default: bool,
    /// Restart the top-level build after any intermediate build layer
    /// produces new compiled files.
    #[serde(default)]
    pub build_all_per_layer: bool,
    /// Lock waits longer than this many milliseconds are logged.
    #[serde(default = "default_lock_warn_ms")]
    pub lock_warn_ms: u64,
    /// Extensions handled by the default directive processor.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
    /// Extension given to generated files.
    #[serde(default = "default_generated_extension")]
    pub generated_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dynamic_by_default: false,
            build_all_per_layer: false,
            lock_warn_ms: default_lock_warn_ms(),
            source_extensions: default_source_extensions(),
            generated_extension: default_generated_extension(),
        }
    }
}

fn default_lock_warn_ms() -> u64 {
    1000
}

fn default_source_extensions() -> Vec<String> {
    vec!["sc".to_string()]
}

fn default_generated_extension() -> String {
    "gen".to_string()
}

/// The external compiler invoked on each directory's generated files.
///
/// `args` may contain the placeholders `{out}` (output directory), `{cp}`
/// (search path joined with the platform separator), and `{files}` (expands
/// to one argument per file). Without a `command`, generated files are
/// copied to the output directory as their own artifacts.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainConfig {
    /// The executable to run.
    #[serde(default)]
    pub command: Option<String>,
    /// Argument template.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Extension of the compiled artifact produced for each generated file.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: default_args(),
            artifact_extension: default_artifact_extension(),
        }
    }
}

fn default_args() -> Vec<String> {
    vec!["--out".to_string(), "{out}".to_string(), "{files}".to_string()]
}

fn default_artifact_extension() -> String {
    "out".to_string()
}

/// Settings for one runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Runtimes whose same-named build layers must be built first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}
