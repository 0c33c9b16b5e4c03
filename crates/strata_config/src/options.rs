//! The build-options record: configuration merged with command-line overrides.

use crate::types::{ProjectConfig, ToolchainConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the runtime created when the configuration defines none.
pub const DEFAULT_RUNTIME: &str = "default";

/// Everything an engine needs to resolve and build a layer stack.
///
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Ignore persisted records and regenerate everything.
    pub force_full_rebuild: bool,
    /// Generate but never invoke the toolchain.
    pub skip_compile: bool,
    /// Treat requested layers as dynamic unless they are compiled-only.
    pub dynamic_by_default: bool,
    /// Directories searched for layer descriptors, in order.
    pub layer_search_path: Vec<PathBuf>,
    /// Root of all build output.
    pub build_dir: PathBuf,
    /// Shared store of prebuilt packages, if any.
    pub package_repository: Option<PathBuf>,
    /// 0 = quiet, 1 = normal, 2+ = verbose.
    pub verbosity: u8,
    /// When set, only these source files are generated.
    pub files: Option<Vec<PathBuf>>,
    /// Restart the top-level build after an intermediate build layer
    /// produces new compiled files.
    pub build_all_per_layer: bool,
    /// Lock waits longer than this are logged.
    pub lock_warn: Duration,
    /// Extensions handled by the default directive processor.
    pub source_extensions: Vec<String>,
    /// Extension given to generated files.
    pub generated_extension: String,
    /// The external compiler.
    pub toolchain: ToolchainConfig,
    /// Runtime name to the runtimes it depends on.
    pub runtimes: BTreeMap<String, Vec<String>>,
    /// Dotted names of the layers to build.
    pub layers: Vec<String>,
}

impl BuildOptions {
    /// Options for a project rooted at `root` with no configuration file.
    ///
    /// Uses `<root>/layers` as the only search directory and `<root>/build`
    /// as the build directory.
    pub fn for_root(root: &Path) -> Self {
        Self {
            force_full_rebuild: false,
            skip_compile: false,
            dynamic_by_default: false,
            layer_search_path: vec![root.join("layers")],
            build_dir: root.join("build"),
            package_repository: None,
            verbosity: 1,
            files: None,
            build_all_per_layer: false,
            lock_warn: Duration::from_millis(1000),
            source_extensions: vec!["sc".to_string()],
            generated_extension: "gen".to_string(),
            toolchain: ToolchainConfig::default(),
            runtimes: BTreeMap::from([(DEFAULT_RUNTIME.to_string(), Vec::new())]),
            layers: Vec::new(),
        }
    }

    /// Runtime names in dependency order: every runtime follows the runtimes
    /// it depends on, ties broken by name.
    pub fn runtime_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let mut remaining: Vec<&String> = self.runtimes.keys().collect();
        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|name| {
                let ready = self.runtimes[*name].iter().all(|d| order.contains(d));
                if ready {
                    order.push((*name).clone());
                }
                !ready
            });
            if remaining.len() == before {
                // cycles are rejected at load time; keep any leftovers in name order
                order.extend(remaining.drain(..).cloned());
            }
        }
        order
    }

    /// Build root of one runtime. The first runtime in build order uses
    /// `build_dir` itself; every other runtime gets its own subdirectory.
    pub fn build_dir_for(&self, runtime: &str) -> PathBuf {
        if self.runtime_order().first().map(String::as_str) == Some(runtime) {
            self.build_dir.clone()
        } else {
            self.build_dir.join("runtimes").join(runtime)
        }
    }
}

/// Command-line values that take precedence over `strata.toml`.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    /// Requested layers; replaces `project.layers` when non-empty.
    pub layers: Vec<String>,
    /// Force a full rebuild.
    pub force_full_rebuild: bool,
    /// Skip the toolchain.
    pub skip_compile: bool,
    /// Treat requested layers as dynamic.
    pub dynamic: bool,
    /// Extra search directories, searched before the configured ones.
    pub search_path: Vec<PathBuf>,
    /// Replacement build directory.
    pub build_dir: Option<PathBuf>,
    /// Restrict generation to these files.
    pub files: Vec<PathBuf>,
    /// CLI verbosity.
    pub verbosity: u8,
}

/// Merges a project configuration with command-line overrides.
///
/// Command-line values win. Relative paths from either source are resolved
/// against the project root.
pub fn resolve_options(
    config: &ProjectConfig,
    root: &Path,
    overrides: &OptionOverrides,
) -> BuildOptions {
    let absolute = |p: &Path| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            root.join(p)
        }
    };

    let mut search: Vec<PathBuf> = overrides.search_path.iter().map(|p| absolute(p)).collect();
    search.extend(config.paths.search.iter().map(|p| absolute(Path::new(p))));

    let runtimes: BTreeMap<String, Vec<String>> = if config.runtimes.is_empty() {
        BTreeMap::from([(DEFAULT_RUNTIME.to_string(), Vec::new())])
    } else {
        config
            .runtimes
            .iter()
            .map(|(name, rt)| (name.clone(), rt.depends_on.clone()))
            .collect()
    };

    BuildOptions {
        force_full_rebuild: overrides.force_full_rebuild,
        skip_compile: overrides.skip_compile,
        dynamic_by_default: overrides.dynamic || config.build.dynamic_by_default,
        layer_search_path: search,
        build_dir: overrides
            .build_dir
            .as_deref()
            .map(absolute)
            .unwrap_or_else(|| absolute(Path::new(&config.paths.build_dir))),
        package_repository: config
            .paths
            .package_repository
            .as_deref()
            .map(|p| absolute(Path::new(p))),
        verbosity: overrides.verbosity,
        files: if overrides.files.is_empty() {
            None
        } else {
            Some(overrides.files.iter().map(|p| absolute(p)).collect())
        },
        build_all_per_layer: config.build.build_all_per_layer,
        lock_warn: Duration::from_millis(config.build.lock_warn_ms),
        source_extensions: config.build.source_extensions.clone(),
        generated_extension: config.build.generated_extension.clone(),
        toolchain: config.toolchain.clone(),
        runtimes,
        layers: if overrides.layers.is_empty() {
            config.project.layers.clone()
        } else {
            overrides.layers.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    fn config() -> ProjectConfig {
        load_config_from_str(
            r#"
[project]
name = "demo"
layers = ["app.main"]

[paths]
search = ["layers"]
build_dir = "build"

[runtimes.js]
depends_on = ["jvm"]

[runtimes.jvm]
"#,
        )
        .unwrap()
    }

    #[test]
    fn config_values_made_absolute() {
        let opts = resolve_options(&config(), Path::new("/proj"), &OptionOverrides::default());
        assert_eq!(opts.layer_search_path, vec![PathBuf::from("/proj/layers")]);
        assert_eq!(opts.build_dir, PathBuf::from("/proj/build"));
        assert_eq!(opts.layers, vec!["app.main"]);
        assert!(opts.files.is_none());
    }

    #[test]
    fn overrides_win() {
        let overrides = OptionOverrides {
            layers: vec!["app.tools".to_string()],
            force_full_rebuild: true,
            dynamic: true,
            search_path: vec![PathBuf::from("extra")],
            build_dir: Some(PathBuf::from("/tmp/out")),
            files: vec![PathBuf::from("layers/app/main/Main.sc")],
            ..OptionOverrides::default()
        };
        let opts = resolve_options(&config(), Path::new("/proj"), &overrides);
        assert!(opts.force_full_rebuild);
        assert!(opts.dynamic_by_default);
        assert_eq!(opts.layers, vec!["app.tools"]);
        assert_eq!(opts.layer_search_path[0], PathBuf::from("/proj/extra"));
        assert_eq!(opts.build_dir, PathBuf::from("/tmp/out"));
        assert_eq!(
            opts.files,
            Some(vec![PathBuf::from("/proj/layers/app/main/Main.sc")])
        );
    }

    #[test]
    fn runtime_order_follows_dependencies() {
        let opts = resolve_options(&config(), Path::new("/proj"), &OptionOverrides::default());
        assert_eq!(opts.runtime_order(), vec!["jvm", "js"]);
    }

    #[test]
    fn default_runtime_when_none_configured() {
        let opts = BuildOptions::for_root(Path::new("/p"));
        assert_eq!(opts.runtime_order(), vec![DEFAULT_RUNTIME]);
    }

    #[test]
    fn later_runtimes_build_into_subdirectories() {
        let opts = resolve_options(&config(), Path::new("/proj"), &OptionOverrides::default());
        assert_eq!(opts.build_dir_for("jvm"), PathBuf::from("/proj/build"));
        assert_eq!(opts.build_dir_for("js"), PathBuf::from("/proj/build/runtimes/js"));
    }
}
