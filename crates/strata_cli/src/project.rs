//! Project discovery and session setup shared by every command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_config::{load_config, resolve_options, BuildOptions, OptionOverrides, CONFIG_FILE_NAME};
use strata_diagnostics::DiagnosticSink;
use strata_engine::{Coordinator, EngineLock, SharedContext};

use crate::GlobalArgs;

/// An opened project: its name and the coordinator behind the engine lock.
pub struct Session {
    /// `project.name` from `strata.toml`.
    pub name: String,
    /// Shared context of every peer engine.
    pub ctx: Arc<SharedContext>,
    /// The peers, one per runtime.
    pub coordinator: EngineLock<Coordinator>,
}

/// Walks up from `start` looking for a directory containing `strata.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Finds the project root.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `strata.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Loads the configuration and merges it with `overrides`. Returns the
/// project name and the build options.
pub fn load_options(
    global: &GlobalArgs,
    overrides: OptionOverrides,
) -> Result<(String, BuildOptions), Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    tracing::debug!(root = %root.display(), "loading project configuration");
    let config = load_config(&root)?;
    let overrides = OptionOverrides {
        verbosity: global.verbosity,
        ..overrides
    };
    let options = resolve_options(&config, &root, &overrides);
    Ok((config.project.name, options))
}

/// Creates the peer engines and resolves the requested layers in each.
pub fn open(
    name: String,
    options: BuildOptions,
    sink: DiagnosticSink,
) -> Result<Session, Box<dyn std::error::Error>> {
    let lock_warn = options.lock_warn;
    let layers = options.layers.clone();
    let ctx = Arc::new(SharedContext::new(options, sink));
    let mut coordinator = Coordinator::new(Arc::clone(&ctx));
    coordinator.init(&layers)?;
    Ok(Session {
        name,
        ctx,
        coordinator: EngineLock::new(coordinator, lock_warn),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn global(config: Option<&Path>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbosity: 0,
            color: false,
            config: config.map(|p| p.to_str().unwrap().to_string()),
        }
    }

    #[test]
    fn resolve_project_root_from_config_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[project]\nname = \"t\"\nlayers = [\"app.main\"]\n").unwrap();
        assert_eq!(resolve_project_root(&global(Some(&config_path))).unwrap(), tmp.path());
    }

    #[test]
    fn resolve_project_root_from_config_dir() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(resolve_project_root(&global(Some(tmp.path()))).unwrap(), tmp.path());
    }

    #[test]
    fn find_project_root_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = tmp.path().join("layers/app/main");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn load_options_applies_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[project]\nname = \"demo\"\nlayers = [\"app.main\"]\n",
        )
        .unwrap();
        let overrides = OptionOverrides {
            force_full_rebuild: true,
            ..OptionOverrides::default()
        };
        let (name, options) = load_options(&global(Some(tmp.path())), overrides).unwrap();
        assert_eq!(name, "demo");
        assert!(options.force_full_rebuild);
        assert_eq!(options.layers, vec!["app.main"]);
        assert_eq!(options.build_dir, tmp.path().join("build"));
    }
}
