//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the project configuration file at the project root.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Loads and validates a `strata.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `strata.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and the runtime dependency graph.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.layers.is_empty() {
        return Err(ConfigError::MissingField("project.layers".to_string()));
    }
    if config.build.source_extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "build.source_extensions must not be empty".to_string(),
        ));
    }
    for runtime in config.runtimes.values() {
        for dep in &runtime.depends_on {
            if !config.runtimes.contains_key(dep) {
                return Err(ConfigError::UnknownRuntime(dep.clone()));
            }
        }
    }
    if let Some(name) = find_runtime_cycle(config) {
        return Err(ConfigError::ValidationError(format!(
            "runtime '{name}' depends on itself"
        )));
    }
    Ok(())
}

fn find_runtime_cycle(config: &ProjectConfig) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        config: &'a ProjectConfig,
        marks: &mut BTreeMap<&'a str, Mark>,
    ) -> bool {
        match marks.get(name) {
            Some(Mark::Visiting) => return true,
            Some(Mark::Done) => return false,
            None => {}
        }
        marks.insert(name, Mark::Visiting);
        if let Some(rt) = config.runtimes.get(name) {
            for dep in &rt.depends_on {
                if visit(dep, config, marks) {
                    return true;
                }
            }
        }
        marks.insert(name, Mark::Done);
        false
    }

    let mut marks = BTreeMap::new();
    for name in config.runtimes.keys() {
        if visit(name, config, &mut marks) {
            return Some(name.clone());
        }
    }
    None
}
