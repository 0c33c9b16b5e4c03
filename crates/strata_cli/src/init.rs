//! `strata init`: project scaffolding.
//!
//! Creates `strata.toml`, a `layers/` search directory with one layer
//! `<name>.main`, and a sample source file in it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use strata_config::CONFIG_FILE_NAME;

/// Runs the `strata init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory.
/// Returns exit code 0 on success.
pub fn run(name: Option<String>) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{}' already exists", n).into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };
    if project_dir.join(CONFIG_FILE_NAME).exists() {
        return Err(format!("{CONFIG_FILE_NAME} already exists in {}", project_dir.display()).into());
    }

    let project_name = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("my_project");
    let prefix = package_prefix(project_name);

    eprintln!("  Creating new Strata project `{project_name}`");

    write_strata_toml(&project_dir, project_name, &prefix)?;
    let layer_dir = write_main_layer(&project_dir, &prefix)?;

    eprintln!("     Created {}", project_dir.join(CONFIG_FILE_NAME).display());
    eprintln!("     Created {}", layer_dir.display());
    Ok(0)
}

/// A package prefix derived from the project name: lowercase ASCII
/// alphanumerics, anything else dropped.
fn package_prefix(project_name: &str) -> String {
    let prefix: String = project_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match prefix.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => prefix,
        _ => format!("app{prefix}"),
    }
}

fn write_strata_toml(root: &Path, name: &str, prefix: &str) -> io::Result<()> {
    let content = format!(
        r#"[project]
name = "{name}"
layers = ["{prefix}.main"]

[paths]
search = ["layers"]
build_dir = "build"

[build]
source_extensions = ["sc"]
generated_extension = "gen"

# [toolchain]
# command = "cc"
# args = ["-o", "{{out}}", "{{files}}"]
# artifact_extension = "o"
"#
    );
    fs::write(root.join(CONFIG_FILE_NAME), content)
}

fn write_main_layer(root: &Path, prefix: &str) -> io::Result<PathBuf> {
    let dir = root.join("layers").join(prefix).join("main");
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("main.layer"),
        format!("[layer]\nname = \"{prefix}.main\"\npackage_prefix = \"{prefix}\"\n"),
    )?;
    fs::write(
        dir.join("Greeting.sc"),
        "@group samples\nGreeting: hello from a Strata layer\n",
    )?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_project_layout() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("demo");
        run(Some(project_dir.to_str().unwrap().to_string())).unwrap();

        assert!(project_dir.join(CONFIG_FILE_NAME).exists());
        assert!(project_dir.join("layers/demo/main/main.layer").exists());
        assert!(project_dir.join("layers/demo/main/Greeting.sc").exists());

        let config = strata_config::load_config(&project_dir).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.project.layers, vec!["demo.main"]);
    }

    #[test]
    fn scaffolded_layer_descriptor_parses() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("demo");
        run(Some(project_dir.to_str().unwrap().to_string())).unwrap();
        let path = project_dir.join("layers/demo/main/main.layer");
        let desc = strata_layer::parse_descriptor(&path, "demo.main").unwrap();
        assert_eq!(desc.package_prefix, "demo");
    }

    #[test]
    fn init_rejects_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let result = run(Some(tmp.path().to_str().unwrap().to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn prefix_is_sanitized() {
        assert_eq!(package_prefix("My-Shop"), "myshop");
        assert_eq!(package_prefix("42things"), "app42things");
        assert_eq!(package_prefix("---"), "app");
    }
}
