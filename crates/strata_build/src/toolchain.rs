//! The compiler seam.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use strata_config::ToolchainConfig;
use strata_diagnostics::Diagnostic;
use strata_source::Location;
use tracing::debug;

use crate::codes::E003;

/// Result of one toolchain invocation.
#[derive(Debug, Default)]
pub struct CompileOutcome {
    /// Exit status; zero is success.
    pub status: i32,
    /// Problems the toolchain reported.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutcome {
    /// A successful outcome with no diagnostics.
    pub fn success() -> Self {
        Self::default()
    }

    /// Returns `true` if the status is zero.
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Compiles a batch of generated files.
pub trait Toolchain: Send + Sync {
    /// Compiles `files` into `output_dir`. `search_path` lists the output
    /// directories of earlier build layers followed by the current one.
    fn compile(&self, files: &[PathBuf], output_dir: &Path, search_path: &[PathBuf]) -> CompileOutcome;

    /// Extension of the artifact produced for each generated file.
    fn artifact_extension(&self) -> &str;
}

/// Runs an external command built from a [`ToolchainConfig`] template.
pub struct CommandToolchain {
    command: String,
    args: Vec<String>,
    artifact_extension: String,
}

impl CommandToolchain {
    /// Creates a toolchain running `command` with the configured argument
    /// template.
    pub fn new(command: &str, config: &ToolchainConfig) -> Self {
        Self {
            command: command.to_string(),
            args: config.args.clone(),
            artifact_extension: config.artifact_extension.clone(),
        }
    }

    /// Expands the argument template.
    pub fn expand_args(&self, files: &[PathBuf], output_dir: &Path, search_path: &[PathBuf]) -> Vec<OsString> {
        let cp = std::env::join_paths(search_path).unwrap_or_default();
        let mut out = Vec::with_capacity(self.args.len() + files.len());
        for arg in &self.args {
            match arg.as_str() {
                "{files}" => out.extend(files.iter().map(|f| f.as_os_str().to_owned())),
                "{out}" => out.push(output_dir.as_os_str().to_owned()),
                "{cp}" => out.push(cp.clone()),
                other => out.push(OsString::from(other)),
            }
        }
        out
    }
}

impl Toolchain for CommandToolchain {
    fn compile(&self, files: &[PathBuf], output_dir: &Path, search_path: &[PathBuf]) -> CompileOutcome {
        if let Err(e) = fs::create_dir_all(output_dir) {
            return failure(format!("cannot create {}: {e}", output_dir.display()), None);
        }
        let args = self.expand_args(files, output_dir, search_path);
        debug!(command = %self.command, files = files.len(), "running toolchain");
        let output = match Command::new(&self.command).args(&args).output() {
            Ok(output) => output,
            Err(e) => return failure(format!("cannot run '{}': {e}", self.command), None),
        };
        let status = output.status.code().unwrap_or(-1);
        if status == 0 {
            return CompileOutcome::success();
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut diagnostics: Vec<Diagnostic> = stderr
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Diagnostic::error(E003, l.trim().to_string()))
            .collect();
        if diagnostics.is_empty() {
            diagnostics.push(Diagnostic::error(
                E003,
                format!("'{}' exited with status {status}", self.command),
            ));
        }
        CompileOutcome {
            status,
            diagnostics,
        }
    }

    fn artifact_extension(&self) -> &str {
        &self.artifact_extension
    }
}

/// Copies each generated file into the output directory as its own artifact.
///
/// Used when no toolchain command is configured.
pub struct CopyToolchain {
    artifact_extension: String,
}

impl CopyToolchain {
    /// Creates a copying toolchain producing `<stem>.<artifact_extension>`.
    pub fn new(artifact_extension: &str) -> Self {
        Self {
            artifact_extension: artifact_extension.to_string(),
        }
    }
}

impl Toolchain for CopyToolchain {
    fn compile(&self, files: &[PathBuf], output_dir: &Path, _search_path: &[PathBuf]) -> CompileOutcome {
        if let Err(e) = fs::create_dir_all(output_dir) {
            return failure(format!("cannot create {}: {e}", output_dir.display()), None);
        }
        for file in files {
            let Some(stem) = file.file_stem() else { continue };
            let target = output_dir
                .join(stem)
                .with_extension(&self.artifact_extension);
            if let Err(e) = fs::copy(file, &target) {
                return failure(format!("cannot copy: {e}"), Some(file));
            }
        }
        CompileOutcome::success()
    }

    fn artifact_extension(&self) -> &str {
        &self.artifact_extension
    }
}

/// The toolchain a configuration asks for.
pub fn toolchain_for(config: &ToolchainConfig) -> Box<dyn Toolchain> {
    match &config.command {
        Some(command) => Box::new(CommandToolchain::new(command, config)),
        None => Box::new(CopyToolchain::new(&config.artifact_extension)),
    }
}

fn failure(message: String, file: Option<&Path>) -> CompileOutcome {
    let mut diag = Diagnostic::error(E003, message);
    if let Some(file) = file {
        diag = diag.at(Location::file(file));
    }
    CompileOutcome {
        status: -1,
        diagnostics: vec![diag],
    }
}
