//! Build phases, per-pass states, and build results.

use std::fmt;

/// A build phase. Every layer runs [`Prepare`](Phase::Prepare) before
/// [`Process`](Phase::Process); processors declare which one they run in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Phase {
    /// Early processing whose outputs later processing may depend on.
    Prepare,
    /// Main generation and compilation.
    Process,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 2] = [Phase::Prepare, Phase::Process];

    /// Name used in dependency-record file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Process => "process",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one (layer, phase) pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PassState {
    /// Nothing done yet.
    #[default]
    NotStarted,
    /// Records loaded and work queued.
    Prepared,
    /// Generation or compilation under way.
    Started,
    /// Finished; the status is final.
    Processed,
}

/// Result of building one layer in one phase.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BuildStatus {
    /// A file failed to parse, generate, or compile.
    Error,
    /// Nothing was compiled.
    #[default]
    NoFilesToCompile,
    /// At least one artifact was compiled for the first time.
    NewCompiledFiles,
    /// Existing artifacts were recompiled.
    ChangedCompiledFiles,
}

impl BuildStatus {
    /// Returns `true` for [`BuildStatus::Error`].
    pub fn is_error(self) -> bool {
        self == BuildStatus::Error
    }

    /// Returns `true` if anything was compiled.
    pub fn compiled_anything(self) -> bool {
        matches!(
            self,
            BuildStatus::NewCompiledFiles | BuildStatus::ChangedCompiledFiles
        )
    }

    /// Combines the statuses of two passes: an error dominates, then new
    /// files, then changed files.
    pub fn merge(self, other: BuildStatus) -> BuildStatus {
        use BuildStatus::*;
        match (self, other) {
            (Error, _) | (_, Error) => Error,
            (NewCompiledFiles, _) | (_, NewCompiledFiles) => NewCompiledFiles,
            (ChangedCompiledFiles, _) | (_, ChangedCompiledFiles) => ChangedCompiledFiles,
            _ => NoFilesToCompile,
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Error => "error",
            BuildStatus::NoFilesToCompile => "up to date",
            BuildStatus::NewCompiledFiles => "new compiled files",
            BuildStatus::ChangedCompiledFiles => "changed compiled files",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_runs_first() {
        assert!(Phase::Prepare < Phase::Process);
        assert_eq!(Phase::ALL, [Phase::Prepare, Phase::Process]);
    }

    #[test]
    fn merge_precedence() {
        use BuildStatus::*;
        assert_eq!(NewCompiledFiles.merge(Error), Error);
        assert_eq!(ChangedCompiledFiles.merge(NewCompiledFiles), NewCompiledFiles);
        assert_eq!(NoFilesToCompile.merge(ChangedCompiledFiles), ChangedCompiledFiles);
        assert_eq!(NoFilesToCompile.merge(NoFilesToCompile), NoFilesToCompile);
    }

    #[test]
    fn compiled_anything() {
        assert!(BuildStatus::NewCompiledFiles.compiled_anything());
        assert!(!BuildStatus::Error.compiled_anything());
    }
}
