//! Per-pass build bookkeeping.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::phase::{BuildStatus, PassState};

/// The state of one (layer, phase) pass.
#[derive(Debug, Default, Clone)]
pub struct BuildState {
    /// Where the pass is in its lifecycle.
    pub pass: PassState,
    /// Status so far; final once `pass` is [`PassState::Processed`].
    pub status: BuildStatus,
    /// Source files queued for generation.
    pub to_generate: BTreeSet<PathBuf>,
    /// Source files whose outputs are queued for compilation only.
    pub to_compile: BTreeSet<PathBuf>,
    /// Source files that failed to parse, generate, or compile.
    pub errors: BTreeSet<PathBuf>,
    /// Source directories visited, relative to the layer root.
    pub walked_dirs: Vec<PathBuf>,
}

impl BuildState {
    /// Returns `true` once the pass has begun executing. Re-entering such a
    /// pass returns the stored status instead of doing work again.
    pub fn is_started(&self) -> bool {
        matches!(self.pass, PassState::Started | PassState::Processed)
    }
}

/// Work counters, accumulated until [`reset`](Self::reset).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    /// Source files parsed.
    pub parsed: Vec<PathBuf>,
    /// Source files that went through generation.
    pub generated: Vec<PathBuf>,
    /// Generated files submitted to the toolchain.
    pub compiled: Vec<PathBuf>,
    /// Generated files recorded as inherited from an earlier build layer.
    pub inherited: Vec<PathBuf>,
    /// Toolchain invocations.
    pub toolchain_runs: usize,
    /// Times the pass started over after a lower build layer produced new
    /// compiled files.
    pub restarts: usize,
}

impl BuildStats {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if nothing was generated or compiled.
    pub fn is_noop(&self) -> bool {
        self.generated.is_empty() && self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_states() {
        let mut s = BuildState::default();
        assert!(!s.is_started());
        s.pass = PassState::Prepared;
        assert!(!s.is_started());
        s.pass = PassState::Started;
        assert!(s.is_started());
        s.pass = PassState::Processed;
        assert!(s.is_started());
    }

    #[test]
    fn reset_clears_counters() {
        let mut stats = BuildStats {
            generated: vec![PathBuf::from("a")],
            toolchain_runs: 2,
            ..BuildStats::default()
        };
        assert!(!stats.is_noop());
        stats.reset();
        assert!(stats.is_noop());
        assert_eq!(stats.toolchain_runs, 0);
    }
}
