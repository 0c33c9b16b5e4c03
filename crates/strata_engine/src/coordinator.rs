//! One engine per runtime, built in dependency order.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_build::BuildStatus;
use strata_common::StrataResult;
use tracing::{debug, info, warn};

use crate::context::SharedContext;
use crate::engine::Engine;
use crate::error::EngineError;

/// Keeps a peer engine per runtime.
///
/// Before a peer builds a build layer, the coordinator makes sure the
/// peer's own earlier build layers and the layer of the same name in every
/// runtime it depends on are built. Repeated requests are cheap: a layer
/// already built in the current pass returns its stored status.
pub struct Coordinator {
    ctx: Arc<SharedContext>,
    order: Vec<String>,
    peers: BTreeMap<String, Engine>,
}

impl Coordinator {
    /// Creates one default engine per configured runtime.
    pub fn new(ctx: Arc<SharedContext>) -> Self {
        let order = ctx.options.runtime_order();
        let peers = order
            .iter()
            .map(|runtime| (runtime.clone(), Engine::new(runtime, Arc::clone(&ctx))))
            .collect();
        Self { ctx, order, peers }
    }

    /// Creates a coordinator over prepared engines. Runtimes without an
    /// engine are skipped.
    pub fn with_engines(ctx: Arc<SharedContext>, engines: Vec<Engine>) -> Self {
        let mut peers: BTreeMap<String, Engine> = engines
            .into_iter()
            .map(|e| (e.runtime().to_string(), e))
            .collect();
        let order: Vec<String> = ctx
            .options
            .runtime_order()
            .into_iter()
            .filter(|r| peers.contains_key(r))
            .collect();
        peers.retain(|r, _| order.contains(r));
        Self { ctx, order, peers }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<SharedContext> {
        &self.ctx
    }

    /// Runtime names in build order.
    pub fn runtimes(&self) -> &[String] {
        &self.order
    }

    /// The main engine: the first runtime in build order.
    pub fn main(&self) -> Option<&Engine> {
        self.order.first().and_then(|r| self.peers.get(r))
    }

    /// Mutable access to the main engine.
    pub fn main_mut(&mut self) -> Option<&mut Engine> {
        let runtime = self.order.first()?;
        self.peers.get_mut(runtime)
    }

    /// The engine for `runtime`.
    pub fn engine(&self, runtime: &str) -> Option<&Engine> {
        self.peers.get(runtime)
    }

    /// Mutable access to the engine for `runtime`.
    pub fn engine_mut(&mut self, runtime: &str) -> Option<&mut Engine> {
        self.peers.get_mut(runtime)
    }

    /// Resolves the requested layers in every peer.
    pub fn init(&mut self, names: &[String]) -> Result<(), EngineError> {
        for runtime in &self.order {
            if let Some(peer) = self.peers.get_mut(runtime) {
                peer.init(names)?;
            }
        }
        Ok(())
    }

    /// Adds layers discovered after start-up to every peer.
    pub fn add_layers(&mut self, names: &[String]) -> Result<(), EngineError> {
        for runtime in &self.order {
            if let Some(peer) = self.peers.get_mut(runtime) {
                peer.add_layers(names)?;
            }
        }
        Ok(())
    }

    /// Returns `true` if any peer failed. After [`build_all`](Self::build_all)
    /// the main engine carries the same flag.
    pub fn has_errors(&self) -> bool {
        self.peers.values().any(Engine::has_errors)
    }

    /// Makes the next pass of every peer a full rebuild.
    pub fn rebuild_all(&mut self) {
        for peer in self.peers.values_mut() {
            peer.rebuild_all();
        }
    }

    /// Builds every peer. A failing peer does not stop the others; its
    /// failure shows in the returned status and in the main engine's error
    /// flag.
    pub fn build_all(&mut self) -> StrataResult<BuildStatus> {
        for peer in self.peers.values_mut() {
            peer.begin_pass();
        }
        let mut status = BuildStatus::NoFilesToCompile;
        for runtime in self.order.clone() {
            let runtime_status = self.build_runtime(&runtime)?;
            if runtime_status.is_error() {
                warn!(%runtime, "runtime failed to build");
            }
            status = status.merge(runtime_status);
        }
        for peer in self.peers.values_mut() {
            peer.finish_pass();
        }
        if self.peers.values().any(Engine::has_errors) {
            if let Some(main) = self.main_mut() {
                main.record_peer_failure();
            }
        }
        info!(%status, runtimes = self.order.len(), "build finished");
        Ok(status)
    }

    fn build_runtime(&mut self, runtime: &str) -> StrataResult<BuildStatus> {
        let Some(peer) = self.peers.get(runtime) else {
            return Ok(BuildStatus::NoFilesToCompile);
        };
        let layers: Vec<String> = peer.stack().layers().map(|l| l.name.clone()).collect();
        let mut status = BuildStatus::NoFilesToCompile;
        for name in layers {
            let layer_status = self.ensure_built(runtime, &name)?;
            status = status.merge(layer_status);
            let restart = self.peers.get(runtime).is_some_and(|peer| {
                peer.layer_id(&name)
                    .is_some_and(|id| peer.needs_restart(id, layer_status))
            });
            if restart {
                info!(%runtime, layer = %name, "new compiled files in a lower build layer; restarting");
                if let Some(peer) = self.peers.get_mut(runtime) {
                    peer.scheduler_mut().restart_pass();
                }
                return Ok(status.merge(self.build_runtime(runtime)?));
            }
        }
        Ok(status)
    }

    /// Builds `layer` in `runtime` after its prerequisites: the same layer
    /// in every runtime this one depends on, then every layer below it in
    /// this peer, lowest first.
    ///
    /// Returns the status of `layer` itself, or `Error` if a prerequisite
    /// failed.
    pub fn ensure_built(&mut self, runtime: &str, layer: &str) -> StrataResult<BuildStatus> {
        let built = self
            .peers
            .get(runtime)
            .and_then(|peer| peer.built_status(peer.layer_id(layer)?));
        if let Some(status) = built {
            return Ok(status);
        }
        let mut failed = false;
        let depends_on = self.ctx.options.runtimes.get(runtime).cloned().unwrap_or_default();
        for dep in depends_on {
            let has_layer = self.peers.get(&dep).is_some_and(|p| p.layer_id(layer).is_some());
            if has_layer {
                debug!(%runtime, %dep, %layer, "building prerequisite runtime layer");
                failed |= self.ensure_built(&dep, layer)?.is_error();
            }
        }

        let Some(peer) = self.peers.get(runtime) else {
            return Ok(failed_status(failed));
        };
        let Some(id) = peer.layer_id(layer) else {
            return Ok(failed_status(failed));
        };
        let position = peer.stack().get(id).map_or(0, |l| l.position);
        let earlier: Vec<String> = peer
            .stack()
            .layers()
            .filter(|l| l.position < position)
            .map(|l| l.name.clone())
            .collect();
        for name in earlier {
            failed |= self.ensure_built(runtime, &name)?.is_error();
        }

        let status = match self.peers.get_mut(runtime) {
            Some(peer) => peer.build_layer(id)?,
            None => BuildStatus::NoFilesToCompile,
        };
        Ok(if failed { BuildStatus::Error } else { status })
    }
}

fn failed_status(failed: bool) -> BuildStatus {
    if failed {
        BuildStatus::Error
    } else {
        BuildStatus::NoFilesToCompile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use strata_config::BuildOptions;
    use strata_diagnostics::DiagnosticSink;

    fn layer(root: &Path, name: &str, body: &str, files: &[(&str, &str)]) {
        let dir = root.join("layers").join(name.replace('.', "/"));
        fs::create_dir_all(&dir).unwrap();
        let base = name.rsplit('.').next().unwrap();
        fs::write(dir.join(format!("{base}.layer")), format!("[layer]\nname = \"{name}\"\n{body}")).unwrap();
        for (rel, text) in files {
            fs::write(dir.join(rel), text).unwrap();
        }
    }

    fn coordinator(root: &Path) -> Coordinator {
        let mut options = BuildOptions::for_root(root);
        options.runtimes = BTreeMap::from([
            ("default".to_string(), Vec::new()),
            ("server".to_string(), vec!["default".to_string()]),
        ]);
        Coordinator::new(Arc::new(SharedContext::new(options, DiagnosticSink::new())))
    }

    #[test]
    fn peers_get_their_runtime_layers() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.core", "package_prefix = \"app\"\n", &[("A.sc", "a\n")]);
        layer(
            tmp.path(),
            "app.server",
            "extends = [\"app.core\"]\nruntimes = [\"server\"]\n",
            &[("S.sc", "s\n")],
        );
        let mut c = coordinator(tmp.path());
        c.init(&["app.server".to_string()]).unwrap();
        assert_eq!(c.runtimes(), ["default", "server"]);
        assert_eq!(c.engine("default").unwrap().stack().len(), 1);
        assert_eq!(c.engine("server").unwrap().stack().len(), 2);
        assert_eq!(c.main().unwrap().runtime(), "default");
    }

    #[test]
    fn build_all_builds_every_peer() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.core", "package_prefix = \"app\"\n", &[("A.sc", "a\n")]);
        let mut c = coordinator(tmp.path());
        c.init(&["app.core".to_string()]).unwrap();
        let status = c.build_all().unwrap();
        assert!(!status.is_error());
        assert!(!c.has_errors());
        for runtime in ["default", "server"] {
            assert_eq!(c.engine(runtime).unwrap().stats().generated.len(), 1, "{runtime}");
        }
    }

    #[test]
    fn failing_peer_is_reported_and_others_continue() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.core", "package_prefix = \"app\"\n", &[("A.sc", "a\n")]);
        layer(
            tmp.path(),
            "app.server",
            "extends = [\"app.core\"]\nruntimes = [\"server\"]\n",
            &[("Bad.sc", "@error nope\n")],
        );
        let mut c = coordinator(tmp.path());
        c.init(&["app.server".to_string()]).unwrap();
        assert_eq!(c.build_all().unwrap(), BuildStatus::Error);
        assert!(c.has_errors());
        assert!(c.engine("server").unwrap().has_errors());
        assert!(c.main().unwrap().has_errors());
        assert!(!c.engine("default").unwrap().stats().compiled.is_empty());
        assert_eq!(c.engine("default").unwrap().stats().generated.len(), 1);
    }

    #[test]
    fn ensure_built_is_idempotent_within_a_pass() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.core", "package_prefix = \"app\"\n", &[("A.sc", "a\n")]);
        let mut c = coordinator(tmp.path());
        c.init(&["app.core".to_string()]).unwrap();
        for peer in c.peers.values_mut() {
            peer.begin_pass();
        }
        let first = c.ensure_built("server", "app.core").unwrap();
        let again = c.ensure_built("server", "app.core").unwrap();
        assert_eq!(first, again);
        assert_eq!(c.engine("default").unwrap().stats().generated.len(), 1);
        assert_eq!(c.engine("server").unwrap().stats().generated.len(), 1);
    }

    #[test]
    fn main_engine_stays_clean_when_every_peer_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.core", "package_prefix = \"app\"\n", &[("A.sc", "a\n")]);
        let mut c = coordinator(tmp.path());
        c.init(&["app.core".to_string()]).unwrap();
        c.build_all().unwrap();
        assert!(!c.main().unwrap().has_errors());
    }

    #[test]
    fn ensure_built_builds_every_lower_layer_first() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.a", "package_prefix = \"app\"\n", &[("A.sc", "a\n")]);
        layer(
            tmp.path(),
            "app.b",
            "extends = [\"app.a\"]\nbuild_separate = true\n",
            &[("B.sc", "b\n")],
        );
        layer(tmp.path(), "app.c", "extends = [\"app.b\"]\n", &[("C.sc", "c\n")]);
        let mut c = coordinator(tmp.path());
        c.init(&["app.c".to_string()]).unwrap();
        for peer in c.peers.values_mut() {
            peer.begin_pass();
        }
        assert!(!c.ensure_built("default", "app.c").unwrap().is_error());
        let mut generated: Vec<String> = c
            .engine("default")
            .unwrap()
            .stats()
            .generated
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        generated.sort();
        assert_eq!(generated, vec!["A.sc", "B.sc", "C.sc"]);
    }

    #[test]
    fn ensure_built_reports_a_failed_lower_layer() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.a", "package_prefix = \"app\"\n", &[("A.sc", "@error nope\n")]);
        layer(tmp.path(), "app.b", "extends = [\"app.a\"]\n", &[("B.sc", "b\n")]);
        let mut c = coordinator(tmp.path());
        c.init(&["app.b".to_string()]).unwrap();
        for peer in c.peers.values_mut() {
            peer.begin_pass();
        }
        assert_eq!(c.ensure_built("default", "app.b").unwrap(), BuildStatus::Error);
    }

    #[test]
    fn peer_restarts_after_new_compiled_files_in_a_lower_build_layer() {
        let tmp = tempfile::tempdir().unwrap();
        layer(tmp.path(), "app.base", "package_prefix = \"app\"\nbuild_separate = true\n", &[("A.sc", "a\n")]);
        layer(tmp.path(), "app.top", "extends = [\"app.base\"]\n", &[("B.sc", "b\n")]);
        let mut options = BuildOptions::for_root(tmp.path());
        options.build_all_per_layer = true;
        let mut c = Coordinator::new(Arc::new(SharedContext::new(options, DiagnosticSink::new())));
        c.init(&["app.top".to_string()]).unwrap();
        assert_eq!(c.build_all().unwrap(), BuildStatus::NewCompiledFiles);
        let main = c.main().unwrap();
        assert_eq!(main.stats().restarts, 1);
        assert_eq!(main.stats().generated.len(), 2);
    }
}
