//! `strata layers`: prints the resolved layer stack of each runtime.

use std::fmt::Write;

use strata_config::OptionOverrides;
use strata_diagnostics::{DiagnosticSink, Severity, StderrHandler};
use strata_layer::{Layer, LayerStack};

use crate::project;
use crate::GlobalArgs;

/// Runs the `strata layers` command. Returns 1 if resolution reported errors.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (name, options) = project::load_options(global, OptionOverrides::default())?;
    let sink = DiagnosticSink::with_handler(Box::new(StderrHandler::new(
        global.color,
        Severity::threshold_for(global.verbosity),
    )));
    let session = project::open(name, options, sink)?;

    let coordinator = session.coordinator.read();
    for runtime in coordinator.runtimes() {
        if let Some(engine) = coordinator.engine(runtime) {
            println!("runtime {runtime}");
            print!("{}", format_stack(engine.stack()));
        }
    }
    Ok(if session.ctx.sink.has_errors() { 1 } else { 0 })
}

/// One line per active layer, lowest first, then the inactive layers.
pub fn format_stack(stack: &LayerStack) -> String {
    let mut out = String::new();
    for layer in stack.layers() {
        let _ = writeln!(out, "  {:>3}  {}{}", layer.position, layer.name, flags(layer, stack));
    }
    for layer in stack.inactive_ids().iter().filter_map(|id| stack.get(*id)) {
        let _ = writeln!(out, "    -  {} (disabled)", layer.name);
    }
    out
}

fn flags(layer: &Layer, stack: &LayerStack) -> String {
    let mut flags = Vec::new();
    if layer.dynamic {
        flags.push("dynamic");
    }
    if layer.compiled_only {
        flags.push("compiled-only");
    }
    if stack.build_layers().contains(&layer.id) {
        flags.push("build");
    }
    if layer.stub {
        flags.push("stub");
    }
    let mut s = String::new();
    if !flags.is_empty() {
        let _ = write!(s, " [{}]", flags.join(", "));
    }
    if !layer.extends.is_empty() {
        let _ = write!(s, " extends {}", layer.extends.join(", "));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn push(stack: &mut LayerStack, name: &str, pos: usize, tweak: impl FnOnce(&mut Layer)) {
        let id = stack.reserve();
        let mut layer = Layer::new(id, name, PathBuf::from("/l").join(name));
        tweak(&mut layer);
        stack.insert_at(layer, pos);
    }

    #[test]
    fn lists_layers_bottom_first_with_flags() {
        let mut stack = LayerStack::new();
        push(&mut stack, "app.core", 0, |_| {});
        push(&mut stack, "app.main", 1, |l| l.extends = vec!["app.core".to_string()]);
        let text = format_stack(&stack);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "    0  app.core");
        assert_eq!(lines[1], "    1  app.main [build] extends app.core");
    }

    #[test]
    fn disabled_layers_are_listed_last() {
        let mut stack = LayerStack::new();
        push(&mut stack, "app.core", 0, |_| {});
        let id = stack.reserve();
        stack.add_inactive(Layer::new(id, "app.old", PathBuf::from("/l/old")));
        let text = format_stack(&stack);
        assert!(text.ends_with("    -  app.old (disabled)\n"));
    }
}
