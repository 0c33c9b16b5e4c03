//! `strata resolve`: looks up a qualified type in the main runtime.

use strata_config::OptionOverrides;
use strata_diagnostics::{DiagnosticSink, Severity, StderrHandler};
use strata_engine::{Coordinator, EngineLock};

use crate::project;
use crate::{GlobalArgs, ResolveArgs};

/// Runs the `strata resolve` command. Returns 1 if the type is not found.
pub fn run(args: &ResolveArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (name, options) = project::load_options(global, OptionOverrides::default())?;
    let sink = DiagnosticSink::with_handler(Box::new(StderrHandler::new(
        global.color,
        Severity::threshold_for(global.verbosity),
    )));
    let session = project::open(name, options, sink)?;

    match lookup(&session.coordinator, &args.type_name, args.from.as_deref())? {
        Some(description) => {
            println!("{description}");
            Ok(0)
        }
        None => {
            eprintln!("error: type '{}' not found", args.type_name);
            Ok(1)
        }
    }
}

/// Resolves `type_name` as seen from layer `from`, or from the top of the
/// stack. Cached answers are served under the read lock; only a miss takes
/// the write lock to parse.
pub fn lookup(
    coordinator: &EngineLock<Coordinator>,
    type_name: &str,
    from: Option<&str>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    {
        let guard = coordinator.read();
        let engine = guard.main().ok_or("no runtime configured")?;
        let from_id = match from {
            Some(layer) => Some(engine.layer_id(layer).ok_or_else(|| format!("unknown layer '{layer}'"))?),
            None => None,
        };
        if let Some(answer) = engine.peek(type_name, from_id) {
            return Ok(match answer {
                Some(resolved) => Some(engine.describe(resolved)?),
                None => None,
            });
        }
    }

    let mut guard = coordinator.write();
    let engine = guard.main_mut().ok_or("no runtime configured")?;
    let from_id = match from {
        Some(layer) => Some(engine.layer_id(layer).ok_or_else(|| format!("unknown layer '{layer}'"))?),
        None => None,
    };
    match engine.resolve(type_name, from_id) {
        Some(resolved) => Ok(Some(engine.describe(resolved)?)),
        None => Ok(None),
    }
}
