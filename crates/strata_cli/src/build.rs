//! `strata build`: incremental build of the requested layers in every runtime.

use dialoguer::Select;
use is_terminal::IsTerminal;
use strata_build::BuildStatus;
use strata_config::OptionOverrides;
use strata_diagnostics::{Diagnostic, DiagnosticSink, Severity, StderrHandler};
use tracing::{debug, info};

use crate::project::{self, Session};
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// What to do after a failed build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryChoice {
    /// Discard every dependency record and build again.
    RebuildAll,
    /// Build again incrementally.
    Retry,
    /// Give up.
    Quit,
}

impl RetryChoice {
    const ALL: [RetryChoice; 3] = [RetryChoice::RebuildAll, RetryChoice::Retry, RetryChoice::Quit];

    fn label(self) -> &'static str {
        match self {
            RetryChoice::RebuildAll => "Rebuild everything",
            RetryChoice::Retry => "Retry incremental build",
            RetryChoice::Quit => "Quit",
        }
    }
}

/// Runs the `strata build` command.
///
/// Returns exit code 0 when every runtime built cleanly, 1 otherwise.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (name, options) = project::load_options(global, overrides(args))?;

    if !global.quiet {
        eprintln!("   Building {} ({})", name, options.layers.join(", "));
    }

    let sink = match args.format {
        ReportFormat::Text => DiagnosticSink::with_handler(Box::new(StderrHandler::new(
            global.color,
            Severity::threshold_for(global.verbosity),
        ))),
        ReportFormat::Json => DiagnosticSink::new(),
    };
    let session = project::open(name, options, sink)?;
    let interactive = args.format == ReportFormat::Text && !args.no_retry && std::io::stdin().is_terminal();

    loop {
        let status = session.coordinator.write().build_all()?;
        let diagnostics = session.ctx.sink.take_all();
        let failed = status.is_error() || diagnostics.iter().any(|d| d.severity.is_error());
        report(&session, &diagnostics, status, args, global);

        debug!(?status, diagnostics = diagnostics.len(), "build pass finished");
        if !failed {
            return Ok(0);
        }
        if !interactive {
            return Ok(1);
        }
        let choice = ask_retry()?;
        info!(?choice, "retrying after failed build");
        match choice {
            RetryChoice::RebuildAll => session.coordinator.write().rebuild_all(),
            RetryChoice::Retry => {}
            RetryChoice::Quit => return Ok(1),
        }
    }
}

/// Maps the build flags onto configuration overrides.
pub fn overrides(args: &BuildArgs) -> OptionOverrides {
    OptionOverrides {
        layers: args.layers.clone(),
        force_full_rebuild: args.full,
        skip_compile: args.skip_compile,
        dynamic: args.dynamic,
        search_path: args.search_path.clone(),
        build_dir: args.build_dir.clone(),
        files: args.files.clone(),
        verbosity: 0,
    }
}

fn ask_retry() -> Result<RetryChoice, dialoguer::Error> {
    let labels: Vec<&str> = RetryChoice::ALL.iter().map(|c| c.label()).collect();
    let picked = Select::new()
        .with_prompt("Build failed")
        .items(&labels)
        .default(1)
        .interact()?;
    Ok(RetryChoice::ALL[picked])
}

/// Prints diagnostics in the requested format plus a summary line.
fn report(
    session: &Session,
    diagnostics: &[Diagnostic],
    status: BuildStatus,
    args: &BuildArgs,
    global: &GlobalArgs,
) {
    if args.format == ReportFormat::Json {
        let json = serde_json::to_string_pretty(diagnostics).unwrap_or_else(|_| "[]".to_string());
        println!("{json}");
        return;
    }
    if global.quiet {
        return;
    }

    let coordinator = session.coordinator.read();
    for runtime in coordinator.runtimes() {
        let Some(engine) = coordinator.engine(runtime) else { continue };
        let stats = engine.stats();
        if stats.is_noop() {
            eprintln!("  {runtime:>8} up to date");
        } else {
            eprintln!(
                "  {runtime:>8} generated {}, compiled {}, inherited {}",
                stats.generated.len(),
                stats.compiled.len(),
                stats.inherited.len()
            );
        }
    }

    let (errors, warnings) = count(diagnostics);
    eprintln!("   Result: {errors} error(s), {warnings} warning(s) [{status}]");
}

/// Counts error and warning diagnostics.
fn count(diagnostics: &[Diagnostic]) -> (usize, usize) {
    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    (errors, warnings)
}
