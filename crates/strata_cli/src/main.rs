//! Strata CLI: builds layered projects and answers type lookups.
//!
//! `strata build` runs the incremental build, `strata layers` prints the
//! resolved layer stacks, `strata resolve` looks up a type, `strata clean`
//! deletes the build directory, and `strata init` scaffolds a project.

#![warn(missing_docs)]

mod build;
mod clean;
mod init;
mod layers;
mod logging;
mod project;
mod resolve;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;

/// Strata: layered incremental builds.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata layered build engine")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More output; repeat for debug logging.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `strata.toml` file or the directory holding it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the requested layers.
    Build(BuildArgs),
    /// Print the resolved layer stack of every runtime.
    Layers,
    /// Look up a type in the main runtime.
    Resolve(ResolveArgs),
    /// Delete the build directory.
    Clean,
    /// Create a new Strata project.
    Init {
        /// Project name (creates a subdirectory). If omitted, initializes in
        /// the current directory.
        name: Option<String>,
    },
}

/// Arguments for `strata build`.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Layers to build; defaults to `project.layers`.
    pub layers: Vec<String>,

    /// Ignore dependency records and rebuild everything.
    #[arg(long)]
    pub full: bool,

    /// Generate sources but do not run the toolchain.
    #[arg(long)]
    pub skip_compile: bool,

    /// Treat the requested layers as dynamic.
    #[arg(long)]
    pub dynamic: bool,

    /// Extra directories to search for layers, before the configured ones.
    #[arg(long = "search-path", num_args = 1..)]
    pub search_path: Vec<PathBuf>,

    /// Build directory override.
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Only regenerate these source files.
    #[arg(long, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Diagnostic output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Never offer to retry a failed build.
    #[arg(long)]
    pub no_retry: bool,
}

/// Arguments for `strata resolve`.
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Qualified type name, e.g. `app.model.Customer`.
    pub type_name: String,

    /// Resolve as seen from this layer instead of the top of the stack.
    #[arg(long)]
    pub from: Option<String>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// 0 when quiet, 1 by default, more with each `-v`.
    pub verbosity: u8,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };
    let verbosity = if cli.quiet { 0 } else { 1 + cli.verbose };
    logging::init(verbosity);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbosity,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Layers => layers::run(&global),
        Command::Resolve(ref args) => resolve::run(args, &global),
        Command::Clean => clean::run(&global),
        Command::Init { name } => init::run(name),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
