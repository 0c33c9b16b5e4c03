//! `strata clean`: deletes the build directory.

use strata_cache::BuildCache;
use strata_config::OptionOverrides;

use crate::project;
use crate::GlobalArgs;

/// Runs the `strata clean` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (_, options) = project::load_options(global, OptionOverrides::default())?;
    BuildCache::new(&options.build_dir).clean()?;
    if !global.quiet {
        eprintln!("     Removed {}", options.build_dir.display());
    }
    Ok(0)
}
