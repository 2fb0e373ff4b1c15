use super::exit_codes;
use crate::cli::args::InitArgs;
use std::path::Path;

pub fn run(args: InitArgs, config_path: &Path) -> anyhow::Result<i32> {
    if config_path.exists() {
        eprintln!("config exists: {} (skipping)", config_path.display());
    } else {
        sqljudge_core::config::write_sample_config(config_path)?;
        eprintln!("created config: {}", config_path.display());
    }

    if args.problems.exists() {
        eprintln!("problem set exists: {} (skipping)", args.problems.display());
    } else {
        std::fs::write(&args.problems, crate::templates::SAMPLE_PROBLEMS)?;
        eprintln!("created problem set: {}", args.problems.display());
    }
    Ok(exit_codes::OK)
}
