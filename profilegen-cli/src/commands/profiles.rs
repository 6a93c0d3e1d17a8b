//! The `profiles` command.

use clap::Args;
use profilegen::config::ConfigFile;

use super::common::{build_pipeline, SourceArgs};
use crate::error::CliError;

/// Arguments of `profilegen profiles`.
#[derive(Debug, Args)]
pub struct ProfilesArgs {
    /// Package reference to inspect
    #[arg(short, long)]
    pub package: String,

    #[command(flatten)]
    pub sources: SourceArgs,
}

/// Print the canonical URL of every profile the package defines.
pub fn run(args: ProfilesArgs, config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = build_pipeline(&args.sources, config, 1)?;
    let profiles = pipeline.discover(&args.package)?;

    if profiles.is_empty() {
        println!("No profiles found in {}", args.package);
        return Ok(());
    }

    for url in &profiles {
        println!("{}", url);
    }
    Ok(())
}
