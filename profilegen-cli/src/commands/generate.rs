//! The `generate` command.

use std::path::PathBuf;

use clap::Args;
use profilegen::config::ConfigFile;
use profilegen::CodegenRequest;
use tracing::info;

use super::common::{build_pipeline, SourceArgs};
use crate::error::CliError;

/// Arguments of `profilegen generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Package reference: id[#version], a .tgz path, file:, classpath: or http(s) URL
    #[arg(short, long)]
    pub package: String,

    /// Output root directory (overrides output.directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Dotted name of the generated artifact package (overrides output.package_name)
    #[arg(long)]
    pub package_name: Option<String>,

    /// Canonical URL of a profile to generate; repeatable. Defaults to every profile in the package
    #[arg(long = "profile")]
    pub profiles: Vec<String>,

    /// Number of generation workers (overrides generation.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Exit with status 2 when any profile fails
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub sources: SourceArgs,
}

/// Run the generate command.
pub fn run(args: GenerateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let workers = args.workers.unwrap_or(config.generation.workers);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    let package_name = args
        .package_name
        .clone()
        .unwrap_or_else(|| config.output.package_name.clone());

    let pipeline = build_pipeline(&args.sources, config, workers)?;
    let request = CodegenRequest::new(args.package.as_str(), output)
        .with_artifact_package(package_name)
        .with_profiles(args.profiles.iter().cloned());

    info!(package = %request.package, workers, "Starting generation");
    let result = pipeline.run(&request)?;

    println!(
        "Generated {} of {} profiles into {}",
        result.succeeded.len(),
        result.attempted,
        request.output.artifact_dir().display()
    );
    for path in &result.artifacts {
        println!("  {}", path.display());
    }

    if !result.failed.is_empty() {
        println!();
        println!("Failed profiles:");
        for failure in &result.failed {
            println!("  {}: {}", failure.canonical_url, failure.error);
        }
        if args.strict {
            return Err(CliError::JobsFailed {
                failed: result.failed.len(),
                attempted: result.attempted,
            });
        }
    }

    Ok(())
}
