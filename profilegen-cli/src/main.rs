//! profilegen - Command-line interface
//!
//! Resolves a FHIR conformance package and generates one artifact per
//! profile it defines.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use profilegen::config::ConfigFile;
use profilegen::logging::{init_logging, LoggingGuard};

mod commands;
mod error;

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::generate::GenerateArgs;
use commands::profiles::ProfilesArgs;
use error::CliError;

/// profilegen - code generation from FHIR conformance packages
#[derive(Parser, Debug)]
#[command(name = "profilegen")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level or filter directive (overrides logging.level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate artifacts for the profiles of a package
    Generate(GenerateArgs),

    /// List the profiles a package defines
    Profiles(ProfilesArgs),

    /// Inspect the local package cache
    #[command(subcommand)]
    Cache(CacheAction),

    /// View or modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let log_level = cli.log_level.as_deref();

    match cli.command {
        // Config commands must work even when the file is broken.
        Commands::Config(command) => commands::config::run(command),
        Commands::Generate(args) => {
            let (config, _guard) = setup(log_level)?;
            commands::generate::run(args, &config)
        }
        Commands::Profiles(args) => {
            let (config, _guard) = setup(log_level)?;
            commands::profiles::run(args, &config)
        }
        Commands::Cache(action) => {
            let (config, _guard) = setup(log_level)?;
            commands::cache::run(action, &config)
        }
    }
}

/// Load the config file and install logging.
fn setup(log_level: Option<&str>) -> Result<(ConfigFile, LoggingGuard), CliError> {
    let config = ConfigFile::load()?;
    let guard = init_logging(
        log_level,
        &config.logging.level,
        config.logging.directory.as_deref(),
    )?;
    Ok((config, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "profilegen",
            "generate",
            "--package",
            "hl7.fhir.dk.core#3.2.0",
            "--output",
            "out",
            "--profile",
            "http://hl7.dk/fhir/core/StructureDefinition/dk-core-patient",
            "--profile",
            "http://hl7.dk/fhir/core/StructureDefinition/dk-core-observation",
            "--workers",
            "4",
            "--strict",
            "--cache-dir",
            "/tmp/cache",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.package, "hl7.fhir.dk.core#3.2.0");
                assert_eq!(args.output.unwrap().to_str(), Some("out"));
                assert_eq!(args.profiles.len(), 2);
                assert_eq!(args.workers, Some(4));
                assert!(args.strict);
                assert!(args.sources.cache_dir.is_some());
                assert!(args.sources.assets_dir.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_requires_package() {
        assert!(Cli::try_parse_from(["profilegen", "generate"]).is_err());
    }

    #[test]
    fn test_parse_global_log_level() {
        let cli = Cli::try_parse_from([
            "profilegen",
            "profiles",
            "-p",
            "dk.core",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Profiles(_)));
    }

    #[test]
    fn test_parse_cache_and_config() {
        let cli = Cli::try_parse_from(["profilegen", "cache", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache(CacheAction::List)));

        let cli =
            Cli::try_parse_from(["profilegen", "config", "set", "generation.workers", "4"])
                .unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Set { key, value }) => {
                assert_eq!(key, "generation.workers");
                assert_eq!(value, "4");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
