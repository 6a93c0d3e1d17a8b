//! `profilegen config` commands.
//!
//! These work on a config file with invalid values: `get` and `list` fall
//! back to the default for each rejected value and say so on stderr, and
//! `set` rewrites only the key it is given, which is how a broken value is
//! repaired.

use std::path::Path;

use clap::Subcommand;
use profilegen::config::{config_file_path, set_in_file, ConfigError, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one value
    Get {
        /// Key as section.key (e.g. output.package_name)
        key: String,
    },

    /// Validate and store one value
    Set {
        /// Key as section.key (e.g. generation.workers)
        key: String,

        /// New value
        value: String,
    },

    /// Print every key with its effective value
    List,

    /// Print the config file location
    Path,
}

/// Run a config subcommand against the user's config file.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();
    match command {
        ConfigCommands::Get { key } => {
            let (config, _) = load(&path)?;
            println!("{}", render(parse_key(&key)?.get(&config)));
        }
        ConfigCommands::Set { key, value } => {
            let key = parse_key(&key)?;
            set_in_file(&path, key, &value)?;
            println!("{} = {}", key, value.trim());
        }
        ConfigCommands::List => {
            let (config, _) = load(&path)?;
            print!("{}", listing(&config));
        }
        ConfigCommands::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        let known: Vec<String> = ConfigKey::all().iter().map(ConfigKey::name).collect();
        CliError::Config(format!(
            "unknown key '{}' (known keys: {})",
            key,
            known.join(", ")
        ))
    })
}

/// Load leniently, reporting every rejected value.
fn load(path: &Path) -> Result<(ConfigFile, Vec<ConfigError>), CliError> {
    let (config, rejected) = ConfigFile::load_lenient_from(path)?;
    for problem in &rejected {
        eprintln!("Warning: {} (using the default)", problem);
    }
    Ok((config, rejected))
}

fn render(value: String) -> String {
    if value.is_empty() {
        "(not set)".to_string()
    } else {
        value
    }
}

/// `[section]` blocks with one `key = value` line per setting.
fn listing(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut section = "";
    for key in ConfigKey::all() {
        if key.section() != section {
            if !section.is_empty() {
                out.push('\n');
            }
            section = key.section();
            out.push_str(&format!("[{}]\n", section));
        }
        out.push_str(&format!("{} = {}\n", key.key_name(), render(key.get(config))));
    }
    out
}
