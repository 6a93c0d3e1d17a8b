//! User configuration stored in `~/.profilegen/config.ini`.
//!
//! ```ini
//! [cache]
//! directory = ~/.profilegen/packages
//!
//! [assets]
//! directory = ./assets
//!
//! [network]
//! timeout = 120
//!
//! [output]
//! directory = target/generated-sources
//! package_name = org.hl7.fhir.example.generated
//!
//! [generation]
//! workers = 1
//!
//! [logging]
//! level = info
//! ; directory = ~/.profilegen/logs
//! ```
//!
//! A missing file yields the defaults. Command-line flags override values
//! read from the file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::dispatch::DEFAULT_ARTIFACT_PACKAGE;
use crate::fetch::DEFAULT_TIMEOUT_SECS;

/// Directory below the home directory holding the config file.
pub const CONFIG_DIR_NAME: &str = ".profilegen";

/// Package cache directory below [`CONFIG_DIR_NAME`].
///
/// Kept apart from `~/.fhir/packages`, whose entries use a different layout.
pub const PACKAGES_DIR_NAME: &str = "packages";

/// Name of the config file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors raised while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Path of the user's config file.
pub fn config_file_path() -> PathBuf {
    home_dir().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None if value == "~" => home_dir(),
        None => PathBuf::from(value),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub package_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub assets: AssetSettings,
    pub network: NetworkSettings,
    pub output: OutputSettings,
    pub generation: GenerationSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: home_dir().join(CONFIG_DIR_NAME).join(PACKAGES_DIR_NAME),
            },
            assets: AssetSettings {
                directory: PathBuf::from("assets"),
            },
            network: NetworkSettings {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            output: OutputSettings {
                directory: PathBuf::from("target").join("generated-sources"),
                package_name: DEFAULT_ARTIFACT_PACKAGE.to_string(),
            },
            generation: GenerationSettings { workers: 1 },
            logging: LoggingSettings {
                level: "info".to_string(),
                directory: None,
            },
        }
    }
}

impl ConfigFile {
    /// Load the user's config file, or defaults when it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load a config file, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::read(path, Err)
    }

    /// Load a config file, keeping the default for every value that does
    /// not parse. The rejected values are returned alongside the config.
    pub fn load_lenient_from(path: &Path) -> Result<(Self, Vec<ConfigError>), ConfigError> {
        let mut rejected = Vec::new();
        let config = Self::read(path, |e| {
            rejected.push(e);
            Ok(())
        })?;
        Ok((config, rejected))
    }

    fn read<F>(path: &Path, mut on_invalid: F) -> Result<Self, ConfigError>
    where
        F: FnMut(ConfigError) -> Result<(), ConfigError>,
    {
        let mut config = Self::default();
        let Some(ini) = read_ini(path)? else {
            return Ok(config);
        };

        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                if let Err(e) = key.set(&mut config, value) {
                    on_invalid(e)?;
                }
            }
        }
        Ok(config)
    }

    /// Write to the user's config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Write to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        write_ini(path, &ini)
    }
}

/// Set one key in a config file, leaving the other entries untouched.
///
/// Only `value` is validated, so this also repairs a file whose other
/// entries (or the previous value of `key`) are invalid.
pub fn set_in_file(path: &Path, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
    key.set(&mut ConfigFile::default(), value)?;

    let mut ini = read_ini(path)?.unwrap_or_else(Ini::new);
    ini.with_section(Some(key.section()))
        .set(key.key_name(), value.trim());
    write_ini(path, &ini)
}

fn read_ini(path: &Path) -> Result<Option<Ini>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    Ini::load_from_file(path)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn write_ini(path: &Path, ini: &Ini) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    ini.write_to_file(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A settable configuration key, written `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CacheDirectory,
    AssetsDirectory,
    NetworkTimeout,
    OutputDirectory,
    OutputPackageName,
    GenerationWorkers,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::CacheDirectory,
            Self::AssetsDirectory,
            Self::NetworkTimeout,
            Self::OutputDirectory,
            Self::OutputPackageName,
            Self::GenerationWorkers,
            Self::LoggingLevel,
            Self::LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            Self::CacheDirectory => "cache",
            Self::AssetsDirectory => "assets",
            Self::NetworkTimeout => "network",
            Self::OutputDirectory | Self::OutputPackageName => "output",
            Self::GenerationWorkers => "generation",
            Self::LoggingLevel | Self::LoggingDirectory => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            Self::CacheDirectory
            | Self::AssetsDirectory
            | Self::OutputDirectory
            | Self::LoggingDirectory => "directory",
            Self::NetworkTimeout => "timeout",
            Self::OutputPackageName => "package_name",
            Self::GenerationWorkers => "workers",
            Self::LoggingLevel => "level",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value rendered as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::CacheDirectory => config.cache.directory.display().to_string(),
            Self::AssetsDirectory => config.assets.directory.display().to_string(),
            Self::NetworkTimeout => config.network.timeout_secs.to_string(),
            Self::OutputDirectory => config.output.directory.display().to_string(),
            Self::OutputPackageName => config.output.package_name.clone(),
            Self::GenerationWorkers => config.generation.workers.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate and store a value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            Self::CacheDirectory => config.cache.directory = non_empty_path(value, invalid)?,
            Self::AssetsDirectory => config.assets.directory = non_empty_path(value, invalid)?,
            Self::OutputDirectory => config.output.directory = non_empty_path(value, invalid)?,
            Self::NetworkTimeout => {
                config.network.timeout_secs = match value.parse::<u64>() {
                    Ok(secs) if secs > 0 => secs,
                    _ => return Err(invalid("expected a positive number of seconds")),
                }
            }
            Self::OutputPackageName => {
                let valid = !value.is_empty()
                    && value
                        .split('.')
                        .all(|segment| !segment.is_empty() && is_identifier(segment));
                if !valid {
                    return Err(invalid("expected a dotted package name"));
                }
                config.output.package_name = value.to_string();
            }
            Self::GenerationWorkers => {
                config.generation.workers = match value.parse::<usize>() {
                    Ok(workers) if workers > 0 => workers,
                    _ => return Err(invalid("expected a positive number of workers")),
                }
            }
            Self::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid("expected one of trace, debug, info, warn, error"));
                }
                config.logging.level = level;
            }
            Self::LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| expand_tilde(value));
            }
        }
        Ok(())
    }
}

fn non_empty_path(
    value: &str,
    invalid: impl Fn(&str) -> ConfigError,
) -> Result<PathBuf, ConfigError> {
    if value.is_empty() {
        return Err(invalid("path must not be empty"));
    }
    Ok(expand_tilde(value))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert!(config.cache.directory.ends_with(".profilegen/packages"));
        assert_eq!(config.network.timeout_secs, 120);
        assert_eq!(config.output.package_name, "org.hl7.fhir.example.generated");
        assert_eq!(config.generation.workers, 1);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.directory, None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[network]\ntimeout = 30\n\n[output]\npackage_name = dk.generated\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.output.package_name, "dk.generated");
        assert_eq!(config.generation.workers, 1);
    }

    #[test]
    fn test_invalid_value_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[generation]\nworkers = many\n").unwrap();

        assert!(matches!(
            ConfigFile::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_lenient_load_keeps_valid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[generation]\nworkers = many\n\n[network]\ntimeout = 30\n").unwrap();

        let (config, rejected) = ConfigFile::load_lenient_from(&path).unwrap();
        assert_eq!(config.generation.workers, 1);
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].to_string().contains("generation.workers"));
    }

    #[test]
    fn test_set_in_file_repairs_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[generation]\nworkers = many\n\n[output]\npackage_name = dk.generated\n",
        )
        .unwrap();
        assert!(ConfigFile::load_from(&path).is_err());

        set_in_file(&path, ConfigKey::GenerationWorkers, "2").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.generation.workers, 2);
        assert_eq!(config.output.package_name, "dk.generated");
    }

    #[test]
    fn test_set_in_file_rejects_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        assert!(matches!(
            set_in_file(&path, ConfigKey::GenerationWorkers, "many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(!path.exists());

        set_in_file(&path, ConfigKey::LoggingLevel, "debug").unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap().logging.level, "debug");
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        ConfigKey::CacheDirectory
            .set(&mut config, "/var/cache/fhir")
            .unwrap();
        ConfigKey::GenerationWorkers.set(&mut config, "4").unwrap();
        ConfigKey::LoggingDirectory
            .set(&mut config, "/var/log/profilegen")
            .unwrap();
        config.save_to(&path).unwrap();

        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_key_parse_and_name() {
        let key: ConfigKey = "output.package_name".parse().unwrap();
        assert_eq!(key, ConfigKey::OutputPackageName);
        assert_eq!(key.section(), "output");
        assert_eq!(key.key_name(), "package_name");
        assert_eq!(key.to_string(), "output.package_name");
        assert!("output.nope".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_set_validates() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::NetworkTimeout.set(&mut config, "0").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());
        assert!(ConfigKey::OutputPackageName
            .set(&mut config, "org..example")
            .is_err());
        assert!(ConfigKey::OutputPackageName
            .set(&mut config, "org.1example")
            .is_err());

        ConfigKey::LoggingLevel.set(&mut config, "DEBUG").unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        assert_eq!(expand_tilde("~/x"), home.join("x"));
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
    }
}
