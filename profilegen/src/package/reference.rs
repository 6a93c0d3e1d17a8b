//! Package references as supplied by the caller.
//!
//! A reference is a string in one of these forms:
//!
//! | Form                         | Example                                  |
//! |------------------------------|------------------------------------------|
//! | cache id                     | `hl7.fhir.dk.core`                       |
//! | cache id with version        | `hl7.fhir.dk.core#3.2.0`                 |
//! | local path / `file:` URL     | `/tmp/package.tgz`, `file:/tmp/p.tgz`    |
//! | bundled asset (`classpath:`) | `classpath:package.tgz`                  |
//! | remote URL                   | `https://hl7.dk/fhir/core/package.tgz`   |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors raised for references that cannot be interpreted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("package reference is empty")]
    Empty,

    #[error("invalid package id '{0}'")]
    InvalidId(String),

    #[error("empty version in package reference '{0}'")]
    EmptyVersion(String),

    #[error("reference '{0}' has no path")]
    EmptyPath(String),
}

/// A parsed package reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageReference {
    /// A package expected to be present in the local cache.
    Cached { id: String, version: Option<String> },

    /// An archive on the local filesystem.
    Local(PathBuf),

    /// An archive shipped in the asset directory.
    Asset(PathBuf),

    /// An archive served over HTTP(S).
    Remote(String),
}

fn package_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_\-]*(\.[a-z0-9_\-]+)*$")
            .expect("package id pattern is valid")
    })
}

impl PackageReference {
    /// Whether resolving this reference requires network access.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Whether resolving this reference reads bytes (as opposed to a pure
    /// cache lookup).
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Self::Cached { .. })
    }
}

impl FromStr for PackageReference {
    type Err = ReferenceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }

        if input.starts_with("http:") || input.starts_with("https:") {
            return Ok(Self::Remote(input.to_string()));
        }

        if let Some(rest) = input.strip_prefix("file:") {
            // Accept both `file:/abs/path` and `file:///abs/path`.
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(ReferenceError::EmptyPath(input.to_string()));
            }
            return Ok(Self::Local(PathBuf::from(path)));
        }

        if let Some(rest) = input.strip_prefix("classpath:") {
            let path = rest.trim_start_matches('/');
            if path.is_empty() {
                return Err(ReferenceError::EmptyPath(input.to_string()));
            }
            return Ok(Self::Asset(PathBuf::from(path)));
        }

        if input.starts_with('/') {
            return Ok(Self::Local(PathBuf::from(input)));
        }

        let (id, version) = match input.split_once('#') {
            Some((id, version)) => {
                if version.trim().is_empty() {
                    return Err(ReferenceError::EmptyVersion(input.to_string()));
                }
                (id, Some(version.trim().to_string()))
            }
            None => (input, None),
        };

        if !package_id_pattern().is_match(id) {
            return Err(ReferenceError::InvalidId(id.to_string()));
        }

        Ok(Self::Cached {
            id: id.to_string(),
            version,
        })
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached { id, version: None } => write!(f, "{id}"),
            Self::Cached {
                id,
                version: Some(version),
            } => write!(f, "{id}#{version}"),
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Asset(path) => write!(f, "classpath:{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}
