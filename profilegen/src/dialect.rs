//! Supported FHIR release dialects.
//!
//! Every package targets one FHIR release. Only a closed set of releases is
//! supported; everything downstream (base definitions, generator options)
//! dispatches on [`Dialect`].

use std::fmt;

use serde_json::json;

use crate::resource::Resource;

/// A supported FHIR release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    R4,
    R5,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 2] = [Dialect::R4, Dialect::R5];

    /// Map a FHIR version string (e.g. `4.0.1`) onto a dialect.
    ///
    /// Only the major.minor pair is significant: `4.0.x` is R4 and `5.0.x`
    /// is R5 (including ballot suffixes such as `5.0.0-snapshot1`). R4B
    /// (`4.3.x`) and anything else is unsupported.
    pub fn from_fhir_version(version: &str) -> Option<Self> {
        let mut parts = version.trim().split(['.', '-']);
        let major = parts.next()?;
        let minor = parts.next().unwrap_or("0");

        match (major, minor) {
            ("4", "0") => Some(Self::R4),
            ("5", "0") => Some(Self::R5),
            _ => None,
        }
    }

    /// Short tag used for asset directories and generator options.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::R4 => "r4",
            Self::R5 => "r5",
        }
    }

    /// Parse a tag produced by [`Dialect::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.tag().eq_ignore_ascii_case(tag))
    }

    /// Default expansion parameters attached to every context of this
    /// dialect.
    ///
    /// Both releases start from an empty `Parameters` resource.
    pub fn default_expansion_parameters(&self) -> Resource {
        let value = match self {
            Self::R4 | Self::R5 => json!({ "resourceType": "Parameters" }),
        };
        Resource::from_value(value).expect("static Parameters resource is valid")
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R4 => write!(f, "R4"),
            Self::R5 => write!(f, "R5"),
        }
    }
}
