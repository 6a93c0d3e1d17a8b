//! The `package.json` manifest at the root of every conformance package.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the manifest member inside the `package` folder.
pub const MANIFEST_FILENAME: &str = "package.json";

/// Dependency names that pin the core FHIR release.
const CORE_DEPENDENCIES: &[&str] = &["hl7.fhir.r4.core", "hl7.fhir.r5.core", "hl7.fhir.core"];

/// Subset of the NPM manifest used by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Specification releases the package targets, most relevant first.
    #[serde(rename = "fhirVersions", default, skip_serializing_if = "Vec::is_empty")]
    pub fhir_versions: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Parse a manifest from raw JSON bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The FHIR release this package targets.
    ///
    /// Uses the first `fhirVersions` entry, falling back to the version of a
    /// core package dependency.
    pub fn fhir_version(&self) -> Option<&str> {
        if let Some(first) = self.fhir_versions.first() {
            return Some(first.as_str());
        }

        CORE_DEPENDENCIES
            .iter()
            .find_map(|name| self.dependencies.get(*name))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = br#"{
            "name": "hl7.fhir.dk.core",
            "version": "3.2.0",
            "description": "Danish core profiles",
            "fhirVersions": ["4.0.1"],
            "dependencies": {"hl7.fhir.r4.core": "4.0.1"},
            "author": "HL7 Denmark"
        }"#;

        let manifest = PackageManifest::parse(json).unwrap();
        assert_eq!(manifest.name, "hl7.fhir.dk.core");
        assert_eq!(manifest.version, "3.2.0");
        assert_eq!(manifest.description.as_deref(), Some("Danish core profiles"));
        assert_eq!(manifest.fhir_version(), Some("4.0.1"));
    }

    #[test]
    fn test_fhir_version_from_dependency() {
        let json = br#"{
            "name": "example.pkg",
            "version": "1.0.0",
            "dependencies": {"hl7.fhir.r5.core": "5.0.0"}
        }"#;
        let manifest = PackageManifest::parse(json).unwrap();
        assert_eq!(manifest.fhir_version(), Some("5.0.0"));
    }

    #[test]
    fn test_fhir_version_missing() {
        let manifest = PackageManifest::parse(br#"{"name":"a","version":"1"}"#).unwrap();
        assert_eq!(manifest.fhir_version(), None);
    }

    #[test]
    fn test_missing_name_is_error() {
        assert!(PackageManifest::parse(br#"{"version":"1.0.0"}"#).is_err());
    }
}
