//! Centralized naming conventions.
//!
//! This module is the single source of truth for names derived from package
//! and profile identities:
//! - Cache keys (e.g., `hl7.fhir.dk.core#3.2.0`)
//! - Archive-internal folder names (e.g., `package`, `package/example`)
//! - Artifact output directories (e.g., `org/example/generated`)
//! - Artifact type names (e.g., `DkCorePatient`)
//!
//! All other modules should use these functions rather than constructing names directly.

use std::path::{Path, PathBuf};

/// Root directory of every member in a package archive.
pub const PACKAGE_ROOT: &str = "package";

/// Generate the cache key for a package.
///
/// # Examples
///
/// ```
/// use profilegen::package::cache_key;
///
/// assert_eq!(cache_key("hl7.fhir.dk.core", "3.2.0"), "hl7.fhir.dk.core#3.2.0");
/// ```
pub fn cache_key(id: &str, version: &str) -> String {
    format!("{id}#{version}")
}

/// Split a cache key back into id and version.
///
/// # Examples
///
/// ```
/// use profilegen::package::parse_cache_key;
///
/// assert_eq!(
///     parse_cache_key("hl7.fhir.dk.core#3.2.0"),
///     Some(("hl7.fhir.dk.core", "3.2.0"))
/// );
/// assert_eq!(parse_cache_key("no-version"), None);
/// ```
pub fn parse_cache_key(key: &str) -> Option<(&str, &str)> {
    let (id, version) = key.split_once('#')?;
    if id.is_empty() || version.is_empty() {
        return None;
    }
    Some((id, version))
}

/// Split an archive member path into its folder name and file name.
///
/// Members directly below `package/` belong to the `package` folder; nested
/// directories keep their full path (`package/example`). Members outside the
/// package root are returned with their own parent directory.
///
/// # Examples
///
/// ```
/// use profilegen::package::split_member_path;
///
/// assert_eq!(
///     split_member_path("package/StructureDefinition-a.json"),
///     Some(("package".to_string(), "StructureDefinition-a.json".to_string()))
/// );
/// assert_eq!(
///     split_member_path("package/example/Patient-p1.json"),
///     Some(("package/example".to_string(), "Patient-p1.json".to_string()))
/// );
/// ```
pub fn split_member_path(member: &str) -> Option<(String, String)> {
    let member = member.trim_start_matches("./");
    let (folder, file) = member.rsplit_once('/')?;
    if file.is_empty() {
        return None;
    }
    Some((folder.to_string(), file.to_string()))
}

/// Translate a dotted artifact package name into a relative path.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use profilegen::package::artifact_package_path;
///
/// assert_eq!(
///     artifact_package_path("org.hl7.fhir.example.generated"),
///     PathBuf::from("org/hl7/fhir/example/generated")
/// );
/// ```
pub fn artifact_package_path(package_name: &str) -> PathBuf {
    package_name
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Directory that receives artifacts for `package_name` under `output_dir`.
pub fn artifact_dir(output_dir: &Path, package_name: &str) -> PathBuf {
    output_dir.join(artifact_package_path(package_name))
}

/// Convert a profile name or id into an UpperCamelCase type name.
///
/// Non-alphanumeric characters separate words. A leading digit is prefixed
/// with an underscore so the result is a valid identifier.
///
/// # Examples
///
/// ```
/// use profilegen::package::type_name;
///
/// assert_eq!(type_name("dk-core-patient"), "DkCorePatient");
/// assert_eq!(type_name("DkCorePatient"), "DkCorePatient");
/// assert_eq!(type_name("clinical_use.indication"), "ClinicalUseIndication");
/// assert_eq!(type_name("2nd-profile"), "_2ndProfile");
/// ```
pub fn type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
