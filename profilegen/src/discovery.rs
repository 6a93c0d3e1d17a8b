//! Profile discovery.
//!
//! When the caller names no profiles, every `StructureDefinition` member of
//! the package's `package` folder is a candidate and its canonical `url` is
//! collected. Unlike context building, discovery is all-or-nothing: one
//! member without a readable `url` means the package is malformed and the
//! whole run stops before any generation starts.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, info};

use crate::package::{Package, PackageError};
use crate::resource::{FieldPath, ResourceError, Resource, STRUCTURE_DEFINITION_TYPE};

/// Ordered, duplicate-free set of canonical identifiers.
pub type ProfileSet = BTreeSet<String>;

/// Path of the canonical identifier inside a profile definition.
pub const CANONICAL_PATH: &str = "url";

/// Errors raised during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read profile member '{member}': {source}")]
    Member {
        member: String,
        #[source]
        source: PackageError,
    },

    #[error("malformed profile member '{member}': {source}")]
    Parse {
        member: String,
        #[source]
        source: ResourceError,
    },

    #[error("profile member '{member}' has no canonical url")]
    MissingCanonical { member: String },
}

fn canonical_path() -> &'static FieldPath {
    static PATH: OnceLock<FieldPath> = OnceLock::new();
    PATH.get_or_init(|| FieldPath::key(CANONICAL_PATH))
}

/// Collect the canonical identifiers of every profile in `package`.
///
/// A package without a `package` folder or without profile definitions
/// yields an empty set.
pub fn discover(package: &Package) -> Result<ProfileSet, DiscoveryError> {
    let Some(folder) = package.main_folder() else {
        debug!(package = %package, "No package folder, nothing to discover");
        return Ok(ProfileSet::new());
    };

    let members = folder.files_of_type(STRUCTURE_DEFINITION_TYPE);
    let mut profiles = ProfileSet::new();

    for member in members {
        let bytes = folder
            .fetch_file(member)
            .map_err(|source| DiscoveryError::Member {
                member: member.clone(),
                source,
            })?;
        let resource = Resource::parse(bytes).map_err(|source| DiscoveryError::Parse {
            member: member.clone(),
            source,
        })?;
        let canonical = resource
            .extract(canonical_path())
            .map_err(|_| DiscoveryError::MissingCanonical {
                member: member.clone(),
            })?;

        if !profiles.insert(canonical.clone()) {
            debug!(member = %member, canonical = %canonical, "Duplicate canonical url");
        }
    }

    info!(
        package = %package,
        members = members.len(),
        profiles = profiles.len(),
        "Profiles discovered"
    );
    Ok(profiles)
}

/// The profiles to generate: `explicit` when it names any, otherwise the
/// result of [`discover`].
pub fn select_profiles<I, S>(explicit: I, package: &Package) -> Result<ProfileSet, DiscoveryError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let explicit: ProfileSet = explicit
        .into_iter()
        .map(Into::into)
        .filter(|url: &String| !url.trim().is_empty())
        .collect();

    if explicit.is_empty() {
        discover(package)
    } else {
        debug!(count = explicit.len(), "Using explicit profile list");
        Ok(explicit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::tgz;

    const MANIFEST: &str = r#"{"name":"dk.core","version":"1.0.0","fhirVersions":["4.0.1"]}"#;

    fn package(files: &[(&str, &str)]) -> Package {
        let mut all = vec![("package/package.json", MANIFEST)];
        all.extend_from_slice(files);
        Package::from_bytes(&tgz(&all)).unwrap()
    }

    fn profile(url: &str) -> String {
        format!(r#"{{"resourceType":"StructureDefinition","url":"{url}"}}"#)
    }

    #[test]
    fn test_discover_collects_urls() {
        let a = profile("http://x/sd/a");
        let b = profile("http://x/sd/b");
        let package = package(&[
            ("package/StructureDefinition-a.json", a.as_str()),
            ("package/StructureDefinition-b.json", b.as_str()),
            (
                "package/ValueSet-v.json",
                r#"{"resourceType":"ValueSet","url":"http://x/vs/v"}"#,
            ),
        ]);

        let profiles = discover(&package).unwrap();
        assert_eq!(
            profiles.into_iter().collect::<Vec<_>>(),
            vec!["http://x/sd/a", "http://x/sd/b"]
        );
    }

    #[test]
    fn test_discover_dedupes() {
        let a = profile("http://x/sd/a");
        let package = package(&[
            ("package/StructureDefinition-a.json", a.as_str()),
            ("package/StructureDefinition-a-copy.json", a.as_str()),
        ]);
        assert_eq!(discover(&package).unwrap().len(), 1);
    }

    #[test]
    fn test_discover_fails_on_missing_url() {
        let a = profile("http://x/sd/a");
        let package = package(&[
            ("package/StructureDefinition-a.json", a.as_str()),
            (
                "package/StructureDefinition-b.json",
                r#"{"resourceType":"StructureDefinition","name":"NoUrl"}"#,
            ),
        ]);

        match discover(&package) {
            Err(DiscoveryError::MissingCanonical { member }) => {
                assert_eq!(member, "StructureDefinition-b.json")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_discover_fails_on_malformed_indexed_member() {
        let package = package(&[
            (
                "package/.index.json",
                r#"{"index-version":1,"files":[{"filename":"StructureDefinition-x.json","resourceType":"StructureDefinition"}]}"#,
            ),
            ("package/StructureDefinition-x.json", "{broken"),
        ]);
        assert!(matches!(
            discover(&package),
            Err(DiscoveryError::Parse { .. })
        ));
    }

    #[test]
    fn test_discover_empty_package() {
        let package = package(&[]);
        assert!(discover(&package).unwrap().is_empty());
    }

    #[test]
    fn test_select_profiles_prefers_explicit() {
        let a = profile("http://x/sd/a");
        let package = package(&[("package/StructureDefinition-a.json", a.as_str())]);

        let selected = select_profiles(["http://x/sd/z"], &package).unwrap();
        assert_eq!(selected.len(), 1);
        assert!(selected.contains("http://x/sd/z"));

        let discovered = select_profiles(Vec::<String>::new(), &package).unwrap();
        assert!(discovered.contains("http://x/sd/a"));
    }

    #[test]
    fn test_select_profiles_blank_entries_trigger_discovery() {
        let a = profile("http://x/sd/a");
        let package = package(&[("package/StructureDefinition-a.json", a.as_str())]);

        let selected = select_profiles(["", "  "], &package).unwrap();
        assert!(selected.contains("http://x/sd/a"));
    }
}
