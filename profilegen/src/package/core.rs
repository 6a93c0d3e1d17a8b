//! Core package type.
//!
//! The [`Package`] struct is the resolved unit of work: the manifest identity
//! plus every folder of the archive, held in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use super::error::{PackageError, PackageResult};
use super::folder::ResourceFolder;
use super::manifest::{PackageManifest, MANIFEST_FILENAME};
use super::naming::{cache_key, split_member_path, PACKAGE_ROOT};
use crate::archive::PackageArchive;
use crate::dialect::Dialect;

/// A resolved conformance package.
///
/// Built once from archive bytes and never mutated afterwards.
///
/// # Example
///
/// ```ignore
/// use profilegen::package::Package;
///
/// let package = Package::from_archive(std::fs::File::open("package.tgz")?)?;
/// println!("{} targets FHIR {}", package, package.fhir_version().unwrap_or("?"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    manifest: PackageManifest,
    folders: BTreeMap<String, ResourceFolder>,
}

impl Package {
    /// Read a package from a `.tgz` stream.
    pub fn from_archive<R: Read>(reader: R) -> PackageResult<Self> {
        let members = PackageArchive::new(reader).read_all_members()?;

        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
        for member in members {
            if let Some((folder, file)) = split_member_path(&member.name) {
                grouped.entry(folder).or_default().insert(file, member.bytes);
            }
        }

        let manifest_bytes = grouped
            .get(PACKAGE_ROOT)
            .and_then(|files| files.get(MANIFEST_FILENAME))
            .ok_or(PackageError::MissingManifest)?;
        let manifest = PackageManifest::parse(manifest_bytes)
            .map_err(|e| PackageError::InvalidManifest(e.to_string()))?;

        if manifest.name.trim().is_empty() || manifest.version.trim().is_empty() {
            return Err(PackageError::InvalidManifest(
                "name and version must not be empty".to_string(),
            ));
        }

        let folders = grouped
            .into_iter()
            .map(|(name, files)| {
                let folder = ResourceFolder::from_files(name.clone(), files);
                (name, folder)
            })
            .collect();

        Ok(Self { manifest, folders })
    }

    /// Read a package from in-memory archive bytes.
    pub fn from_bytes(bytes: &[u8]) -> PackageResult<Self> {
        Self::from_archive(bytes)
    }

    pub fn id(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn description(&self) -> Option<&str> {
        self.manifest.description.as_deref()
    }

    /// The FHIR release the package declares.
    pub fn fhir_version(&self) -> Option<&str> {
        self.manifest.fhir_version()
    }

    /// The dialect of the declared release, if it is supported.
    pub fn dialect(&self) -> Option<Dialect> {
        self.fhir_version().and_then(Dialect::from_fhir_version)
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// `id#version`, the key the package is cached under.
    pub fn cache_key(&self) -> String {
        cache_key(self.id(), self.version())
    }

    pub fn folders(&self) -> &BTreeMap<String, ResourceFolder> {
        &self.folders
    }

    pub fn folder(&self, name: &str) -> Option<&ResourceFolder> {
        self.folders.get(name)
    }

    /// The main `package` folder holding the conformance resources.
    pub fn main_folder(&self) -> Option<&ResourceFolder> {
        self.folder(PACKAGE_ROOT)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::tgz;

    const MANIFEST: &str = r#"{"name":"hl7.fhir.dk.core","version":"3.2.0","fhirVersions":["4.0.1"],"description":"DK core"}"#;

    #[test]
    fn test_from_archive_reads_manifest_and_folders() {
        let bytes = tgz(&[
            ("package/package.json", MANIFEST),
            (
                "package/StructureDefinition-dk-core-patient.json",
                r#"{"resourceType":"StructureDefinition","url":"http://hl7.dk/sd/p"}"#,
            ),
            (
                "package/example/Patient-p1.json",
                r#"{"resourceType":"Patient","id":"p1"}"#,
            ),
        ]);

        let package = Package::from_bytes(&bytes).unwrap();
        assert_eq!(package.id(), "hl7.fhir.dk.core");
        assert_eq!(package.version(), "3.2.0");
        assert_eq!(package.description(), Some("DK core"));
        assert_eq!(package.cache_key(), "hl7.fhir.dk.core#3.2.0");
        assert_eq!(package.dialect(), Some(Dialect::R4));

        let main = package.main_folder().unwrap();
        assert_eq!(
            main.files_of_type("StructureDefinition"),
            &["StructureDefinition-dk-core-patient.json"]
        );

        let examples = package.folder("package/example").unwrap();
        assert_eq!(examples.files_of_type("Patient"), &["Patient-p1.json"]);
    }

    #[test]
    fn test_missing_manifest() {
        let bytes = tgz(&[("package/ValueSet-a.json", r#"{"resourceType":"ValueSet"}"#)]);
        assert!(matches!(
            Package::from_bytes(&bytes),
            Err(PackageError::MissingManifest)
        ));
    }

    #[test]
    fn test_invalid_manifest() {
        let bytes = tgz(&[("package/package.json", r#"{"name":""}"#)]);
        assert!(matches!(
            Package::from_bytes(&bytes),
            Err(PackageError::InvalidManifest(_))
        ));

        let bytes = tgz(&[("package/package.json", r#"{"name":"","version":"1.0.0"}"#)]);
        assert!(matches!(
            Package::from_bytes(&bytes),
            Err(PackageError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_corrupt_archive_is_io() {
        let err = Package::from_bytes(b"definitely not gzip").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_unsupported_dialect_is_none() {
        let bytes = tgz(&[(
            "package/package.json",
            r#"{"name":"r4b.pkg","version":"1.0.0","fhirVersions":["4.3.0"]}"#,
        )]);
        let package = Package::from_bytes(&bytes).unwrap();
        assert_eq!(package.fhir_version(), Some("4.3.0"));
        assert_eq!(package.dialect(), None);
    }
}
