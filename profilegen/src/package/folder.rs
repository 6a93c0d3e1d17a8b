//! Folders of resources inside a package.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use super::error::{PackageError, PackageResult};
use crate::archive::JSON_SUFFIX;
use crate::resource::Resource;

/// Per-folder index written by the package tooling.
pub const INDEX_FILENAME: &str = ".index.json";

/// A directory of a package with its members grouped by resource type.
///
/// Member contents are held in memory; the folder is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFolder {
    name: String,
    types: BTreeMap<String, Vec<String>>,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct FolderIndex {
    #[serde(default)]
    files: Vec<FolderIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct FolderIndexEntry {
    filename: String,
    #[serde(rename = "resourceType")]
    resource_type: String,
}

impl ResourceFolder {
    /// Build a folder from its member files (names relative to the folder).
    ///
    /// Resource types come from `.index.json` when it is present and
    /// well-formed; otherwise every JSON member is sniffed for its
    /// `resourceType`. Members that are not resources stay fetchable but are
    /// not typed.
    pub fn from_files(name: impl Into<String>, files: BTreeMap<String, Vec<u8>>) -> Self {
        let name = name.into();
        let types = files
            .get(INDEX_FILENAME)
            .and_then(|bytes| match serde_json::from_slice::<FolderIndex>(bytes) {
                Ok(index) => Some(index),
                Err(e) => {
                    debug!(folder = %name, error = %e, "Ignoring unreadable folder index");
                    None
                }
            })
            .map(|index| types_from_index(index, &files))
            .unwrap_or_else(|| types_from_contents(&files));

        Self { name, types, files }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource type → member names, each list sorted by file name.
    pub fn types(&self) -> &BTreeMap<String, Vec<String>> {
        &self.types
    }

    /// Member names of one resource type.
    pub fn files_of_type(&self, resource_type: &str) -> &[String] {
        self.types
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Names of every member, typed or not.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Raw bytes of a member.
    pub fn fetch_file(&self, name: &str) -> PackageResult<&[u8]> {
        self.files
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PackageError::FileNotFound {
                folder: self.name.clone(),
                file: name.to_string(),
            })
    }

    /// Number of typed resource members.
    pub fn resource_count(&self) -> usize {
        self.types.values().map(Vec::len).sum()
    }
}

fn types_from_index(
    index: FolderIndex,
    files: &BTreeMap<String, Vec<u8>>,
) -> BTreeMap<String, Vec<String>> {
    let mut types: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in index.files {
        if files.contains_key(&entry.filename) {
            types
                .entry(entry.resource_type)
                .or_default()
                .push(entry.filename);
        }
    }
    for names in types.values_mut() {
        names.sort();
        names.dedup();
    }
    types
}

fn types_from_contents(files: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<String>> {
    let mut types: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, bytes) in files {
        if !name.ends_with(JSON_SUFFIX) || name == INDEX_FILENAME {
            continue;
        }
        if let Ok(resource) = Resource::parse(bytes) {
            types
                .entry(resource.resource_type().to_string())
                .or_default()
                .push(name.clone());
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_types_sniffed_from_contents() {
        let folder = ResourceFolder::from_files(
            "package",
            files(&[
                ("package.json", r#"{"name":"x","version":"1"}"#),
                ("StructureDefinition-b.json", r#"{"resourceType":"StructureDefinition"}"#),
                ("StructureDefinition-a.json", r#"{"resourceType":"StructureDefinition"}"#),
                ("ValueSet-v.json", r#"{"resourceType":"ValueSet"}"#),
                ("notes.txt", "hello"),
            ]),
        );

        assert_eq!(
            folder.files_of_type("StructureDefinition"),
            &["StructureDefinition-a.json", "StructureDefinition-b.json"]
        );
        assert_eq!(folder.files_of_type("ValueSet"), &["ValueSet-v.json"]);
        assert_eq!(folder.resource_count(), 3);
        assert_eq!(folder.fetch_file("notes.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_types_from_index() {
        let folder = ResourceFolder::from_files(
            "package",
            files(&[
                (
                    ".index.json",
                    r#"{"index-version":1,"files":[
                        {"filename":"sd.json","resourceType":"StructureDefinition"},
                        {"filename":"gone.json","resourceType":"StructureDefinition"}
                    ]}"#,
                ),
                ("sd.json", r#"{"resourceType":"StructureDefinition"}"#),
                ("vs.json", r#"{"resourceType":"ValueSet"}"#),
            ]),
        );

        // Index wins; entries for missing files are dropped.
        assert_eq!(folder.files_of_type("StructureDefinition"), &["sd.json"]);
        assert!(folder.files_of_type("ValueSet").is_empty());
    }

    #[test]
    fn test_corrupt_index_falls_back_to_contents() {
        let folder = ResourceFolder::from_files(
            "package",
            files(&[
                (".index.json", "{broken"),
                ("vs.json", r#"{"resourceType":"ValueSet"}"#),
            ]),
        );
        assert_eq!(folder.files_of_type("ValueSet"), &["vs.json"]);
    }

    #[test]
    fn test_fetch_missing_file() {
        let folder = ResourceFolder::from_files("package", BTreeMap::new());
        let err = folder.fetch_file("nope.json").unwrap_err();
        assert!(matches!(err, PackageError::FileNotFound { .. }));
    }
}
