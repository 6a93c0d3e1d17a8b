//! Artifact generation interface.
//!
//! The dispatcher hands one [`GenerationJob`] per profile to an
//! [`ArtifactGenerator`]. What an artifact looks like is entirely the
//! generator's business; the dispatcher only cares whether the call
//! succeeded.
//!
//! [`SnapshotGenerator`] is the built-in generator: it writes a JSON
//! description of the profile's structure, one file per profile.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::context::DefinitionContext;
use crate::dialect::Dialect;
use crate::package::type_name;
use crate::resource::{FieldPath, Resource, STRUCTURE_DEFINITION_TYPE};

/// How extensions on profiled elements are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionPolicy {
    /// Extensions are not rendered.
    Omit,
    /// Only complex extensions get dedicated accessors.
    Complexes,
    /// Primitive extensions get dedicated accessors as well.
    Primitives,
}

/// Generator switches, constant for a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOptions {
    pub narrative: bool,
    pub meta: bool,
    pub key_elements_only: bool,
    pub extension_policy: ExtensionPolicy,
    pub language: Option<String>,
    /// Dialect tag (`r4`, `r5`).
    pub version_tag: String,
}

impl GenerationOptions {
    /// The options every run of `dialect` uses.
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            narrative: true,
            meta: true,
            key_elements_only: true,
            extension_policy: ExtensionPolicy::Complexes,
            language: None,
            version_tag: dialect.tag().to_string(),
        }
    }
}

/// One unit of generation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    /// Canonical URL of the profile to generate.
    pub canonical_url: String,
    /// Generation timestamp shared by every job of the run.
    pub timestamp: String,
    /// Directory the artifact is written to (already includes the
    /// artifact package path).
    pub output_dir: PathBuf,
    /// Dotted package name of the generated artifacts.
    pub artifact_package: String,
    /// File stem of the artifact, unique (case-insensitively) within a run.
    pub artifact_name: String,
    pub options: GenerationOptions,
}

/// Errors a generator can report for a single job.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("profile '{0}' not found in definition context")]
    ProfileNotFound(String),

    #[error("'{canonical}' is a {resource_type}, not a StructureDefinition")]
    NotAProfile {
        canonical: String,
        resource_type: String,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("generation failed: {0}")]
    Failed(String),
}

/// Turns one profile plus a definition context into an artifact.
pub trait ArtifactGenerator: Send + Sync {
    /// Run one job and return the path of the written artifact.
    fn generate(
        &self,
        job: &GenerationJob,
        context: &DefinitionContext,
    ) -> Result<PathBuf, GenerationError>;
}

/// Writes a deterministic JSON description of each profile.
///
/// The output file is `<artifact_name>.json`; see [`artifact_type_name`] for
/// how the dispatcher derives the name. Apart from the `generated` timestamp
/// the content depends only on the profile definition and the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotGenerator;

impl SnapshotGenerator {
    pub fn new() -> Self {
        Self
    }

    fn describe(profile: &Resource, canonical: &str, job: &GenerationJob) -> Value {
        let string = |key: &str| profile.get(key).and_then(Value::as_str);

        json!({
            "canonical": canonical,
            "typeName": job.artifact_name,
            "name": string("name"),
            "type": string("type"),
            "baseDefinition": string("baseDefinition"),
            "fhirVersion": job.options.version_tag,
            "package": job.artifact_package,
            "generated": job.timestamp,
            "options": job.options,
            "elements": element_paths(profile, job.options.key_elements_only),
        })
    }
}

impl ArtifactGenerator for SnapshotGenerator {
    fn generate(
        &self,
        job: &GenerationJob,
        context: &DefinitionContext,
    ) -> Result<PathBuf, GenerationError> {
        let canonical = job.canonical_url.as_str();
        let profile = context
            .get(canonical)
            .ok_or_else(|| GenerationError::ProfileNotFound(canonical.to_string()))?;

        if profile.resource_type() != STRUCTURE_DEFINITION_TYPE {
            return Err(GenerationError::NotAProfile {
                canonical: canonical.to_string(),
                resource_type: profile.resource_type().to_string(),
            });
        }

        let description = Self::describe(profile, canonical, job);
        let mut bytes = serde_json::to_vec_pretty(&description)
            .map_err(|e| GenerationError::Failed(e.to_string()))?;
        bytes.push(b'\n');

        let path = job.output_dir.join(format!("{}.json", job.artifact_name));
        fs::write(&path, bytes).map_err(|source| GenerationError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Preferred artifact name of a profile: its `name`, else its `id`, else
/// the last URL segment, in PascalCase.
///
/// Different profiles may share a preferred name; the dispatcher makes the
/// final names unique.
pub fn artifact_type_name(profile: Option<&Resource>, canonical: &str) -> String {
    let fallback = canonical.rsplit('/').next().unwrap_or(canonical);
    let declared = profile.and_then(|p| p.name().or(p.id()));
    let name = type_name(declared.unwrap_or(fallback));
    if name.is_empty() {
        "Profile".to_string()
    } else {
        name
    }
}

/// Element paths of the snapshot, or of the differential when the profile
/// carries no snapshot.
///
/// With `key_elements_only` only the root element, required elements and
/// must-support elements are kept.
fn element_paths(profile: &Resource, key_elements_only: bool) -> Vec<String> {
    let snapshot = FieldPath::key("snapshot").child("element");
    let differential = FieldPath::key("differential").child("element");

    let mut elements = snapshot.evaluate(profile.as_value());
    if elements.is_empty() {
        elements = differential.evaluate(profile.as_value());
    }

    elements
        .into_iter()
        .filter(|element| !key_elements_only || is_key_element(element))
        .filter_map(|element| element.get("path").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn is_key_element(element: &Value) -> bool {
    let is_root = element
        .get("path")
        .and_then(Value::as_str)
        .is_some_and(|path| !path.contains('.'));
    let required = element
        .get("min")
        .and_then(Value::as_u64)
        .is_some_and(|min| min > 0);
    let must_support = element
        .get("mustSupport")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    is_root || required || must_support
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(value: Value) -> Resource {
        Resource::from_value(value).unwrap()
    }

    #[test]
    fn test_options_for_dialect() {
        let options = GenerationOptions::for_dialect(Dialect::R5);
        assert!(options.narrative);
        assert!(options.meta);
        assert!(options.key_elements_only);
        assert_eq!(options.extension_policy, ExtensionPolicy::Complexes);
        assert_eq!(options.language, None);
        assert_eq!(options.version_tag, "r5");
    }

    #[test]
    fn test_artifact_type_name() {
        let named = profile(json!({"resourceType": "StructureDefinition", "name": "DkCorePatient"}));
        assert_eq!(artifact_type_name(Some(&named), "http://x/sd/p"), "DkCorePatient");

        let by_id = profile(json!({"resourceType": "StructureDefinition", "id": "dk-core-patient"}));
        assert_eq!(artifact_type_name(Some(&by_id), "http://x/sd/p"), "DkCorePatient");

        let anonymous = profile(json!({"resourceType": "StructureDefinition"}));
        assert_eq!(
            artifact_type_name(Some(&anonymous), "http://x/sd/basic-profile"),
            "BasicProfile"
        );
        assert_eq!(
            artifact_type_name(None, "http://x/sd/dk-core-patient"),
            "DkCorePatient"
        );
    }

    #[test]
    fn test_element_paths_key_elements() {
        let sd = profile(json!({
            "resourceType": "StructureDefinition",
            "snapshot": {"element": [
                {"path": "Patient", "min": 0},
                {"path": "Patient.id", "min": 0},
                {"path": "Patient.identifier", "min": 1},
                {"path": "Patient.name", "mustSupport": true}
            ]}
        }));

        assert_eq!(
            element_paths(&sd, true),
            vec!["Patient", "Patient.identifier", "Patient.name"]
        );
        assert_eq!(element_paths(&sd, false).len(), 4);
    }

    #[test]
    fn test_element_paths_fall_back_to_differential() {
        let sd = profile(json!({
            "resourceType": "StructureDefinition",
            "differential": {"element": [
                {"path": "Observation", "min": 0},
                {"path": "Observation.code", "min": 1}
            ]}
        }));
        assert_eq!(
            element_paths(&sd, true),
            vec!["Observation", "Observation.code"]
        );
    }
}
