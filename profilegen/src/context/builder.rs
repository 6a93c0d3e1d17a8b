//! Assembly of definition contexts.
//!
//! Build order:
//!
//! 1. Map the package's FHIR version onto a [`Dialect`]; unsupported
//!    releases fail before any asset is opened.
//! 2. Load every JSON member of the dialect's base definition archive,
//!    unwrapping bundles. Unparseable members are skipped.
//! 3. Overlay the resources of the package's `package` folder. Package
//!    entries replace base entries with the same identity.
//! 4. Attach the dialect's default expansion parameters.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use super::DefinitionContext;
use crate::archive::{ArchiveError, PackageArchive, JSON_SUFFIX};
use crate::assets::{AssetError, DefinitionAssets};
use crate::dialect::Dialect;
use crate::package::Package;
use crate::resource::Resource;

/// Errors raised while building a context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The package targets a release no dialect supports.
    #[error(
        "package {package} targets unsupported FHIR version {}",
        .fhir_version.as_deref().unwrap_or("(none)")
    )]
    UnsupportedDialect {
        package: String,
        fhir_version: Option<String>,
    },

    /// The base definition archive could not be opened.
    #[error(transparent)]
    Assets(#[from] AssetError),

    /// The base definition archive is corrupt.
    #[error("failed to read base definitions: {0}")]
    Archive(#[from] ArchiveError),
}

impl ContextError {
    /// Whether the error is a configuration problem detected before I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnsupportedDialect { .. })
    }
}

/// Counters collected while loading one resource source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LoadStats {
    loaded: usize,
    skipped: usize,
}

/// Builds a [`DefinitionContext`] for a package.
pub struct ContextBuilder<'a> {
    assets: &'a dyn DefinitionAssets,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(assets: &'a dyn DefinitionAssets) -> Self {
        Self { assets }
    }

    /// Build the context for `package`.
    pub fn build(&self, package: &Package) -> Result<DefinitionContext, ContextError> {
        let dialect = package
            .dialect()
            .ok_or_else(|| ContextError::UnsupportedDialect {
                package: package.cache_key(),
                fhir_version: package.fhir_version().map(str::to_string),
            })?;

        let mut resources = BTreeMap::new();

        let base = self.load_base(dialect, &mut resources)?;
        let base_count = resources.len();
        let merged = merge_package(package, &mut resources);

        info!(
            package = %package,
            dialect = %dialect,
            base = base_count,
            package_resources = merged.loaded,
            skipped = base.skipped + merged.skipped,
            total = resources.len(),
            "Definition context built"
        );

        Ok(DefinitionContext {
            dialect,
            package_id: package.id().to_string(),
            package_version: package.version().to_string(),
            resources,
            base_count,
            package_count: merged.loaded,
            expansion_parameters: dialect.default_expansion_parameters(),
        })
    }

    fn load_base(
        &self,
        dialect: Dialect,
        resources: &mut BTreeMap<String, Resource>,
    ) -> Result<LoadStats, ContextError> {
        let reader = self.assets.open_definitions(dialect)?;
        let mut archive = PackageArchive::new(reader);
        let mut stats = LoadStats::default();

        for member in archive.members(JSON_SUFFIX)? {
            let member = member?;
            match Resource::parse(&member.bytes) {
                Ok(resource) => insert_resource(resource, resources, &member.name, &mut stats),
                Err(e) => {
                    debug!(member = %member.name, error = %e, "Skipping base definition");
                    stats.skipped += 1;
                }
            }
        }

        debug!(
            dialect = %dialect,
            loaded = stats.loaded,
            skipped = stats.skipped,
            "Base definitions loaded"
        );
        Ok(stats)
    }
}

fn merge_package(package: &Package, resources: &mut BTreeMap<String, Resource>) -> LoadStats {
    let mut stats = LoadStats::default();
    let Some(folder) = package.main_folder() else {
        debug!(package = %package, "Package has no package folder");
        return stats;
    };

    for file in folder.types().values().flatten() {
        let parsed = folder
            .fetch_file(file)
            .map_err(|e| e.to_string())
            .and_then(|bytes| Resource::parse(bytes).map_err(|e| e.to_string()));

        match parsed {
            Ok(resource) => insert_resource(resource, resources, file, &mut stats),
            Err(error) => {
                debug!(file = %file, error = %error, "Skipping package resource");
                stats.skipped += 1;
            }
        }
    }
    stats
}

/// Insert a resource, or every entry of a bundle, keyed by identity.
fn insert_resource(
    resource: Resource,
    resources: &mut BTreeMap<String, Resource>,
    origin: &str,
    stats: &mut LoadStats,
) {
    // Nested bundles are unwrapped at any depth; serde_json bounds the nesting.
    if resource.is_bundle() {
        for entry in resource.bundle_entries() {
            insert_resource(entry, resources, origin, stats);
        }
        return;
    }

    match resource.identity() {
        Some(identity) => {
            resources.insert(identity, resource);
            stats.loaded += 1;
        }
        None => {
            debug!(
                origin = %origin,
                resource_type = %resource.resource_type(),
                "Skipping resource without identity"
            );
            stats.skipped += 1;
        }
    }
}
