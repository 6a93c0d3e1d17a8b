//! Definition contexts.
//!
//! A [`DefinitionContext`] is the lookup table every generation job reads
//! from: the dialect's base definitions overlaid with the active package's
//! own resources, keyed by resource identity. It is assembled eagerly by
//! [`ContextBuilder`] and never changes afterwards, so it can be shared by
//! reference across worker threads.

mod builder;

pub use builder::{ContextBuilder, ContextError};

use std::collections::BTreeMap;

use crate::dialect::Dialect;
use crate::package::cache_key;
use crate::resource::{Resource, STRUCTURE_DEFINITION_TYPE};

/// Immutable resource lookup for one run.
#[derive(Debug, Clone)]
pub struct DefinitionContext {
    dialect: Dialect,
    package_id: String,
    package_version: String,
    resources: BTreeMap<String, Resource>,
    base_count: usize,
    package_count: usize,
    expansion_parameters: Resource,
}

impl DefinitionContext {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn package_version(&self) -> &str {
        &self.package_version
    }

    /// `id#version` of the package the context was built for.
    pub fn package_key(&self) -> String {
        cache_key(&self.package_id, &self.package_version)
    }

    /// Look up a resource by identity (canonical URL or `Type/id`).
    pub fn get(&self, identity: &str) -> Option<&Resource> {
        self.resources.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.resources.contains_key(identity)
    }

    /// The profile definition with the given canonical URL.
    pub fn structure_definition(&self, canonical_url: &str) -> Option<&Resource> {
        self.get(canonical_url)
            .filter(|resource| resource.resource_type() == STRUCTURE_DEFINITION_TYPE)
    }

    /// All identities in lexical order.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Resources of one type, ordered by identity.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .values()
            .filter(move |resource| resource.resource_type() == resource_type)
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources loaded from the base definitions, before the package merge.
    pub fn base_count(&self) -> usize {
        self.base_count
    }

    /// Resources merged from the package (including overrides).
    pub fn package_count(&self) -> usize {
        self.package_count
    }

    /// Default parameters for value set expansion.
    pub fn expansion_parameters(&self) -> &Resource {
        &self.expansion_parameters
    }
}
