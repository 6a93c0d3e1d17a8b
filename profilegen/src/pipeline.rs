//! End-to-end code generation pipeline.
//!
//! ```text
//! reference ──► PackageResolver ──► Package ──► ContextBuilder ──► DefinitionContext
//!                                      │                                  │
//!                                      └──► select_profiles ──► ProfileSet┤
//!                                                                         ▼
//!                                                                  JobDispatcher
//! ```
//!
//! Resolution, context building and discovery are fail-fast; the dispatch
//! stage is fail-soft and reports per-job failures in the [`RunResult`].

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::assets::DefinitionAssets;
use crate::context::{ContextBuilder, DefinitionContext};
use crate::discovery::{discover, select_profiles, ProfileSet};
use crate::dispatch::{JobDispatcher, OutputConfig, RunResult, DEFAULT_ARTIFACT_PACKAGE};
use crate::error::PipelineError;
use crate::generator::ArtifactGenerator;
use crate::package::{Package, PackageReference};
use crate::resolver::PackageResolver;

/// Input of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenRequest {
    /// Package reference in any supported form.
    pub package: String,
    pub output: OutputConfig,
    /// Profiles to generate; empty means discover them.
    pub profiles: Vec<String>,
}

impl CodegenRequest {
    pub fn new(package: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            output: OutputConfig::new(output_dir, DEFAULT_ARTIFACT_PACKAGE),
            profiles: Vec::new(),
        }
    }

    pub fn with_artifact_package(mut self, name: impl Into<String>) -> Self {
        self.output.artifact_package = name.into();
        self
    }

    pub fn with_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }
}

/// Wires resolver, context builder, discovery and dispatcher together.
pub struct Pipeline {
    resolver: PackageResolver,
    assets: Arc<dyn DefinitionAssets>,
    dispatcher: JobDispatcher,
}

impl Pipeline {
    pub fn new(
        resolver: PackageResolver,
        assets: Arc<dyn DefinitionAssets>,
        generator: Arc<dyn ArtifactGenerator>,
    ) -> Self {
        Self {
            resolver,
            assets,
            dispatcher: JobDispatcher::new(generator),
        }
    }

    /// Run generation jobs on `workers` threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.dispatcher = self.dispatcher.with_workers(workers);
        self
    }

    pub fn resolver(&self) -> &PackageResolver {
        &self.resolver
    }

    /// Parse and resolve a package reference.
    pub fn resolve(&self, reference: &str) -> Result<Package, PipelineError> {
        let reference: PackageReference = reference.parse()?;
        Ok(self.resolver.resolve(&reference)?)
    }

    /// Build the definition context for a resolved package.
    pub fn build_context(&self, package: &Package) -> Result<DefinitionContext, PipelineError> {
        Ok(ContextBuilder::new(self.assets.as_ref()).build(package)?)
    }

    /// Resolve a package and list the profiles it defines.
    pub fn discover(&self, reference: &str) -> Result<ProfileSet, PipelineError> {
        let package = self.resolve(reference)?;
        Ok(discover(&package)?)
    }

    /// Execute one run.
    pub fn run(&self, request: &CodegenRequest) -> Result<RunResult, PipelineError> {
        let package = self.resolve(&request.package)?;
        info!(
            package = %package,
            fhir_version = package.fhir_version().unwrap_or("unknown"),
            "Package resolved"
        );

        let context = self.build_context(&package)?;
        let profiles = select_profiles(request.profiles.iter().cloned(), &package)?;
        let result = self.dispatcher.dispatch(&context, &profiles, &request.output)?;

        for failure in &result.failed {
            info!(profile = %failure.canonical_url, error = %failure.error, "Profile failed");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CodegenRequest::new("dk.core#1.0.0", "/out");
        assert_eq!(request.output.artifact_package, DEFAULT_ARTIFACT_PACKAGE);
        assert!(request.profiles.is_empty());
        assert_eq!(
            request.output.artifact_dir(),
            PathBuf::from("/out/org/hl7/fhir/example/generated")
        );
    }

    #[test]
    fn test_request_builders() {
        let request = CodegenRequest::new("dk.core", "/out")
            .with_artifact_package("dk.gen")
            .with_profiles(["http://x/a", "http://x/b"]);
        assert_eq!(request.output.artifact_dir(), PathBuf::from("/out/dk/gen"));
        assert_eq!(request.profiles.len(), 2);
    }
}
