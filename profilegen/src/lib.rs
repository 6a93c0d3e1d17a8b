//! profilegen - code generation from FHIR conformance packages
//!
//! This library resolves a FHIR implementation guide package, assembles a
//! definition context from the package and the bundled base definitions of
//! its FHIR release, and runs one generation job per profile with per-job
//! failure isolation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use profilegen::{
//!     AssetDirectory, CodegenRequest, DefaultFetcher, DiskPackageCache, PackageResolver,
//!     Pipeline, SnapshotGenerator,
//! };
//!
//! let cache = Arc::new(DiskPackageCache::open("/home/me/.fhir/packages")?);
//! let resolver = PackageResolver::new(cache, Arc::new(DefaultFetcher::new()?));
//! let pipeline = Pipeline::new(
//!     resolver,
//!     Arc::new(AssetDirectory::new("assets")),
//!     Arc::new(SnapshotGenerator::new()),
//! );
//!
//! let result = pipeline.run(&CodegenRequest::new("hl7.fhir.dk.core#3.2.0", "generated"))?;
//! println!("{} of {} profiles generated", result.succeeded.len(), result.attempted);
//! ```

pub mod archive;
pub mod assets;
pub mod cache;
pub mod config;
pub mod context;
pub mod dialect;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod generator;
pub mod logging;
pub mod package;
pub mod pipeline;
pub mod resolver;
pub mod resource;

pub use assets::{AssetDirectory, DefinitionAssets};
pub use cache::{DiskPackageCache, MemoryPackageCache, PackageCache};
pub use context::{ContextBuilder, DefinitionContext};
pub use dialect::Dialect;
pub use discovery::{discover, select_profiles, ProfileSet};
pub use dispatch::{JobDispatcher, JobFailure, OutputConfig, RunResult};
pub use error::{ErrorKind, PipelineError};
pub use fetch::{DefaultFetcher, PackageFetcher};
pub use generator::{ArtifactGenerator, GenerationJob, GenerationOptions, SnapshotGenerator};
pub use package::{Package, PackageReference};
pub use pipeline::{CodegenRequest, Pipeline};
pub use resolver::PackageResolver;
