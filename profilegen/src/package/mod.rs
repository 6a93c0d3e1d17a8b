//! Conformance package types and parsing.
//!
//! This module provides the data structures for resolved packages and the
//! references callers use to name them.
//!
//! # Overview
//!
//! Conformance packages are distributed as NPM-style `.tgz` archives. Every
//! member lives below a `package/` root:
//!
//! ```text
//! package/
//! ├── package.json                          manifest (id, version, fhirVersions)
//! ├── .index.json                           optional type index
//! ├── StructureDefinition-dk-core-patient.json
//! └── example/
//!     └── Patient-example.json
//! ```
//!
//! - **Package**: manifest identity plus every folder, read-only
//! - **ResourceFolder**: members of one directory grouped by resource type
//! - **PackageManifest**: the subset of `package.json` the pipeline needs
//! - **PackageReference**: what the caller asked for (cache id, path or URL)

mod core;
mod error;
mod folder;
mod manifest;
mod naming;
mod reference;

// Core types
pub use core::Package;
pub use error::{PackageError, PackageResult};
pub use folder::{ResourceFolder, INDEX_FILENAME};
pub use manifest::{PackageManifest, MANIFEST_FILENAME};
pub use reference::{PackageReference, ReferenceError};

// Naming utilities
pub use naming::{
    artifact_dir, artifact_package_path, cache_key, parse_cache_key, split_member_path,
    type_name, PACKAGE_ROOT,
};
