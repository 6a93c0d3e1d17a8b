//! Job dispatch with per-job failure isolation.
//!
//! The dispatcher folds the profile set into a [`RunResult`]: every profile
//! gets exactly one generator call, a failing call is logged and recorded,
//! and the run always continues with the remaining profiles. Only setting up
//! the output directory can fail the run as a whole.
//!
//! # Parallelism
//!
//! By default jobs run one after another on the calling thread. With
//! [`JobDispatcher::with_workers`] they run on a dedicated bounded rayon
//! pool. The definition context is shared read-only and every job gets an
//! artifact name no other job of the run uses, so no state is shared
//! between concurrent jobs.
//!
//! A generator that panics fails only its own job.

use std::any::Any;
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::DefinitionContext;
use crate::discovery::ProfileSet;
use crate::generator::{artifact_type_name, ArtifactGenerator, GenerationJob, GenerationOptions};
use crate::package::artifact_dir;

/// Default artifact package name.
pub const DEFAULT_ARTIFACT_PACKAGE: &str = "org.hl7.fhir.example.generated";

/// Where generated artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Root output directory.
    pub output_dir: PathBuf,
    /// Dotted artifact package name; becomes nested directories below
    /// `output_dir`.
    pub artifact_package: String,
}

impl OutputConfig {
    pub fn new(output_dir: impl Into<PathBuf>, artifact_package: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            artifact_package: artifact_package.into(),
        }
    }

    /// Directory the artifacts are written to.
    pub fn artifact_dir(&self) -> PathBuf {
        artifact_dir(&self.output_dir, &self.artifact_package)
    }
}

/// A job that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub canonical_url: String,
    pub error: String,
}

/// Outcome of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Number of generator invocations.
    pub attempted: usize,
    /// Canonical URLs whose artifact was written.
    pub succeeded: Vec<String>,
    /// Jobs that failed, with their cause.
    pub failed: Vec<JobFailure>,
    /// Paths of the written artifacts, in the order of `succeeded`.
    pub artifacts: Vec<PathBuf>,
    /// Generation timestamp shared by every job of the run.
    pub timestamp: String,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors that abort a dispatch run before any job starts.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runs one generation job per profile.
pub struct JobDispatcher {
    generator: Arc<dyn ArtifactGenerator>,
    workers: usize,
}

impl JobDispatcher {
    pub fn new(generator: Arc<dyn ArtifactGenerator>) -> Self {
        Self {
            generator,
            workers: 1,
        }
    }

    /// Run jobs on a pool of `workers` threads. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Generate one artifact per profile.
    pub fn dispatch(
        &self,
        context: &DefinitionContext,
        profiles: &ProfileSet,
        output: &OutputConfig,
    ) -> Result<RunResult, DispatchError> {
        let dir = output.artifact_dir();
        fs::create_dir_all(&dir).map_err(|source| DispatchError::OutputDir {
            path: dir.clone(),
            source,
        })?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let options = GenerationOptions::for_dialect(context.dialect());

        info!(
            package = %context.package_key(),
            profiles = profiles.len(),
            output = %dir.display(),
            workers = self.workers,
            "Starting generation run"
        );
        debug!(
            command = %equivalent_command(context, profiles, output),
            "Equivalent command line"
        );

        let jobs: Vec<GenerationJob> = profiles
            .iter()
            .zip(artifact_names(context, profiles))
            .map(|(canonical_url, artifact_name)| GenerationJob {
                canonical_url: canonical_url.clone(),
                timestamp: timestamp.clone(),
                output_dir: dir.clone(),
                artifact_package: output.artifact_package.clone(),
                artifact_name,
                options: options.clone(),
            })
            .collect();

        let outcomes = self.run_jobs(&jobs, context);

        let mut result = RunResult {
            attempted: jobs.len(),
            timestamp,
            ..RunResult::default()
        };
        for (job, outcome) in jobs.into_iter().zip(outcomes) {
            match outcome {
                Ok(path) => {
                    result.succeeded.push(job.canonical_url);
                    result.artifacts.push(path);
                }
                Err(error) => result.failed.push(JobFailure {
                    canonical_url: job.canonical_url,
                    error,
                }),
            }
        }

        info!(
            attempted = result.attempted,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Generation run complete"
        );
        Ok(result)
    }

    fn run_jobs(
        &self,
        jobs: &[GenerationJob],
        context: &DefinitionContext,
    ) -> Vec<Result<PathBuf, String>> {
        if self.workers > 1 && jobs.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .thread_name(|i| format!("profilegen-worker-{i}"))
                .build()
            {
                Ok(pool) => {
                    return pool.install(|| {
                        jobs.par_iter()
                            .map(|job| self.run_job(job, context))
                            .collect()
                    });
                }
                Err(e) => warn!(error = %e, "Failed to start worker pool, running sequentially"),
            }
        }

        jobs.iter().map(|job| self.run_job(job, context)).collect()
    }

    fn run_job(&self, job: &GenerationJob, context: &DefinitionContext) -> Result<PathBuf, String> {
        info!(profile = %job.canonical_url, artifact = %job.artifact_name, "Generating");
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.generator.generate(job, context)));
        match outcome {
            Ok(Ok(path)) => {
                debug!(profile = %job.canonical_url, path = %path.display(), "Artifact written");
                Ok(path)
            }
            Ok(Err(e)) => {
                warn!(profile = %job.canonical_url, error = %e, "Generation failed");
                Err(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(profile = %job.canonical_url, panic = %message, "Generator panicked");
                Err(format!("generator panicked: {message}"))
            }
        }
    }
}

/// One artifact name per profile, in profile order.
///
/// Profiles with the same preferred name get a numeric suffix in canonical
/// URL order (`Patient`, `Patient2`, ...). Names are compared
/// case-insensitively so they stay distinct on case-folding filesystems.
fn artifact_names(context: &DefinitionContext, profiles: &ProfileSet) -> Vec<String> {
    let mut taken = HashSet::new();
    profiles
        .iter()
        .map(|canonical_url| {
            let preferred = artifact_type_name(context.get(canonical_url), canonical_url);
            let mut name = preferred.clone();
            let mut suffix = 2;
            while !taken.insert(name.to_lowercase()) {
                name = format!("{preferred}{suffix}");
                suffix += 1;
            }
            if name != preferred {
                debug!(
                    profile = %canonical_url,
                    artifact = %name,
                    "Artifact name already taken, renamed"
                );
            }
            name
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn equivalent_command(
    context: &DefinitionContext,
    profiles: &ProfileSet,
    output: &OutputConfig,
) -> String {
    let mut command = format!(
        "profilegen generate --package {} --output {} --package-name {}",
        context.package_key(),
        output.output_dir.display(),
        output.artifact_package
    );
    for profile in profiles {
        command.push_str(" --profile ");
        command.push_str(profile);
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::tgz;
    use crate::assets::{AssetError, DefinitionAssets};
    use crate::context::ContextBuilder;
    use crate::dialect::Dialect;
    use crate::generator::{GenerationError, SnapshotGenerator};
    use crate::package::Package;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EmptyAssets;

    impl DefinitionAssets for EmptyAssets {
        fn open_definitions(&self, _dialect: Dialect) -> Result<Box<dyn Read + Send>, AssetError> {
            Ok(Box::new(Cursor::new(tgz(&[]))))
        }
    }

    /// Records every job and fails the ones whose URL contains "fail".
    #[derive(Default)]
    struct RecordingGenerator {
        jobs: Mutex<Vec<GenerationJob>>,
    }

    impl ArtifactGenerator for RecordingGenerator {
        fn generate(
            &self,
            job: &GenerationJob,
            _context: &DefinitionContext,
        ) -> Result<PathBuf, GenerationError> {
            self.jobs.lock().unwrap().push(job.clone());
            if job.canonical_url.contains("fail") {
                return Err(GenerationError::Failed("engineered failure".into()));
            }
            let name = job.canonical_url.rsplit('/').next().unwrap_or("artifact");
            let path = job.output_dir.join(format!("{name}.txt"));
            fs::write(&path, &job.canonical_url).unwrap();
            Ok(path)
        }
    }

    /// Panics on every URL ending in "/b".
    struct PanickingGenerator {
        inner: RecordingGenerator,
    }

    impl ArtifactGenerator for PanickingGenerator {
        fn generate(
            &self,
            job: &GenerationJob,
            context: &DefinitionContext,
        ) -> Result<PathBuf, GenerationError> {
            if job.canonical_url.ends_with("/b") {
                panic!("broken profile {}", job.canonical_url);
            }
            self.inner.generate(job, context)
        }
    }

    fn context_with(files: &[(&str, &str)]) -> DefinitionContext {
        let mut all = vec![(
            "package/package.json",
            r#"{"name":"dk.core","version":"1.0.0","fhirVersions":["4.0.1"]}"#,
        )];
        all.extend_from_slice(files);
        let package = Package::from_bytes(&tgz(&all)).unwrap();
        ContextBuilder::new(&EmptyAssets).build(&package).unwrap()
    }

    fn context() -> DefinitionContext {
        context_with(&[])
    }

    fn profiles(urls: &[&str]) -> ProfileSet {
        urls.iter().map(|url| url.to_string()).collect()
    }

    #[test]
    fn test_failure_is_isolated() {
        let temp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let dispatcher = JobDispatcher::new(generator.clone());
        let output = OutputConfig::new(temp.path(), "org.example.gen");

        let result = dispatcher
            .dispatch(
                &context(),
                &profiles(&["http://x/sd/a", "http://x/sd/b-fail", "http://x/sd/c"]),
                &output,
            )
            .unwrap();

        assert_eq!(result.attempted, 3);
        assert_eq!(result.succeeded, vec!["http://x/sd/a", "http://x/sd/c"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].canonical_url, "http://x/sd/b-fail");
        assert!(result.failed[0].error.contains("engineered failure"));
        assert!(temp.path().join("org/example/gen/a.txt").is_file());
        assert!(temp.path().join("org/example/gen/c.txt").is_file());
        assert_eq!(generator.jobs.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_jobs_share_timestamp_and_options() {
        let temp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let dispatcher = JobDispatcher::new(generator.clone());
        let output = OutputConfig::new(temp.path(), "org.example");

        let result = dispatcher
            .dispatch(&context(), &profiles(&["http://x/a", "http://x/b"]), &output)
            .unwrap();

        let jobs = generator.jobs.lock().unwrap();
        assert!(jobs.iter().all(|job| job.timestamp == result.timestamp));
        assert!(jobs.iter().all(|job| job.options.version_tag == "r4"));
        assert!(jobs
            .iter()
            .all(|job| job.output_dir == temp.path().join("org/example")));
        assert!(jobs.iter().all(|job| job.artifact_package == "org.example"));
    }

    #[test]
    fn test_zero_jobs() {
        let temp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let dispatcher = JobDispatcher::new(generator.clone());
        let output = OutputConfig::new(temp.path(), "org.example");

        let result = dispatcher
            .dispatch(&context(), &ProfileSet::new(), &output)
            .unwrap();

        assert_eq!(result.attempted, 0);
        assert!(result.is_success());
        assert!(generator.jobs.lock().unwrap().is_empty());
        assert!(temp.path().join("org/example").is_dir());
    }

    #[test]
    fn test_parallel_dispatch_collects_every_job() {
        let temp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let dispatcher = JobDispatcher::new(generator.clone()).with_workers(4);
        let output = OutputConfig::new(temp.path(), "org.example");

        let urls: Vec<String> = (0..20)
            .map(|i| {
                if i % 5 == 0 {
                    format!("http://x/sd/p{i:02}-fail")
                } else {
                    format!("http://x/sd/p{i:02}")
                }
            })
            .collect();
        let set: ProfileSet = urls.iter().cloned().collect();

        let result = dispatcher.dispatch(&context(), &set, &output).unwrap();

        assert_eq!(result.attempted, 20);
        assert_eq!(result.failed.len(), 4);
        assert_eq!(result.succeeded.len(), 16);
        assert_eq!(generator.jobs.lock().unwrap().len(), 20);
    }

    #[test]
    fn test_output_dir_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"not a dir").unwrap();

        let generator = Arc::new(RecordingGenerator::default());
        let dispatcher = JobDispatcher::new(generator.clone());
        let output = OutputConfig::new(&blocker, "org.example");

        let result = dispatcher.dispatch(&context(), &profiles(&["http://x/a"]), &output);
        assert!(matches!(result, Err(DispatchError::OutputDir { .. })));
        assert!(generator.jobs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_equivalent_command() {
        let output = OutputConfig::new("/out", "org.example");
        let command = equivalent_command(&context(), &profiles(&["http://x/a"]), &output);
        assert_eq!(
            command,
            "profilegen generate --package dk.core#1.0.0 --output /out --package-name org.example --profile http://x/a"
        );
    }

    #[test]
    fn test_panicking_job_is_isolated() {
        for workers in [1, 3] {
            let temp = TempDir::new().unwrap();
            let generator = Arc::new(PanickingGenerator {
                inner: RecordingGenerator::default(),
            });
            let dispatcher = JobDispatcher::new(generator.clone()).with_workers(workers);
            let output = OutputConfig::new(temp.path(), "org.example");

            let set = profiles(&["http://x/a", "http://x/b", "http://x/c"]);
            let result = dispatcher.dispatch(&context(), &set, &output).unwrap();

            assert_eq!(result.attempted, 3);
            assert_eq!(result.succeeded, vec!["http://x/a", "http://x/c"]);
            assert_eq!(result.failed.len(), 1);
            assert_eq!(result.failed[0].canonical_url, "http://x/b");
            assert!(result.failed[0].error.contains("broken profile http://x/b"));
            assert!(temp.path().join("org/example/c.txt").is_file());
        }
    }

    #[test]
    fn test_same_named_profiles_get_distinct_artifacts() {
        let context = context_with(&[
            (
                "package/StructureDefinition-one.json",
                r#"{"resourceType":"StructureDefinition","url":"http://a/sd/one","name":"Shared"}"#,
            ),
            (
                "package/StructureDefinition-two.json",
                r#"{"resourceType":"StructureDefinition","url":"http://b/sd/two","name":"shared"}"#,
            ),
            (
                "package/StructureDefinition-three.json",
                r#"{"resourceType":"StructureDefinition","url":"http://c/sd/three","id":"other"}"#,
            ),
        ]);
        let set = profiles(&["http://a/sd/one", "http://b/sd/two", "http://c/sd/three"]);

        for workers in [1, 3] {
            let temp = TempDir::new().unwrap();
            let dispatcher =
                JobDispatcher::new(Arc::new(SnapshotGenerator::new())).with_workers(workers);
            let output = OutputConfig::new(temp.path(), "org.x");

            let result = dispatcher.dispatch(&context, &set, &output).unwrap();

            assert_eq!(result.succeeded.len(), 3);
            let dir = temp.path().join("org/x");
            assert_eq!(
                result.artifacts,
                vec![
                    dir.join("Shared.json"),
                    dir.join("Shared2.json"),
                    dir.join("Other.json")
                ]
            );
            assert_eq!(fs::read_dir(&dir).unwrap().count(), 3);

            let second: serde_json::Value =
                serde_json::from_slice(&fs::read(dir.join("Shared2.json")).unwrap()).unwrap();
            assert_eq!(second["canonical"], "http://b/sd/two");
            assert_eq!(second["typeName"], "Shared2");
        }
    }

    #[test]
    fn test_artifact_names_are_case_insensitively_unique() {
        let context = context_with(&[
            (
                "package/StructureDefinition-a.json",
                r#"{"resourceType":"StructureDefinition","url":"http://x/a","id":"dk-core-patient"}"#,
            ),
            (
                "package/StructureDefinition-b.json",
                r#"{"resourceType":"StructureDefinition","url":"http://x/b","name":"DkCorePatient"}"#,
            ),
        ]);
        let set = profiles(&["http://x/a", "http://x/b", "http://x/zz-other"]);
        assert_eq!(
            artifact_names(&context, &set),
            vec!["DkCorePatient", "DkCorePatient2", "ZzOther"]
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("plain");
        assert_eq!(panic_message(payload.as_ref()), "plain");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_with_workers_clamps_zero() {
        let dispatcher = JobDispatcher::new(Arc::new(RecordingGenerator::default()));
        assert_eq!(dispatcher.with_workers(0).workers(), 1);
    }
}
