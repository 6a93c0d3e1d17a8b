//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use profilegen::config::ConfigFile;
use profilegen::{
    AssetDirectory, DefaultFetcher, DiskPackageCache, PackageResolver, Pipeline,
    SnapshotGenerator,
};

use crate::error::CliError;

/// Where packages and base definitions come from.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Package cache directory (overrides cache.directory)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Directory holding base definitions per FHIR release (overrides assets.directory)
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,
}

impl SourceArgs {
    /// Cache directory, CLI first, then config.
    pub fn cache_dir(&self, config: &ConfigFile) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| config.cache.directory.clone())
    }

    /// Asset directory, CLI first, then config.
    pub fn assets_dir(&self, config: &ConfigFile) -> PathBuf {
        self.assets_dir
            .clone()
            .unwrap_or_else(|| config.assets.directory.clone())
    }
}

/// Assemble a pipeline backed by the disk cache and the HTTP fetcher.
pub fn build_pipeline(
    sources: &SourceArgs,
    config: &ConfigFile,
    workers: usize,
) -> Result<Pipeline, CliError> {
    let assets_dir = sources.assets_dir(config);
    let cache = DiskPackageCache::open(sources.cache_dir(config))?;
    let fetcher = DefaultFetcher::with_timeout(Duration::from_secs(config.network.timeout_secs))?;
    let resolver = PackageResolver::new(Arc::new(cache), Arc::new(fetcher))
        .with_asset_root(assets_dir.clone());

    Ok(Pipeline::new(
        resolver,
        Arc::new(AssetDirectory::new(assets_dir)),
        Arc::new(SnapshotGenerator::new()),
    )
    .with_workers(workers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_directories_override_config() {
        let config = ConfigFile::default();
        let args = SourceArgs {
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            assets_dir: None,
        };
        assert_eq!(args.cache_dir(&config), PathBuf::from("/tmp/cache"));
        assert_eq!(args.assets_dir(&config), config.assets.directory);
    }
}
