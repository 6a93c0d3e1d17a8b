//! Package cache CLI commands.

use clap::Subcommand;
use profilegen::cache::PackageCache;
use profilegen::config::ConfigFile;
use profilegen::DiskPackageCache;

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List cached packages
    List,
    /// Show the cache directory
    Path,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, config: &ConfigFile) -> Result<(), CliError> {
    let cache_dir = &config.cache.directory;

    match action {
        CacheAction::List => {
            let cache = DiskPackageCache::open(cache_dir)?;
            let entries = cache.entries()?;

            println!("Package cache: {}", cache_dir.display());
            if entries.is_empty() {
                println!("  (empty)");
            }
            for entry in &entries {
                match &entry.source {
                    Some(source) => println!("  {}  from {}", entry, source),
                    None => println!("  {}", entry),
                }
            }
            Ok(())
        }
        CacheAction::Path => {
            println!("{}", cache_dir.display());
            Ok(())
        }
    }
}
