//! Shared helper functions for command execution.

use crate::cli::Args;
use crate::config::BuilderConfig;
use crate::error::Result;
use crate::store::RepositoryStore;

/// Load configuration, letting `--data-dir` win over file and environment
pub(super) fn load_config(args: &Args) -> Result<BuilderConfig> {
    let config = BuilderConfig::load(args.config.as_deref())?;
    Ok(match &args.data_dir {
        Some(dir) => config.with_data_root(dir),
        None => config,
    })
}

/// Open the repository store under the configured data root
pub(super) fn open_store(config: &BuilderConfig) -> Result<RepositoryStore> {
    RepositoryStore::open_in(&config.absolute_data_root()?)
}

/// Known repository names followed by stored ones, without duplicates
pub(super) fn available_repositories(known: &[String], stored: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(known.len() + stored.len());
    for name in known.iter().chain(stored) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}
