//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build deployable release archives from git repositories
#[derive(Parser, Debug)]
#[command(
    name = "deploy_release",
    version,
    about = "Build deployable release archives from git repositories",
    long_about = "Mirror a git repository, export a branch, install its composer dependencies \
(reusing a cache keyed by composer.lock) and package the result as release-NNNN.tar.gz.

Usage:
  deploy_release create --repository kis
  deploy_release create --repository kis --branch develop --create-tag -n
  deploy_release repository add kis git@github.com:example/kis.git"
)]
pub struct Args {
    /// Data directory holding mirrors, releases and the vendor cache
    #[arg(long, global = true, value_name = "DIR", env = "DEPLOY_RELEASE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE", env = "DEPLOY_RELEASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a release
    #[command(alias = "release:create")]
    Create {
        /// Which repository do you want to deploy?
        #[arg(long)]
        repository: Option<String>,

        /// Branch to export
        #[arg(long, default_value = "master")]
        branch: String,

        /// Create a tag for the release
        #[arg(long)]
        create_tag: bool,

        /// Do not ask any interactive question
        #[arg(short = 'n', long)]
        no_interaction: bool,
    },

    /// Manage registered repositories
    Repository {
        /// Repository operation
        #[command(subcommand)]
        action: RepositoryAction,
    },
}

/// Repository store operations
#[derive(Subcommand, Debug, Clone)]
pub enum RepositoryAction {
    /// Register a repository
    Add {
        /// Repository name
        name: String,
        /// Clone URL
        url: String,
    },

    /// List registered repositories
    List,

    /// Show one repository
    Show {
        /// Repository name
        name: String,
    },

    /// Change a repository's URL or name
    Update {
        /// Repository name
        name: String,
        /// New clone URL
        #[arg(long)]
        url: Option<String>,
        /// New name
        #[arg(long)]
        rename: Option<String>,
    },

    /// Remove a repository
    Remove {
        /// Repository name
        name: String,
    },
}

impl Command {
    /// Command name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Repository { .. } => "repository",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Repository {
                action: RepositoryAction::Update { url: None, rename: None, .. },
            } => Err("Nothing to update: pass --url and/or --rename".to_string()),
            Command::Repository {
                action: RepositoryAction::Add { name, url },
            } if name.trim().is_empty() || url.trim().is_empty() => {
                Err("Repository name and URL must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults() {
        let args = Args::try_parse_from(["deploy_release", "create", "--repository", "kis"]).unwrap();
        match args.command {
            Command::Create {
                repository,
                branch,
                create_tag,
                no_interaction,
            } => {
                assert_eq!(repository.as_deref(), Some("kis"));
                assert_eq!(branch, "master");
                assert!(!create_tag);
                assert!(!no_interaction);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn release_create_alias_and_short_no_interaction() {
        let args = Args::try_parse_from([
            "deploy_release",
            "release:create",
            "--repository=",
            "-n",
            "--data-dir",
            "/tmp/data",
        ])
        .unwrap();

        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/data")));
        assert!(matches!(
            args.command,
            Command::Create { ref repository, no_interaction: true, .. } if repository.as_deref() == Some("")
        ));
    }

    #[test]
    fn update_requires_a_change() {
        let args =
            Args::try_parse_from(["deploy_release", "repository", "update", "kis"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from([
            "deploy_release",
            "repository",
            "update",
            "kis",
            "--url",
            "git@example.com:kis.git",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
    }
}
