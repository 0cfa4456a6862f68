//! Error types for deploy_release operations.
//!
//! Every failing release step maps to its own [`BuildError`] variant so the
//! CLI can name the step that stopped the pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for deploy_release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all deploy_release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Release build errors
    #[error("{0}")]
    Build(#[from] BuildError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Repository store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of an external process invoked by a release step.
#[derive(Debug, Clone)]
pub struct ProcessFailure {
    /// Rendered command line
    pub command: String,
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
    /// Timeout that elapsed, if the process was killed for running too long
    pub timed_out: Option<Duration>,
    /// Tail of the captured stderr output
    pub stderr: Vec<String>,
    /// Spawn error, if the process never started
    pub spawn_error: Option<String>,
}

impl ProcessFailure {
    /// Failure for a process that could not be started at all.
    pub fn spawn(command: impl Into<String>, error: &std::io::Error) -> Self {
        Self {
            command: command.into(),
            exit_code: None,
            timed_out: None,
            stderr: Vec::new(),
            spawn_error: Some(error.to_string()),
        }
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref error) = self.spawn_error {
            return write!(f, "`{}` could not be started: {}", self.command, error);
        }

        match (self.timed_out, self.exit_code) {
            (Some(timeout), _) => write!(
                f,
                "`{}` timed out after {}s",
                self.command,
                timeout.as_secs()
            )?,
            (None, Some(code)) => write!(f, "`{}` exited with code {}", self.command, code)?,
            (None, None) => write!(f, "`{}` was terminated by a signal", self.command)?,
        }

        if !self.stderr.is_empty() {
            write!(f, "\n{}", self.stderr.join("\n"))?;
        }

        Ok(())
    }
}

/// Errors raised while assembling a release
#[derive(Error, Debug)]
pub enum BuildError {
    /// The user declined the confirmation prompt
    #[error("Command aborted")]
    AbortedByUser,

    /// Repository identifier missing or rejected
    #[error("Invalid repository '{repository}': {reason}")]
    InvalidRepository {
        /// Repository identifier as given
        repository: String,
        /// Reason for the rejection
        reason: String,
    },

    /// Branch name failed validation
    #[error("Invalid branch '{branch}': {reason}")]
    InvalidBranch {
        /// Branch name as given
        branch: String,
        /// Reason for the rejection
        reason: String,
    },

    /// Another build holds the repository lock
    #[error("A release build for '{repository}' is already running (lock: {lock_path})")]
    BuildInProgress {
        /// Repository identifier
        repository: String,
        /// Path of the lock file
        lock_path: PathBuf,
    },

    /// Release directory could not be prepared
    #[error("Failed to prepare release directory {path}: {source}")]
    ReleaseDirectory {
        /// Directory being created
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Initial mirror clone failed
    #[error("Mirror clone from '{source_url}' failed: {failure}")]
    MirrorCloneFailed {
        /// URL being cloned
        source_url: String,
        /// Process failure details
        failure: ProcessFailure,
    },

    /// Mirror directory could not be prepared or moved into place
    #[error("Failed to prepare mirror directory {path}: {source}")]
    MirrorDirectory {
        /// Directory being prepared
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Fetching into the mirror failed
    #[error("Mirror fetch failed: {0}")]
    MirrorFetchFailed(ProcessFailure),

    /// Branch could not be exported into the release directory
    #[error("Export of branch '{branch}' failed: {reason}")]
    BranchExportFailed {
        /// Branch being exported
        branch: String,
        /// Reason for the failure
        reason: String,
    },

    /// Parameters overlay could not be copied
    #[error("Failed to copy config overlay {path}: {source}")]
    ConfigOverlayFailed {
        /// Overlay source path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Package manager installer could not be fetched or run
    #[error("Package manager bootstrap failed: {reason}")]
    InstallerBootstrapFailed {
        /// Reason for the failure
        reason: String,
    },

    /// Dependency lock file absent after export
    #[error("Lock file not found at {path}")]
    LockFileMissing {
        /// Expected lock file path
        path: PathBuf,
    },

    /// Dependency installation or cache promotion failed
    #[error("Dependency install failed: {reason}")]
    DependencyInstallFailed {
        /// Reason for the failure
        reason: String,
    },

    /// Post-install cleanup failed
    #[error("Cleanup of {path} failed: {source}")]
    CleanupFailed {
        /// Path being cleaned
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Release archive could not be written
    #[error("Packaging {archive} failed: {reason}")]
    PackagingFailed {
        /// Archive path
        archive: PathBuf,
        /// Reason for the failure
        reason: String,
    },

    /// Tagging requested while tagging is disabled
    #[error("Tag creation is not supported: {reason}")]
    TagCreationUnsupported {
        /// Why tagging is unavailable
        reason: String,
    },

    /// Tag creation or push failed
    #[error("Failed to create tag '{tag}': {failure}")]
    TagCreationFailed {
        /// Tag name
        tag: String,
        /// Process failure details
        failure: ProcessFailure,
    },
}

impl BuildError {
    /// Short name of the release step that produced this error.
    pub fn step(&self) -> &'static str {
        match self {
            BuildError::AbortedByUser => "confirmation",
            BuildError::InvalidRepository { .. } => "repository validation",
            BuildError::InvalidBranch { .. } => "branch validation",
            BuildError::BuildInProgress { .. } => "repository lock",
            BuildError::ReleaseDirectory { .. } => "release directory",
            BuildError::MirrorCloneFailed { .. } | BuildError::MirrorDirectory { .. } => {
                "mirror clone"
            }
            BuildError::MirrorFetchFailed(_) => "mirror fetch",
            BuildError::BranchExportFailed { .. } => "branch export",
            BuildError::ConfigOverlayFailed { .. } => "config overlay",
            BuildError::InstallerBootstrapFailed { .. } => "installer bootstrap",
            BuildError::LockFileMissing { .. } => "lock file hashing",
            BuildError::DependencyInstallFailed { .. } => "dependency install",
            BuildError::CleanupFailed { .. } => "cleanup",
            BuildError::PackagingFailed { .. } => "packaging",
            BuildError::TagCreationUnsupported { .. } | BuildError::TagCreationFailed { .. } => {
                "tagging"
            }
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parse error
        #[source]
        source: toml::de::Error,
    },

    /// A configured value is out of range or malformed
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue {
        /// Config key
        key: String,
        /// Reason for the error
        reason: String,
    },
}

/// Repository store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store file is corrupted
    #[error("Repository store {path} is corrupted: {reason}")]
    Corrupted {
        /// Store file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// No record with the given id or name
    #[error("Repository '{0}' not found")]
    NotFound(String),

    /// A record with the same name already exists
    #[error("Repository '{0}' already exists")]
    Duplicate(String),

    /// Failed to save the store
    #[error("Failed to save repository store: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Prompting the user failed
    #[error("Prompt failed: {reason}")]
    PromptFailed {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Build(BuildError::BuildInProgress { lock_path, .. }) => vec![
                "Wait for the running build to finish".to_string(),
                format!(
                    "If no build is running, check which process holds {}",
                    lock_path.display()
                ),
            ],
            ReleaseError::Build(BuildError::MirrorCloneFailed { source_url, .. }) => vec![
                format!("Verify the source URL is reachable: git ls-remote {}", source_url),
                "Register the correct URL: deploy_release repository update <name> --url <url>"
                    .to_string(),
            ],
            ReleaseError::Build(BuildError::MirrorFetchFailed(_)) => vec![
                "Check network access and credentials for the repository remote".to_string(),
            ],
            ReleaseError::Build(BuildError::BranchExportFailed { branch, .. }) => vec![
                format!("Make sure branch '{}' exists on the remote", branch),
                "Pass the correct branch with --branch <name>".to_string(),
            ],
            ReleaseError::Build(BuildError::LockFileMissing { .. }) => vec![
                "Commit composer.lock to the exported branch".to_string(),
            ],
            ReleaseError::Build(BuildError::InstallerBootstrapFailed { .. }) => vec![
                "Ensure curl and php are installed and on PATH".to_string(),
            ],
            ReleaseError::Build(BuildError::TagCreationUnsupported { .. }) => vec![
                "Enable tagging with `allow_tags = true` in the config file".to_string(),
                "Or run without --create-tag".to_string(),
            ],
            ReleaseError::Store(StoreError::Corrupted { path, .. }) => vec![format!(
                "Inspect or restore {} from backup",
                path.display()
            )],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
