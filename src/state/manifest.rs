//! Release manifest tracking and serialization.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current version of the manifest format
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Phase of a release build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePhase {
    /// Release directory created
    Prepared,
    /// Mirror cloned and fetched
    MirrorUpdated,
    /// Branch exported into the release directory
    Exported,
    /// Dependencies installed or linked from the cache
    DependenciesReady,
    /// Installer removed and runtime directories reset
    CleanedUp,
    /// Archive written
    Packaged,
    /// Release completed successfully
    Completed,
    /// Release failed
    Failed,
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleasePhase::Prepared => write!(f, "Prepared"),
            ReleasePhase::MirrorUpdated => write!(f, "Mirror Updated"),
            ReleasePhase::Exported => write!(f, "Exported"),
            ReleasePhase::DependenciesReady => write!(f, "Dependencies Ready"),
            ReleasePhase::CleanedUp => write!(f, "Cleaned Up"),
            ReleasePhase::Packaged => write!(f, "Packaged"),
            ReleasePhase::Completed => write!(f, "Completed"),
            ReleasePhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Status document written next to every release directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Version of the manifest format
    pub format_version: u32,
    /// Repository identifier
    pub repository: String,
    /// Release name (`release-NNNN`)
    pub release: String,
    /// Exported branch
    pub branch: String,
    /// Commit the branch pointed at when exported
    pub commit: Option<String>,
    /// SHA-1 of the dependency lock file
    pub lock_hash: Option<String>,
    /// Whether dependencies were freshly installed (false when the cache was reused)
    pub fresh_vendor: Option<bool>,
    /// Archive path once packaged
    pub archive: Option<PathBuf>,
    /// Tag created for the release
    pub tag: Option<String>,
    /// Current phase
    pub phase: ReleasePhase,
    /// Phase the build was in when it failed
    pub failed_phase: Option<ReleasePhase>,
    /// Failure message
    pub error: Option<String>,
    /// Timestamp when the build started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp of the last update
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ReleaseManifest {
    /// New manifest in the `Prepared` phase
    pub fn new(repository: &str, release: &str, branch: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            repository: repository.to_string(),
            release: release.to_string(),
            branch: branch.to_string(),
            commit: None,
            lock_hash: None,
            fresh_vendor: None,
            archive: None,
            tag: None,
            phase: ReleasePhase::Prepared,
            failed_phase: None,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Set current phase
    pub fn set_phase(&mut self, phase: ReleasePhase) {
        self.phase = phase;
        self.updated_at = chrono::Utc::now();
    }

    /// Record a failure in the current phase
    pub fn fail(&mut self, message: String) {
        if self.phase != ReleasePhase::Failed {
            self.failed_phase = Some(self.phase);
        }
        self.error = Some(message);
        self.set_phase(ReleasePhase::Failed);
    }

    /// Whether the release finished
    pub fn is_complete(&self) -> bool {
        self.phase == ReleasePhase::Completed
    }

    /// Get elapsed time
    pub fn elapsed_time(&self) -> chrono::Duration {
        self.updated_at - self.started_at
    }

    /// Save to `path` atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        super::write_json_atomic(path, self)
    }

    /// Load from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Create a summary of the manifest
    pub fn summary(&self) -> String {
        format!(
            "{} of {} ({}) - {} - {} elapsed",
            self.release,
            self.repository,
            self.branch,
            self.phase,
            format_duration(self.elapsed_time())
        )
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
