//! Filesystem layout under the data root.

use crate::error::BuildError;
use crate::store::STORE_FILE_NAME;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix of numbered release names
const RELEASE_PREFIX: &str = "release-";

/// Shared vendor cache directory under the data root
pub const VENDOR_DIR_NAME: &str = "vendor";

/// Paths used by one repository's builds
#[derive(Debug, Clone)]
pub struct ReleaseLayout {
    data_root: PathBuf,
    repository: String,
}

impl ReleaseLayout {
    /// Layout for `repository` under `data_root`.
    ///
    /// The identifier must already be valid; see [`validate_identifier`].
    pub fn new(data_root: impl Into<PathBuf>, repository: &str) -> Self {
        Self {
            data_root: data_root.into(),
            repository: repository.to_string(),
        }
    }

    /// Data root
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// `<data>/vendor`
    pub fn vendor_root(&self) -> PathBuf {
        self.data_root.join(VENDOR_DIR_NAME)
    }

    /// `<data>/<repo>`
    pub fn repository_dir(&self) -> PathBuf {
        self.data_root.join(&self.repository)
    }

    /// `<data>/<repo>/git`
    pub fn mirror_dir(&self) -> PathBuf {
        self.repository_dir().join("git")
    }

    /// `<data>/<repo>/releases`
    pub fn releases_dir(&self) -> PathBuf {
        self.repository_dir().join("releases")
    }

    /// `<data>/<repo>/default/parameters.yml`
    pub fn overlay_source(&self) -> PathBuf {
        self.repository_dir().join("default").join("parameters.yml")
    }

    /// `<data>/<repo>/.release.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.repository_dir().join(".release.lock")
    }

    /// Working directory of a release
    pub fn release_dir(&self, release: &str) -> PathBuf {
        self.releases_dir().join(release)
    }

    /// Packaged archive of a release
    pub fn archive_path(&self, release: &str) -> PathBuf {
        self.releases_dir().join(format!("{}.tar.gz", release))
    }

    /// Manifest of a release
    pub fn manifest_path(&self, release: &str) -> PathBuf {
        self.releases_dir().join(format!("{}.json", release))
    }

    /// Scratch tar written by the branch export
    pub fn export_tar_path(&self, release: &str) -> PathBuf {
        self.releases_dir().join(format!("{}.export.tar", release))
    }

    /// Whether `release` is taken by a directory or an archive
    fn is_used(&self, release: &str) -> bool {
        self.release_dir(release).exists() || self.archive_path(release).exists()
    }

    /// First unused release number, probing upward from 1
    pub fn next_release_number(&self) -> u32 {
        let mut number = 1;
        while self.is_used(&release_name(number)) {
            number += 1;
        }
        number
    }

    /// Create the vendor root and the next numbered release directory
    pub fn create_release(&self) -> Result<String, BuildError> {
        let vendor_root = self.vendor_root();
        std::fs::create_dir_all(&vendor_root).map_err(|source| BuildError::ReleaseDirectory {
            path: vendor_root.clone(),
            source,
        })?;

        let releases_dir = self.releases_dir();
        std::fs::create_dir_all(&releases_dir).map_err(|source| {
            BuildError::ReleaseDirectory {
                path: releases_dir.clone(),
                source,
            }
        })?;

        let mut number = self.next_release_number();
        loop {
            let name = release_name(number);
            let dir = self.release_dir(&name);
            match std::fs::create_dir(&dir) {
                Ok(()) => {
                    log::debug!("Created release directory {}", dir.display());
                    return Ok(name);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => number += 1,
                Err(source) => return Err(BuildError::ReleaseDirectory { path: dir, source }),
            }
        }
    }
}

/// `release-%04d`
pub fn release_name(number: u32) -> String {
    format!("{}{:04}", RELEASE_PREFIX, number)
}

/// Check that a repository identifier is a single safe path component
pub fn validate_identifier(repository: &str) -> Result<(), BuildError> {
    let reason = if repository.trim().is_empty() {
        Some("Repository name must not be empty")
    } else if repository.contains(['/', '\\']) {
        Some("Repository name must not contain path separators")
    } else if repository.starts_with('.') {
        Some("Repository name must not start with '.'")
    } else if repository.chars().any(char::is_control) {
        Some("Repository name must not contain control characters")
    } else if repository == VENDOR_DIR_NAME || repository == STORE_FILE_NAME {
        Some("Repository name is reserved by the data root")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BuildError::InvalidRepository {
            repository: repository.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
