//! Package manager bootstrap and the lock-hash keyed vendor cache.
//!
//! A cache entry `<data>/vendor/<sha1 of lock file>` holds one installed
//! dependency tree. Releases never own their vendor directory: after this step
//! `<release>/vendor` is always a symlink into the cache.

use crate::config::PackageManagerConfig;
use crate::error::BuildError;
use crate::process::{CommandSpec, OutputSink, ProcessRunner, run_checked};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download the installer script and run it inside `release_dir`.
///
/// Returns the path of the installed package manager binary.
pub async fn bootstrap_installer<R: ProcessRunner>(
    runner: &R,
    package_manager: &PackageManagerConfig,
    release_dir: &Path,
    timeout: Duration,
    sink: &dyn OutputSink,
) -> Result<PathBuf, BuildError> {
    let bootstrap_failed = |reason: String| BuildError::InstallerBootstrapFailed { reason };

    let download = CommandSpec::new("curl")
        .args(["-sSfL", "-o"])
        .arg(&package_manager.installer_script)
        .arg(&package_manager.installer_url)
        .current_dir(release_dir)
        .timeout(timeout);
    run_checked(runner, &download, sink)
        .await
        .map_err(|failure| bootstrap_failed(failure.to_string()))?;

    let install = CommandSpec::new(&package_manager.interpreter)
        .arg(&package_manager.installer_script)
        .arg("--quiet")
        .current_dir(release_dir)
        .timeout(timeout);
    run_checked(runner, &install, sink)
        .await
        .map_err(|failure| bootstrap_failed(failure.to_string()))?;

    let binary = release_dir.join(&package_manager.binary);
    if !binary.is_file() {
        return Err(bootstrap_failed(format!(
            "installer finished but {} was not created",
            binary.display()
        )));
    }

    Ok(binary)
}

/// Lowercase hex SHA-1 of the lock file at `path`
pub async fn hash_lock_file(path: &Path) -> Result<String, BuildError> {
    use sha1::Digest as _;

    let lock_path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let data = std::fs::read(&lock_path)?;
        let mut hasher = sha1::Sha1::new();
        hasher.update(&data);
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| BuildError::DependencyInstallFailed {
        reason: format!("Lock file hashing task failed: {}", e),
    })?;

    match result {
        Ok(hash) => Ok(hash),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BuildError::LockFileMissing {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(BuildError::DependencyInstallFailed {
            reason: format!("could not read {}: {}", path.display(), e),
        }),
    }
}

/// Run the dependency install command inside `release_dir`
pub async fn install_dependencies<R: ProcessRunner>(
    runner: &R,
    package_manager: &PackageManagerConfig,
    release_dir: &Path,
    timeout: Duration,
    sink: &dyn OutputSink,
) -> Result<PathBuf, BuildError> {
    let spec = CommandSpec::new(&package_manager.interpreter)
        .arg(&package_manager.binary)
        .args(package_manager.install_args.iter().cloned())
        .current_dir(release_dir)
        .timeout(timeout);

    run_checked(runner, &spec, sink)
        .await
        .map_err(|failure| BuildError::DependencyInstallFailed {
            reason: failure.to_string(),
        })?;

    let vendor = release_dir.join(&package_manager.vendor_dir);
    let is_real_dir = std::fs::symlink_metadata(&vendor)
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_real_dir {
        return Err(BuildError::DependencyInstallFailed {
            reason: format!("install finished but {} is missing", vendor.display()),
        });
    }

    Ok(vendor)
}

/// Shared cache of installed dependency trees
#[derive(Debug, Clone)]
pub struct VendorCache {
    root: PathBuf,
}

impl VendorCache {
    /// Cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Entry path for `hash`, whether or not it exists
    pub fn entry(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    /// Existing entry for `hash`
    pub fn lookup(&self, hash: &str) -> Option<PathBuf> {
        let entry = self.entry(hash);
        entry.is_dir().then_some(entry)
    }

    /// Point `release_vendor` at `entry`, replacing whatever was there
    pub fn link(&self, entry: &Path, release_vendor: &Path) -> Result<(), BuildError> {
        remove_existing(release_vendor)
            .and_then(|()| symlink_dir(entry, release_vendor))
            .map_err(|e| BuildError::DependencyInstallFailed {
                reason: format!(
                    "could not link {} to {}: {}",
                    release_vendor.display(),
                    entry.display(),
                    e
                ),
            })
    }

    /// Move a freshly installed `release_vendor` into the cache under `hash`
    /// and link it back.
    ///
    /// When another build already promoted the same hash, the local copy is
    /// discarded and the existing entry is linked instead.
    pub fn promote(&self, hash: &str, release_vendor: &Path) -> Result<PathBuf, BuildError> {
        let entry = self.entry(hash);

        if let Err(e) = std::fs::rename(release_vendor, &entry) {
            if !entry.is_dir() {
                return Err(BuildError::DependencyInstallFailed {
                    reason: format!(
                        "could not move {} to {}: {}",
                        release_vendor.display(),
                        entry.display(),
                        e
                    ),
                });
            }
            log::warn!(
                "Vendor cache entry {} appeared concurrently, reusing it",
                entry.display()
            );
        }

        self.link(&entry, release_vendor)?;
        Ok(entry)
    }
}

/// Remove a file, symlink or directory tree; a missing path is fine
pub(crate) fn remove_existing(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => remove_link_or_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn remove_link_or_file(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path)
}

// Directory symlinks on Windows are removed as directories.
#[cfg(windows)]
fn remove_link_or_file(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path).or_else(|_| std::fs::remove_dir(path))
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_is_sha1_hex() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("composer.lock");
        std::fs::write(&lock, b"abc").unwrap();

        assert_eq!(
            hash_lock_file(&lock).await.unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[tokio::test]
    async fn missing_lock_file_is_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("composer.lock");

        assert!(matches!(
            hash_lock_file(&lock).await,
            Err(BuildError::LockFileMissing { path }) if path == lock
        ));
    }

    #[test]
    fn promote_moves_and_links_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VendorCache::new(dir.path().join("cache"));
        std::fs::create_dir_all(dir.path().join("cache")).unwrap();
        let vendor = dir.path().join("release/vendor");
        std::fs::create_dir_all(&vendor).unwrap();
        std::fs::write(vendor.join("autoload.php"), b"<?php").unwrap();

        let entry = cache.promote("abc", &vendor).unwrap();

        assert_eq!(entry, dir.path().join("cache/abc"));
        assert!(entry.join("autoload.php").is_file());
        assert!(std::fs::symlink_metadata(&vendor).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&vendor).unwrap(), entry);
        assert_eq!(cache.lookup("abc"), Some(entry));
    }

    #[test]
    fn promote_reuses_concurrent_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VendorCache::new(dir.path().join("cache"));
        let existing = cache.entry("abc");
        std::fs::create_dir_all(existing.join("pkg")).unwrap();
        std::fs::write(existing.join("pkg/marker"), b"first").unwrap();

        let vendor = dir.path().join("release/vendor");
        std::fs::create_dir_all(vendor.join("pkg")).unwrap();
        std::fs::write(vendor.join("pkg/marker"), b"second").unwrap();

        cache.promote("abc", &vendor).unwrap();

        assert_eq!(std::fs::read(vendor.join("pkg/marker")).unwrap(), b"first");
        assert!(std::fs::symlink_metadata(&vendor).unwrap().file_type().is_symlink());
    }

    #[test]
    fn lookup_misses_unknown_hash() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VendorCache::new(dir.path());
        assert_eq!(cache.lookup("missing"), None);
    }
}
