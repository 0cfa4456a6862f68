//! Per-repository advisory lock.
//!
//! Serializes release numbering and vendor cache promotion between concurrent
//! invocations targeting the same repository.

use crate::error::{BuildError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Interval between lock attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(unix)]
type LockHandle = nix::fcntl::Flock<fs::File>;

#[cfg(not(unix))]
type LockHandle = fs::File;

/// Exclusive lock on a repository directory, released on drop
pub struct RepositoryLock {
    path: PathBuf,
    /// Handle that holds the flock; dropping it releases the lock.
    _handle: LockHandle,
}

impl RepositoryLock {
    /// Acquire the lock at `path`, waiting up to `timeout`
    pub async fn acquire(repository: &str, path: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();

        loop {
            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?;

            match try_lock(file)? {
                Some(handle) => return Self::hold(path, handle),
                None => {
                    if start.elapsed() >= timeout {
                        return Err(BuildError::BuildInProgress {
                            repository: repository.to_string(),
                            lock_path: path.to_path_buf(),
                        }
                        .into());
                    }
                    log::debug!("Lock {} held by another process, waiting", path.display());
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }

    fn hold(path: &Path, mut handle: LockHandle) -> Result<Self> {
        let acquired_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let lock_data = serde_json::json!({
            "pid": std::process::id(),
            "acquired_at": acquired_at,
        });

        // We hold the lock, so truncating is safe.
        handle.set_len(0)?;
        handle.write_all(lock_data.to_string().as_bytes())?;
        handle.sync_all().ok();

        Ok(Self {
            path: path.to_path_buf(),
            _handle: handle,
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for RepositoryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryLock")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Try to take the lock without blocking; `None` when another process holds it
#[cfg(unix)]
fn try_lock(file: fs::File) -> std::io::Result<Option<LockHandle>> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(handle) => Ok(Some(handle)),
        Err((_, e)) if e == Errno::EWOULDBLOCK => Ok(None),
        Err((_, e)) => Err(std::io::Error::from(e)),
    }
}

/// Platforms without flock rely on the caller running one build per repository.
#[cfg(not(unix))]
fn try_lock(file: fs::File) -> std::io::Result<Option<LockHandle>> {
    Ok(Some(file))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    #[tokio::test]
    async fn second_holder_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".release.lock");

        let held = RepositoryLock::acquire("kis", &path, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(held.path(), path.as_path());

        let second = RepositoryLock::acquire("kis", &path, Duration::from_millis(250)).await;
        assert!(matches!(
            second,
            Err(ReleaseError::Build(BuildError::BuildInProgress { .. }))
        ));
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".release.lock");

        let held = RepositoryLock::acquire("kis", &path, Duration::from_millis(100))
            .await
            .unwrap();
        drop(held);

        assert!(
            RepositoryLock::acquire("kis", &path, Duration::from_millis(100))
                .await
                .is_ok()
        );
    }
}
