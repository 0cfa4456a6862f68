//! Bare git mirror maintenance and branch export.

use crate::error::{BuildError, ProcessFailure};
use crate::process::{CommandSpec, OutputSink, ProcessRunner, run_checked};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static BRANCH_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._/-]*$").expect("branch pattern is valid")
});

static COMMIT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{40}(?:[0-9a-f]{24})?$").expect("commit pattern is valid")
});

/// Reject branch names that could be read as options or are not valid refs
pub fn validate_branch(branch: &str) -> Result<(), BuildError> {
    let reason = if branch.is_empty() {
        Some("branch name must not be empty")
    } else if !BRANCH_CHARS.is_match(branch) {
        Some("only letters, digits, '.', '_', '-' and '/' are allowed, and it must not start with '-', '/' or '.'")
    } else if branch.contains("..") || branch.contains("//") {
        Some("branch name must not contain '..' or '//'")
    } else if branch.ends_with('/') || branch.ends_with('.') || branch.ends_with(".lock") {
        Some("branch name must not end with '/', '.' or '.lock'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BuildError::InvalidBranch {
            branch: branch.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// A bare mirror clone of one repository
#[derive(Debug, Clone)]
pub struct GitMirror {
    dir: PathBuf,
    timeout: Duration,
}

impl GitMirror {
    /// Mirror at `dir`; every git call is limited to `timeout`
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Mirror directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new("git")
            .current_dir(&self.dir)
            .timeout(self.timeout)
    }

    /// Clone from `source_url` unless the mirror already exists.
    ///
    /// The clone lands in a `.partial` sibling and is renamed into place only
    /// once git succeeds, so an interrupted clone is never mistaken for a
    /// mirror. Returns whether a clone happened.
    pub async fn ensure_cloned<R: ProcessRunner>(
        &self,
        runner: &R,
        source_url: &str,
        sink: &dyn OutputSink,
    ) -> Result<bool, BuildError> {
        if self.dir.exists() {
            log::debug!("Mirror {} already present", self.dir.display());
            return Ok(false);
        }

        let partial = self.partial_dir();
        discard_dir(&partial).map_err(|source| BuildError::MirrorDirectory {
            path: partial.clone(),
            source,
        })?;

        let spec = CommandSpec::new("git")
            .args(["clone", "--mirror", "--"])
            .arg(source_url)
            .path_arg(&partial)
            .timeout(self.timeout);

        if let Err(failure) = run_checked(runner, &spec, sink).await {
            if let Err(e) = discard_dir(&partial) {
                log::warn!("Could not remove {}: {}", partial.display(), e);
            }
            return Err(BuildError::MirrorCloneFailed {
                source_url: source_url.to_string(),
                failure,
            });
        }

        std::fs::rename(&partial, &self.dir).map_err(|source| BuildError::MirrorDirectory {
            path: self.dir.clone(),
            source,
        })?;

        Ok(true)
    }

    /// Scratch directory an in-flight clone is written to
    pub fn partial_dir(&self) -> PathBuf {
        let mut name = self.dir.clone().into_os_string();
        name.push(".partial");
        PathBuf::from(name)
    }

    /// Fetch every remote ref into the mirror
    pub async fn fetch<R: ProcessRunner>(
        &self,
        runner: &R,
        sink: &dyn OutputSink,
    ) -> Result<(), BuildError> {
        let spec = self.git().args(["fetch", "--all", "--prune"]);
        run_checked(runner, &spec, sink)
            .await
            .map_err(BuildError::MirrorFetchFailed)?;
        Ok(())
    }

    /// Commit id of `branch`, which must exist in the mirror
    pub async fn resolve_branch<R: ProcessRunner>(
        &self,
        runner: &R,
        branch: &str,
        sink: &dyn OutputSink,
    ) -> Result<String, BuildError> {
        let spec = self
            .git()
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("refs/heads/{}^{{commit}}", branch));

        let outcome = run_checked(runner, &spec, sink).await.map_err(|failure| {
            BuildError::BranchExportFailed {
                branch: branch.to_string(),
                reason: describe_lookup_failure(&failure),
            }
        })?;

        let commit = outcome
            .stdout
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        if !COMMIT_ID.is_match(commit) {
            return Err(BuildError::BranchExportFailed {
                branch: branch.to_string(),
                reason: format!("unexpected rev-parse output '{}'", commit),
            });
        }

        Ok(commit.to_string())
    }

    /// Write `commit`'s tree to `scratch_tar` and unpack it into `dest`.
    ///
    /// The scratch tar is removed whether or not unpacking succeeds.
    pub async fn export<R: ProcessRunner>(
        &self,
        runner: &R,
        branch: &str,
        commit: &str,
        scratch_tar: &Path,
        dest: &Path,
        sink: &dyn OutputSink,
    ) -> Result<(), BuildError> {
        let export_failed = |reason: String| BuildError::BranchExportFailed {
            branch: branch.to_string(),
            reason,
        };

        let spec = self
            .git()
            .args(["archive", "--format=tar"])
            .arg(format!("--output={}", scratch_tar.display()))
            .arg(commit);
        run_checked(runner, &spec, sink)
            .await
            .map_err(|failure| export_failed(failure.to_string()))?;

        let tar_path = scratch_tar.to_path_buf();
        let dest_dir = dest.to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || unpack_tar(&tar_path, &dest_dir))
            .await
            .map_err(|e| export_failed(format!("unpack task failed: {}", e)))
            .and_then(|result| {
                result.map_err(|e| export_failed(format!("could not unpack archive: {}", e)))
            });

        if let Err(e) = std::fs::remove_file(scratch_tar) {
            log::warn!("Could not remove {}: {}", scratch_tar.display(), e);
        }

        unpacked
    }

    /// Tag `commit` as `tag`, pushing it to `origin` when `push` is set
    pub async fn tag<R: ProcessRunner>(
        &self,
        runner: &R,
        tag: &str,
        commit: &str,
        push: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), BuildError> {
        let tag_failed = |failure| BuildError::TagCreationFailed {
            tag: tag.to_string(),
            failure,
        };

        let spec = self.git().arg("tag").arg(tag).arg(commit);
        run_checked(runner, &spec, sink).await.map_err(tag_failed)?;

        if push {
            let spec = self
                .git()
                .args(["push", "origin"])
                .arg(format!("refs/tags/{}", tag));
            run_checked(runner, &spec, sink).await.map_err(tag_failed)?;
        }

        Ok(())
    }
}

fn describe_lookup_failure(failure: &ProcessFailure) -> String {
    match (failure.exit_code, &failure.spawn_error) {
        (Some(1), None) if failure.timed_out.is_none() => {
            "branch does not exist in the mirror".to_string()
        }
        _ => failure.to_string(),
    }
}

fn discard_dir(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Unpack a tar file; entries that would land outside `dest` are skipped.
fn unpack_tar(tar_path: &Path, dest: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest)
}
