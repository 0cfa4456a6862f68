//! Release assembly.
//!
//! [`ReleaseBuilder`] runs the release steps in order: mirror update, branch
//! export, config overlay, dependency install with the vendor cache, cleanup,
//! packaging and optional tagging. Any failing step stops the build. The
//! release manifest next to the release directory records how far it got.

mod cleanup;
mod layout;
mod mirror;
mod package;
mod vendor;

pub use cleanup::clean_release;
pub use layout::{ReleaseLayout, release_name, validate_identifier};
pub use mirror::{GitMirror, validate_branch};
pub use package::package_release;
pub use vendor::{VendorCache, bootstrap_installer, hash_lock_file, install_dependencies};

use crate::config::BuilderConfig;
use crate::error::{BuildError, CliError, Result};
use crate::process::{OutputSink, ProcessRunner};
use crate::prompt::{RepositoryValidator, UserPrompt};
use crate::state::{ReleaseManifest, ReleasePhase, RepositoryLock};
use crate::store::RepositoryStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parameters of one release build
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Repository identifier
    pub repository: String,
    /// Branch to export
    pub branch: String,
    /// Tag the exported commit with the release name
    pub create_tag: bool,
    /// Ask for confirmation before building
    pub interactive: bool,
}

impl ReleaseRequest {
    /// Non-interactive request for `repository` at `branch`
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            create_tag: false,
            interactive: false,
        }
    }
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    /// Release name (`release-NNNN`)
    pub release_name: String,
    /// Path of the packaged archive
    pub archive: PathBuf,
    /// Exported commit
    pub commit: String,
    /// SHA-1 of the lock file
    pub lock_hash: String,
    /// Whether dependencies were installed rather than reused from the cache
    pub fresh_vendor: bool,
    /// Tag created for the release
    pub tag: Option<String>,
}

/// Builds releases using an external process runner
pub struct ReleaseBuilder<R: ProcessRunner> {
    config: BuilderConfig,
    runner: R,
    source_urls: HashMap<String, String>,
}

impl<R: ProcessRunner> ReleaseBuilder<R> {
    /// Builder with configuration and a process runner
    pub fn new(config: BuilderConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            source_urls: HashMap::new(),
        }
    }

    /// Prefer clone URLs registered in `store` over the configured template
    pub fn with_store(mut self, store: &RepositoryStore) -> Self {
        self.source_urls = store
            .list()
            .iter()
            .map(|r| (r.name().to_string(), r.url().to_string()))
            .collect();
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Process runner in use
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Clone URL for `repository`
    pub fn source_url(&self, repository: &str) -> String {
        self.source_urls
            .get(repository)
            .cloned()
            .unwrap_or_else(|| self.config.source_url_for(repository))
    }

    /// Build one release.
    ///
    /// Nothing is written to disk before the request has been confirmed and
    /// validated.
    pub async fn run(
        &self,
        request: &ReleaseRequest,
        prompt: &dyn UserPrompt,
        validator: &dyn RepositoryValidator,
        sink: &dyn OutputSink,
    ) -> Result<ReleaseOutcome> {
        if request.interactive {
            let confirmed = prompt
                .confirm("Do you confirm generation", true)
                .map_err(|e| CliError::PromptFailed {
                    reason: e.to_string(),
                })?;
            if !confirmed {
                return Err(BuildError::AbortedByUser.into());
            }
        }

        let repository = self.validate_request(request, validator)?;

        let data_root = self.config.absolute_data_root()?;
        let layout = ReleaseLayout::new(data_root, &repository);

        let repository_dir = layout.repository_dir();
        std::fs::create_dir_all(&repository_dir).map_err(|source| {
            BuildError::ReleaseDirectory {
                path: repository_dir.clone(),
                source,
            }
        })?;
        let _lock = RepositoryLock::acquire(
            &repository,
            &layout.lock_path(),
            self.config.timeouts.lock,
        )
        .await?;

        sink.progress(&format!("Creating release for repository \"{}\"...", repository));

        let release = layout.create_release()?;
        let manifest_path = layout.manifest_path(&release);
        let mut manifest = ReleaseManifest::new(&repository, &release, &request.branch);
        manifest.save(&manifest_path)?;

        let result = self
            .assemble(&layout, &release, request, &mut manifest, &manifest_path, sink)
            .await;

        match result {
            Ok(outcome) => {
                manifest.set_phase(ReleasePhase::Completed);
                manifest.save(&manifest_path)?;
                log::info!("{}", manifest.summary());
                Ok(outcome)
            }
            Err(e) => {
                manifest.fail(e.to_string());
                if let Err(save_err) = manifest.save(&manifest_path) {
                    log::warn!(
                        "Could not record failure in {}: {}",
                        manifest_path.display(),
                        save_err
                    );
                }
                Err(e)
            }
        }
    }

    fn validate_request(
        &self,
        request: &ReleaseRequest,
        validator: &dyn RepositoryValidator,
    ) -> Result<String> {
        if request.repository.trim().is_empty() {
            return Err(BuildError::InvalidRepository {
                repository: request.repository.clone(),
                reason: "You must insert a repository name".to_string(),
            }
            .into());
        }

        let repository = validator.validate(&request.repository).map_err(|reason| {
            BuildError::InvalidRepository {
                repository: request.repository.clone(),
                reason,
            }
        })?;
        validate_identifier(&repository)?;
        validate_branch(&request.branch)?;

        if request.create_tag && !self.config.allow_tags {
            return Err(BuildError::TagCreationUnsupported {
                reason: "tagging is disabled by configuration".to_string(),
            }
            .into());
        }

        Ok(repository)
    }

    async fn assemble(
        &self,
        layout: &ReleaseLayout,
        release: &str,
        request: &ReleaseRequest,
        manifest: &mut ReleaseManifest,
        manifest_path: &Path,
        sink: &dyn OutputSink,
    ) -> Result<ReleaseOutcome> {
        let timeouts = &self.config.timeouts;
        let pm = &self.config.package_manager;
        let release_dir = layout.release_dir(release);
        let repository = manifest.repository.clone();

        // Mirror
        let mirror = GitMirror::new(layout.mirror_dir(), timeouts.git);
        let source_url = self.source_url(&repository);
        sink.progress(&format!("Updating mirror of {}", source_url));
        if mirror.ensure_cloned(&self.runner, &source_url, sink).await? {
            log::info!("Cloned {} into {}", source_url, mirror.dir().display());
        }
        mirror.fetch(&self.runner, sink).await?;
        advance(manifest, ReleasePhase::MirrorUpdated, manifest_path)?;

        // Export
        sink.progress(&format!("Exporting branch {}", request.branch));
        let commit = mirror
            .resolve_branch(&self.runner, &request.branch, sink)
            .await?;
        mirror
            .export(
                &self.runner,
                &request.branch,
                &commit,
                &layout.export_tar_path(release),
                &release_dir,
                sink,
            )
            .await?;
        manifest.commit = Some(commit.clone());
        advance(manifest, ReleasePhase::Exported, manifest_path)?;

        // Config overlay
        let overlay = layout.overlay_source();
        if overlay.is_file() {
            sink.progress("Copying parameters overlay");
            let target = release_dir.join(&self.config.overlay_target);
            copy_overlay(&overlay, &target)?;
        } else {
            log::debug!("No overlay at {}", overlay.display());
        }

        // Dependencies
        sink.progress("Bootstrapping package manager");
        bootstrap_installer(&self.runner, pm, &release_dir, timeouts.installer, sink).await?;

        let lock_hash = hash_lock_file(&release_dir.join(&pm.lock_file)).await?;
        manifest.lock_hash = Some(lock_hash.clone());

        let cache = VendorCache::new(layout.vendor_root());
        let release_vendor = release_dir.join(&pm.vendor_dir);
        let fresh_vendor = match cache.lookup(&lock_hash) {
            Some(entry) => {
                sink.progress(&format!("Reusing cached dependencies {}", lock_hash));
                cache.link(&entry, &release_vendor)?;
                false
            }
            None => {
                sink.progress("Installing dependencies");
                install_dependencies(&self.runner, pm, &release_dir, timeouts.install, sink)
                    .await?;
                cache.promote(&lock_hash, &release_vendor)?;
                true
            }
        };
        manifest.fresh_vendor = Some(fresh_vendor);
        advance(manifest, ReleasePhase::DependenciesReady, manifest_path)?;

        // Cleanup
        clean_release(&release_dir, pm, &self.config.runtime_dirs)?;
        advance(manifest, ReleasePhase::CleanedUp, manifest_path)?;

        // Package
        sink.progress("Packaging release");
        let archive = package_release(
            &release_dir,
            &layout.archive_path(release),
            timeouts.package,
        )
        .await?;
        manifest.archive = Some(archive.clone());
        advance(manifest, ReleasePhase::Packaged, manifest_path)?;

        // Tag
        let tag = if request.create_tag {
            sink.progress(&format!("Tagging {} as {}", commit, release));
            mirror
                .tag(&self.runner, release, &commit, self.config.push_tags, sink)
                .await?;
            manifest.tag = Some(release.to_string());
            Some(release.to_string())
        } else {
            None
        };

        Ok(ReleaseOutcome {
            release_name: release.to_string(),
            archive,
            commit,
            lock_hash,
            fresh_vendor,
            tag,
        })
    }
}

fn advance(manifest: &mut ReleaseManifest, phase: ReleasePhase, path: &Path) -> Result<()> {
    manifest.set_phase(phase);
    manifest.save(path)
}

fn copy_overlay(source: &Path, target: &Path) -> std::result::Result<(), BuildError> {
    let overlay_failed = |e| BuildError::ConfigOverlayFailed {
        path: source.to_path_buf(),
        source: e,
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(overlay_failed)?;
    }
    std::fs::copy(source, target).map_err(overlay_failed)?;
    Ok(())
}
