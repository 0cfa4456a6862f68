//! Post-install cleanup of a release directory.

use super::vendor::remove_existing;
use crate::config::PackageManagerConfig;
use crate::error::BuildError;
use std::path::{Path, PathBuf};

/// Remove installer leftovers and reset runtime directories to empty
pub fn clean_release(
    release_dir: &Path,
    package_manager: &PackageManagerConfig,
    runtime_dirs: &[PathBuf],
) -> Result<(), BuildError> {
    for leftover in [&package_manager.binary, &package_manager.installer_script] {
        let path = release_dir.join(leftover);
        remove_existing(&path).map_err(|source| BuildError::CleanupFailed { path, source })?;
    }

    for dir in runtime_dirs {
        let path = release_dir.join(dir);
        remove_existing(&path)
            .and_then(|()| std::fs::create_dir_all(&path))
            .map_err(|source| BuildError::CleanupFailed { path, source })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installer_removed_and_runtime_dirs_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path();
        let pm = PackageManagerConfig::default();
        std::fs::write(release.join("composer.phar"), b"phar").unwrap();
        std::fs::write(release.join("composer-setup.php"), b"<?php").unwrap();
        std::fs::create_dir_all(release.join("app/cache/prod")).unwrap();
        std::fs::write(release.join("app/cache/prod/container.php"), b"x").unwrap();

        let runtime = vec![PathBuf::from("app/cache"), PathBuf::from("app/logs")];
        clean_release(release, &pm, &runtime).unwrap();

        assert!(!release.join("composer.phar").exists());
        assert!(!release.join("composer-setup.php").exists());
        assert!(release.join("app/cache").is_dir());
        assert_eq!(std::fs::read_dir(release.join("app/cache")).unwrap().count(), 0);
        assert!(release.join("app/logs").is_dir());
    }

    #[test]
    fn absent_leftovers_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        clean_release(dir.path(), &PackageManagerConfig::default(), &[]).unwrap();
    }
}
