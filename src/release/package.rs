//! Release archive packaging.

use crate::error::BuildError;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tar::HeaderMode;
use walkdir::WalkDir;

/// Compress `release_dir` into `archive`.
///
/// Entries are stored relative to `release_dir`, dotfiles included, with
/// symlinks followed so the cached vendor tree is embedded. The archive is
/// written to `<archive>.partial` first and only renamed into place once
/// complete.
pub async fn package_release(
    release_dir: &Path,
    archive: &Path,
    timeout: Duration,
) -> Result<PathBuf, BuildError> {
    let packaging_failed = |reason: String| BuildError::PackagingFailed {
        archive: archive.to_path_buf(),
        reason,
    };

    let partial = partial_path(archive);
    let cancelled = Arc::new(AtomicBool::new(false));

    let task = {
        let src_dir = release_dir.to_path_buf();
        let dest = partial.clone();
        let cancelled = Arc::clone(&cancelled);
        tokio::task::spawn_blocking(move || write_tar_gz(&src_dir, &dest, &cancelled))
    };

    let written = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map_err(|e| packaging_failed(e.to_string())),
        Ok(Err(join_error)) => Err(packaging_failed(format!(
            "packaging task failed: {}",
            join_error
        ))),
        Err(_) => {
            cancelled.store(true, Ordering::Relaxed);
            Err(packaging_failed(format!(
                "timed out after {}s",
                timeout.as_secs()
            )))
        }
    };

    if let Err(e) = written {
        match std::fs::remove_file(&partial) {
            Ok(()) => {}
            Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
            Err(remove_err) => {
                log::warn!("Could not remove {}: {}", partial.display(), remove_err)
            }
        }
        return Err(e);
    }

    std::fs::rename(&partial, archive)
        .map_err(|e| packaging_failed(format!("could not finalize archive: {}", e)))?;

    Ok(archive.to_path_buf())
}

fn partial_path(archive: &Path) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn write_tar_gz(src_dir: &Path, dest: &Path, cancelled: &AtomicBool) -> io::Result<()> {
    let file = std::fs::File::create(dest)?;
    let enc = GzEncoder::new(file, Compression::default());
    let mut tar = tar::Builder::new(enc);

    for entry in WalkDir::new(src_dir).follow_links(true) {
        if cancelled.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "packaging cancelled"));
        }

        let entry = entry.map_err(io::Error::other)?;
        let path = entry.path();
        if path == src_dir {
            continue;
        }

        let rel_path = path.strip_prefix(src_dir).map_err(io::Error::other)?;
        let metadata = entry.metadata().map_err(io::Error::other)?;

        let mut header = tar::Header::new_gnu();
        header.set_metadata_in_mode(&metadata, HeaderMode::Complete);

        if metadata.is_dir() {
            tar.append_data(&mut header, rel_path, &mut io::empty())?;
        } else {
            let mut file = std::fs::File::open(path)?;
            tar.append_data(&mut header, rel_path, &mut file)?;
        }
    }

    let enc = tar.into_inner()?;
    let mut finished = enc.finish()?;
    finished.flush()?;
    finished.sync_all()?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = std::fs::File::open(archive).unwrap();
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        let mut names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path().unwrap().to_string_lossy().into_owned();
                path.trim_end_matches('/').to_string()
            })
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn archive_includes_dotfiles_and_followed_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("cache/abc");
        std::fs::create_dir_all(&cached).unwrap();
        std::fs::write(cached.join("autoload.php"), b"<?php").unwrap();

        let release = dir.path().join("release-0001");
        std::fs::create_dir_all(release.join("app/cache")).unwrap();
        std::fs::write(release.join(".htaccess"), b"deny").unwrap();
        std::os::unix::fs::symlink(&cached, release.join("vendor")).unwrap();

        let archive = dir.path().join("release-0001.tar.gz");
        let written = package_release(&release, &archive, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(written, archive);
        assert!(!partial_path(&archive).exists());
        assert_eq!(
            entry_names(&archive),
            vec![
                ".htaccess",
                "app",
                "app/cache",
                "vendor",
                "vendor/autoload.php"
            ]
        );
    }

    #[tokio::test]
    async fn missing_source_leaves_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("release-0001.tar.gz");

        let err = package_release(&dir.path().join("absent"), &archive, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::PackagingFailed { .. }));
        assert!(!archive.exists());
        assert!(!partial_path(&archive).exists());
    }

    #[test]
    fn partial_suffix_is_appended() {
        assert_eq!(
            partial_path(Path::new("/r/release-0001.tar.gz")),
            PathBuf::from("/r/release-0001.tar.gz.partial")
        );
    }
}
