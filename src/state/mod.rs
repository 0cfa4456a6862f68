//! Persistent state for release builds.
//!
//! Release manifests record how far each build got, and the repository lock
//! keeps concurrent builds of one repository from racing.

mod lock;
mod manifest;

pub use lock::RepositoryLock;
pub use manifest::{MANIFEST_FORMAT_VERSION, ReleaseManifest, ReleasePhase};

use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Serialize `value` to `path` via a temporary file and rename
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_file_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_file_path)?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&temp_file_path, path)?;
    Ok(())
}
