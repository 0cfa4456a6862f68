//! Repository record persistence.
//!
//! Records live in a single JSON document under the data root. Every write
//! replaces the document atomically.

mod record;

pub use record::RepositoryRecord;

use crate::error::{Result, StoreError};
use crate::state::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the store inside the data root
pub const STORE_FILE_NAME: &str = "repositories.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    next_id: u64,
    repositories: Vec<RepositoryRecord>,
}

/// JSON-file backed repository store
#[derive(Debug)]
pub struct RepositoryStore {
    path: PathBuf,
    document: StoreDocument,
}

impl RepositoryStore {
    /// Open the store in `data_root`
    pub fn open_in(data_root: &Path) -> Result<Self> {
        Self::open(data_root.join(STORE_FILE_NAME))
    }

    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let document = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let mut document: StoreDocument =
                serde_json::from_str(&contents).map_err(|e| StoreError::Corrupted {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            if document.repositories.iter().any(|r| r.id().is_none()) {
                return Err(StoreError::Corrupted {
                    path,
                    reason: "record without id".to_string(),
                }
                .into());
            }
            let max_id = document
                .repositories
                .iter()
                .filter_map(RepositoryRecord::id)
                .max()
                .unwrap_or(0);
            document.next_id = document.next_id.max(max_id + 1);
            document
        } else {
            StoreDocument {
                next_id: 1,
                repositories: Vec::new(),
            }
        };

        Ok(Self { path, document })
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in creation order
    pub fn list(&self) -> &[RepositoryRecord] {
        &self.document.repositories
    }

    /// Record names, in creation order
    pub fn names(&self) -> Vec<String> {
        self.list().iter().map(|r| r.name().to_string()).collect()
    }

    /// Record by id
    pub fn get(&self, id: u64) -> Option<&RepositoryRecord> {
        self.list().iter().find(|r| r.id() == Some(id))
    }

    /// Record by name
    pub fn find_by_name(&self, name: &str) -> Option<&RepositoryRecord> {
        self.list().iter().find(|r| r.name() == name)
    }

    /// Create and persist a record
    pub fn create(&mut self, name: &str, url: &str) -> Result<RepositoryRecord> {
        if self.find_by_name(name).is_some() {
            return Err(StoreError::Duplicate(name.to_string()).into());
        }

        let mut record = RepositoryRecord::new(name, url);
        record.assign_id(self.document.next_id);
        self.document.next_id += 1;
        self.document.repositories.push(record.clone());
        self.save()?;

        Ok(record)
    }

    /// Replace the stored record with the same id and bump its update time
    pub fn update(&mut self, record: &RepositoryRecord) -> Result<RepositoryRecord> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::NotFound(record.name().to_string()))?;

        if self
            .list()
            .iter()
            .any(|r| r.name() == record.name() && r.id() != Some(id))
        {
            return Err(StoreError::Duplicate(record.name().to_string()).into());
        }

        let slot = self
            .document
            .repositories
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = record.clone();
        updated.set_updated_at(None);
        *slot = updated.clone();
        self.save()?;

        Ok(updated)
    }

    /// Remove a record by id
    pub fn remove(&mut self, id: u64) -> Result<RepositoryRecord> {
        let index = self
            .list()
            .iter()
            .position(|r| r.id() == Some(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let removed = self.document.repositories.remove(index);
        self.save()?;
        Ok(removed)
    }

    fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.document).map_err(|e| {
            StoreError::SaveFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RepositoryStore::open_in(dir.path()).unwrap();
        assert!(store.list().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn create_assigns_sequential_ids_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RepositoryStore::open_in(dir.path()).unwrap();

        let kis = store.create("kis", "git@example.com:kis.git").unwrap();
        let gr = store.create("gr", "git@example.com:gr.git").unwrap();
        assert_eq!(kis.id(), Some(1));
        assert_eq!(gr.id(), Some(2));

        let reopened = RepositoryStore::open_in(dir.path()).unwrap();
        assert_eq!(reopened.names(), vec!["kis".to_string(), "gr".to_string()]);
        assert_eq!(reopened.get(2).unwrap().url(), "git@example.com:gr.git");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RepositoryStore::open_in(dir.path()).unwrap();
        store.create("kis", "a").unwrap();

        assert!(matches!(
            store.create("kis", "b"),
            Err(ReleaseError::Store(StoreError::Duplicate(_)))
        ));
    }

    #[test]
    fn update_changes_fields_and_bumps_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RepositoryStore::open_in(dir.path()).unwrap();
        let created = store.create("kis", "a").unwrap();

        let mut edited = created.clone();
        edited.set_url("b");
        let updated = store.update(&edited).unwrap();

        assert_eq!(updated.url(), "b");
        assert_eq!(updated.created_at(), created.created_at());
        assert!(updated.updated_at() >= created.updated_at());
        assert_eq!(store.find_by_name("kis").unwrap().url(), "b");
    }

    #[test]
    fn update_of_unsaved_record_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RepositoryStore::open_in(dir.path()).unwrap();
        let unsaved = RepositoryRecord::new("kis", "a");

        assert!(matches!(
            store.update(&unsaved),
            Err(ReleaseError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn ids_are_not_reused_after_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RepositoryStore::open_in(dir.path()).unwrap();
        store.create("kis", "a").unwrap();
        let gr = store.create("gr", "b").unwrap();
        store.remove(gr.id().unwrap()).unwrap();

        let mut reopened = RepositoryStore::open_in(dir.path()).unwrap();
        let next = reopened.create("x", "c").unwrap();
        assert_eq!(next.id(), Some(3));
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE_NAME), "{ not json").unwrap();

        assert!(matches!(
            RepositoryStore::open_in(dir.path()),
            Err(ReleaseError::Store(StoreError::Corrupted { .. }))
        ));
    }
}
