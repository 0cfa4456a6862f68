//! Repository configuration record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository releases can be built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    id: Option<u64>,
    name: String,
    url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RepositoryRecord {
    /// New, unsaved record; both timestamps default to now
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Store-assigned id; `None` until saved
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    /// Repository name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the repository name
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Clone URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Set the clone URL
    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = url.into();
        self
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Set the creation time; `None` resets it to now
    pub fn set_created_at(&mut self, created_at: Option<DateTime<Utc>>) -> &mut Self {
        self.created_at = created_at.unwrap_or_else(Utc::now);
        self
    }

    /// Last update time
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Set the update time; `None` resets it to now
    pub fn set_updated_at(&mut self, updated_at: Option<DateTime<Utc>>) -> &mut Self {
        self.updated_at = updated_at.unwrap_or_else(Utc::now);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_record_defaults_timestamps() {
        let before = Utc::now();
        let record = RepositoryRecord::new("kis", "git@example.com:kis.git");

        assert_eq!(record.id(), None);
        assert!(record.created_at() >= before);
        assert_eq!(record.created_at(), record.updated_at());
    }

    #[test]
    fn setters_chain() {
        let mut record = RepositoryRecord::new("kis", "a");
        record.set_name("gr").set_url("b");
        assert_eq!(record.name(), "gr");
        assert_eq!(record.url(), "b");
    }

    #[test]
    fn none_resets_timestamps_to_now() {
        let past = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        let mut record = RepositoryRecord::new("kis", "a");
        record.set_created_at(Some(past)).set_updated_at(Some(past));
        assert_eq!(record.updated_at(), past);

        record.set_updated_at(None);
        assert!(record.updated_at() > past);
        assert_eq!(record.created_at(), past);
    }
}
