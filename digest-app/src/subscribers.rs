//! JSON-file subscriber registry.
//!
//! The file holds a plain array of [`Subscriber`] records. A missing file is
//! an empty registry. Listings treat an unreadable file as empty too, but
//! `add` and `deactivate` refuse to touch it. Writes go through a temp file
//! and a rename so a crash never leaves half a document behind.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Lowercase, without `@`.
    pub twitter_handle: String,
    /// Lowercase.
    pub email: String,
    /// RFC 3339.
    pub subscribed_at: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Subscriber {
    pub fn new(twitter_handle: &str, email: &str) -> Self {
        Self {
            twitter_handle: twitter_handle.trim().trim_start_matches('@').to_lowercase(),
            email: email.trim().to_lowercase(),
            subscribed_at: Utc::now().to_rfc3339(),
            active: true,
        }
    }
}

/// What [`SubscriberStore::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Updated,
    Unchanged,
}

pub struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read for the mutating paths: only a missing file is empty.
    fn load(&self) -> Result<Vec<Subscriber>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", self.path.display())),
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("parse subscriber registry {}", self.path.display()))
    }

    /// Lenient read for listings: an unreadable registry lists nothing.
    fn read(&self) -> Vec<Subscriber> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %format!("{e:#}"), "subscribers.unreadable");
            Vec::new()
        })
    }

    fn write(&self, subscribers: &[Subscriber]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }
        let body = serde_json::to_string_pretty(subscribers)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }

    /// Register `subscriber`. An existing email gets its handle updated and is
    /// reactivated rather than duplicated.
    pub fn add(&self, subscriber: Subscriber) -> Result<AddOutcome> {
        let mut all = self.load()?;
        let outcome = match all
            .iter_mut()
            .find(|s| s.email.eq_ignore_ascii_case(&subscriber.email))
        {
            Some(existing) => {
                let handle_changed = !existing
                    .twitter_handle
                    .eq_ignore_ascii_case(&subscriber.twitter_handle);
                if !handle_changed && existing.active {
                    return Ok(AddOutcome::Unchanged);
                }
                existing.twitter_handle = subscriber.twitter_handle;
                existing.active = true;
                AddOutcome::Updated
            }
            None => {
                all.push(subscriber);
                AddOutcome::Added
            }
        };
        self.write(&all)?;
        Ok(outcome)
    }

    pub fn all_active(&self) -> Vec<Subscriber> {
        self.read().into_iter().filter(|s| s.active).collect()
    }

    pub fn get_by_email(&self, email: &str) -> Option<Subscriber> {
        let email = email.trim();
        self.read()
            .into_iter()
            .find(|s| s.email.eq_ignore_ascii_case(email))
    }

    /// Soft delete. Returns whether the email was known.
    pub fn deactivate(&self, email: &str) -> Result<bool> {
        let email = email.trim();
        let mut all = self.load()?;
        let Some(found) = all.iter_mut().find(|s| s.email.eq_ignore_ascii_case(email)) else {
            return Ok(false);
        };
        found.active = false;
        self.write(&all)?;
        Ok(true)
    }

    pub fn count_active(&self) -> usize {
        self.all_active().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> SubscriberStore {
        SubscriberStore::new(tmp.path().join("data").join("subscribers.json"))
    }

    #[test]
    fn new_subscriber_is_normalised() {
        let s = Subscriber::new(" @NASA ", "Reader@Example.COM");
        assert_eq!(s.twitter_handle, "nasa");
        assert_eq!(s.email, "reader@example.com");
        assert!(s.active);
    }

    #[test]
    fn missing_or_corrupt_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(store.all_active().is_empty());

        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.count_active(), 0);
    }

    #[test]
    fn corrupt_registry_is_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let original = r#"[
  {"twitter_handle":"alice","email":"a@example.com","subscribed_at":"2024-11-01T00:00:00Z","active":true},
  {"twitter_handle":"bob","email":"b@example.com","subscribed_at":"2024-11-02T00:00:00Z","active":"yes"}
]"#;
        std::fs::write(store.path(), original).unwrap();

        assert!(store.add(Subscriber::new("carol", "c@example.com")).is_err());
        assert!(store.deactivate("a@example.com").is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
        assert!(store.all_active().is_empty());
    }

    #[test]
    fn add_update_and_reactivate() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        assert_eq!(store.add(Subscriber::new("alice", "a@example.com")).unwrap(), AddOutcome::Added);
        assert_eq!(store.add(Subscriber::new("@Alice", "A@example.com")).unwrap(), AddOutcome::Unchanged);
        assert_eq!(store.add(Subscriber::new("bob", "a@example.com")).unwrap(), AddOutcome::Updated);
        assert_eq!(store.get_by_email("A@EXAMPLE.com").unwrap().twitter_handle, "bob");

        assert!(store.deactivate("a@example.com").unwrap());
        assert_eq!(store.count_active(), 0);
        assert_eq!(store.add(Subscriber::new("bob", "a@example.com")).unwrap(), AddOutcome::Updated);
        assert_eq!(store.count_active(), 1);
    }

    #[test]
    fn deactivate_unknown_email() {
        let tmp = TempDir::new().unwrap();
        assert!(!store(&tmp).deactivate("nobody@example.com").unwrap());
    }

    #[test]
    fn file_is_a_plain_json_array() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.add(Subscriber::new("alice", "a@example.com")).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[0]["twitter_handle"], "alice");
        assert_eq!(raw[0]["active"], true);
    }
}
