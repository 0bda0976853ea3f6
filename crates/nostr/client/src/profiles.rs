//! In-memory cache of profile metadata (kind 0).

use nostr::{Event, Metadata, Nip01Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cached profile of one pubkey.
///
/// A placeholder (no `updated_at`) exists from the moment the pubkey is
/// queued for fetching until the first metadata event arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCacheEntry {
    pub pubkey: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud06: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
    /// `created_at` of the metadata event this entry was built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl ProfileCacheEntry {
    pub fn placeholder(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            ..Self::default()
        }
    }

    pub fn from_metadata(pubkey: impl Into<String>, metadata: Metadata, updated_at: u64) -> Self {
        Self {
            pubkey: pubkey.into(),
            name: metadata.name,
            display_name: metadata.display_name,
            about: metadata.about,
            picture: metadata.picture,
            banner: metadata.banner,
            website: metadata.website,
            nip05: metadata.nip05,
            lud06: metadata.lud06,
            lud16: metadata.lud16,
            updated_at: Some(updated_at),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.updated_at.is_none()
    }

    /// Best human-readable label: display name, then name, then short pubkey.
    pub fn label(&self) -> String {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|label| !label.trim().is_empty())
            .map_or_else(
                || self.pubkey.chars().take(8).collect(),
                |label| label.to_string(),
            )
    }
}

/// Which metadata event wins when several arrive for one pubkey.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileConflictPolicy {
    /// The last delivered event wins, whatever its `created_at`.
    #[default]
    LastWrite,
    /// The event with the greatest `created_at` wins.
    Newest,
}

#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: HashMap<String, ProfileCacheEntry>,
    policy: ProfileConflictPolicy,
}

impl ProfileCache {
    pub fn new(policy: ProfileConflictPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> ProfileConflictPolicy {
        self.policy
    }

    /// Seed from persisted entries.
    pub fn load(&mut self, entries: impl IntoIterator<Item = ProfileCacheEntry>) {
        for entry in entries {
            self.entries.insert(entry.pubkey.clone(), entry);
        }
    }

    /// Create a placeholder unless an entry exists. Returns whether one was created.
    pub fn ensure(&mut self, pubkey: &str) -> bool {
        if self.entries.contains_key(pubkey) {
            return false;
        }
        self.entries
            .insert(pubkey.to_string(), ProfileCacheEntry::placeholder(pubkey));
        true
    }

    pub fn get(&self, pubkey: &str) -> Option<&ProfileCacheEntry> {
        self.entries.get(pubkey)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries ordered by pubkey.
    pub fn entries(&self) -> Vec<ProfileCacheEntry> {
        let mut entries: Vec<ProfileCacheEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
        entries
    }

    /// Write a metadata event into the cache.
    ///
    /// Returns the stored entry, or `None` when the policy kept the existing one.
    pub fn apply(&mut self, event: &Event) -> Result<Option<ProfileCacheEntry>, Nip01Error> {
        let metadata = Metadata::from_event(event)?;
        if self.policy == ProfileConflictPolicy::Newest
            && let Some(existing) = self.entries.get(&event.pubkey)
            && existing.updated_at.is_some_and(|at| at >= event.created_at)
        {
            return Ok(None);
        }

        let entry = ProfileCacheEntry::from_metadata(&event.pubkey, metadata, event.created_at);
        self.entries.insert(event.pubkey.clone(), entry.clone());
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::KIND_METADATA;

    fn metadata(pubkey: &str, created_at: u64, name: &str) -> Event {
        Event {
            id: format!("{:064x}", created_at),
            pubkey: pubkey.to_string(),
            created_at,
            kind: KIND_METADATA,
            tags: vec![],
            content: format!(r#"{{"name":"{}","displayName":"{} (live)","lud16":"{}@pay.example"}}"#, name, name, name),
            sig: "0".repeat(128),
        }
    }

    #[test]
    fn ensure_creates_placeholder_once() {
        let mut cache = ProfileCache::default();
        assert!(cache.ensure("pk"));
        assert!(!cache.ensure("pk"));
        assert!(cache.get("pk").is_some_and(ProfileCacheEntry::is_placeholder));
    }

    #[test]
    fn apply_fills_entry() {
        let mut cache = ProfileCache::default();
        cache.ensure("pk");
        let entry = cache.apply(&metadata("pk", 10, "alice")).unwrap().unwrap();

        assert_eq!(entry.name.as_deref(), Some("alice"));
        assert_eq!(entry.display_name.as_deref(), Some("alice (live)"));
        assert_eq!(entry.lud16.as_deref(), Some("alice@pay.example"));
        assert_eq!(entry.updated_at, Some(10));
        assert_eq!(entry.label(), "alice (live)");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn last_write_policy_accepts_older_events() {
        let mut cache = ProfileCache::new(ProfileConflictPolicy::LastWrite);
        cache.apply(&metadata("pk", 20, "new")).unwrap();
        cache.apply(&metadata("pk", 10, "old")).unwrap();
        assert_eq!(cache.get("pk").and_then(|e| e.name.clone()), Some("old".into()));
    }

    #[test]
    fn newest_policy_keeps_latest() {
        let mut cache = ProfileCache::new(ProfileConflictPolicy::Newest);
        cache.apply(&metadata("pk", 20, "new")).unwrap();
        assert!(cache.apply(&metadata("pk", 10, "old")).unwrap().is_none());
        assert_eq!(cache.get("pk").and_then(|e| e.name.clone()), Some("new".into()));
    }

    #[test]
    fn rejects_non_metadata_events() {
        let mut cache = ProfileCache::default();
        let mut note = metadata("pk", 1, "x");
        note.kind = 1;
        assert!(cache.apply(&note).is_err());

        let mut garbage = metadata("pk", 1, "x");
        garbage.content = "not json".to_string();
        assert!(cache.apply(&garbage).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn label_falls_back_to_short_pubkey() {
        let entry = ProfileCacheEntry::placeholder("abcdef0123456789");
        assert_eq!(entry.label(), "abcdef01");
    }

    #[test]
    fn policy_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ProfileConflictPolicy::LastWrite).unwrap(),
            r#""last-write""#
        );
    }
}
