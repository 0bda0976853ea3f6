//! REQ filters.
//!
//! Serialized exactly as NIP-01 expects: absent constraints are omitted and tag
//! constraints are flattened into `#<letter>` keys.

use crate::nip01::{Event, is_lower_hex};
use crate::tag_parsing::{is_tag, tag_field};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised when a filter cannot be sent to a relay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid {field} entry: {value}")]
    InvalidHex { field: &'static str, value: String },

    #[error("invalid tag filter key: {0}")]
    InvalidTagKey(String),

    #[error("since ({since}) is after until ({until})")]
    InvertedRange { since: u64, until: u64 },
}

/// A subscription filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Tag queries keyed by `#<letter>`.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn since(mut self, timestamp: u64) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Add a tag filter; `letter` is the tag name without the `#`.
    pub fn tag<I, S>(mut self, letter: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.insert(
            format!("#{}", letter),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Reject filters a relay would refuse or that can never match.
    pub fn validate(&self) -> Result<(), FilterError> {
        for (field, values) in [("ids", &self.ids), ("authors", &self.authors)] {
            if let Some(values) = values
                && let Some(bad) = values.iter().find(|value| !is_lower_hex(value, 64))
            {
                return Err(FilterError::InvalidHex {
                    field,
                    value: bad.clone(),
                });
            }
        }

        if let Some(key) = self
            .tags
            .keys()
            .find(|key| !key.starts_with('#') || key.len() < 2)
        {
            return Err(FilterError::InvalidTagKey(key.clone()));
        }

        if let (Some(since), Some(until)) = (self.since, self.until)
            && since > until
        {
            return Err(FilterError::InvertedRange { since, until });
        }

        Ok(())
    }

    /// Whether an event satisfies every constraint of this filter.
    ///
    /// `limit` only bounds the stored backlog and is not checked here.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids
            && !ids.contains(&event.id)
        {
            return false;
        }
        if let Some(authors) = &self.authors
            && !authors.contains(&event.pubkey)
        {
            return false;
        }
        if let Some(kinds) = &self.kinds
            && !kinds.contains(&event.kind)
        {
            return false;
        }
        if self.since.is_some_and(|since| event.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at > until) {
            return false;
        }

        self.tags.iter().all(|(key, values)| {
            let name = key.trim_start_matches('#');
            event.tags.iter().any(|tag| {
                is_tag(tag, name)
                    && tag_field(tag, 1).is_some_and(|value| values.iter().any(|v| v == value))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: u16, pubkey: &str, created_at: u64, tags: Vec<Vec<String>>) -> Event {
        Event {
            id: "e".repeat(64),
            pubkey: pubkey.to_string(),
            created_at,
            kind,
            tags,
            content: String::new(),
            sig: "f".repeat(128),
        }
    }

    #[test]
    fn serializes_like_nip01() {
        let filter = Filter::new()
            .kinds([0])
            .authors(["a".repeat(64)])
            .tag("t", ["music"])
            .limit(10);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            value,
            json!({"kinds": [0], "authors": ["a".repeat(64)], "#t": ["music"], "limit": 10})
        );
    }

    #[test]
    fn deserializes_tag_keys() {
        let filter: Filter =
            serde_json::from_value(json!({"kinds": [30311], "#p": ["abc"], "since": 5})).unwrap();
        assert_eq!(filter.kinds, Some(vec![30311]));
        assert_eq!(filter.since, Some(5));
        assert_eq!(filter.tags.get("#p"), Some(&vec!["abc".to_string()]));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&event(1, &"a".repeat(64), 1, vec![])));
    }

    #[test]
    fn matches_checks_every_constraint() {
        let author = "a".repeat(64);
        let filter = Filter::new()
            .kinds([1])
            .authors([author.clone()])
            .since(10)
            .until(20)
            .tag("t", ["live"]);

        let tagged = vec![vec!["t".to_string(), "live".to_string()]];
        assert!(filter.matches(&event(1, &author, 15, tagged.clone())));
        assert!(!filter.matches(&event(2, &author, 15, tagged.clone())));
        assert!(!filter.matches(&event(1, &"b".repeat(64), 15, tagged.clone())));
        assert!(!filter.matches(&event(1, &author, 9, tagged.clone())));
        assert!(!filter.matches(&event(1, &author, 21, tagged)));
        assert!(!filter.matches(&event(1, &author, 15, vec![])));
    }

    #[test]
    fn validate_rejects_bad_authors_and_ranges() {
        assert!(Filter::new().kinds([0]).validate().is_ok());
        assert!(matches!(
            Filter::new().authors(["npub1xyz"]).validate(),
            Err(FilterError::InvalidHex { field: "authors", .. })
        ));
        assert_eq!(
            Filter::new().since(20).until(10).validate(),
            Err(FilterError::InvertedRange {
                since: 20,
                until: 10
            })
        );
    }

    #[test]
    fn validate_rejects_tag_keys_without_hash() {
        let mut filter = Filter::new();
        filter.tags.insert("t".to_string(), vec!["x".to_string()]);
        assert_eq!(
            filter.validate(),
            Err(FilterError::InvalidTagKey("t".to_string()))
        );
    }
}
