//! Dedup and ordering helpers for subscription consumers.
//!
//! The relay pool delivers one copy of an event per relay that carries it, in
//! whatever order each relay sends them. Consumers collapse those copies here.

use crate::nip01::{Event, KindClassification, classify_kind};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// One event per distinct id, keeping the first occurrence in input order.
pub fn unique_by_id<I>(events: I) -> Vec<Event>
where
    I: IntoIterator<Item = Event>,
{
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect()
}

/// Keep only the newest event per key.
///
/// Ties on `created_at` keep the event seen first. The result is sorted newest
/// first (id breaks ties) so it does not depend on input order.
pub fn latest_per_key<I, K, F>(events: I, key_fn: F) -> Vec<Event>
where
    I: IntoIterator<Item = Event>,
    K: Eq + Hash,
    F: Fn(&Event) -> K,
{
    let mut latest: HashMap<K, Event> = HashMap::new();
    for event in events {
        let key = key_fn(&event);
        match latest.get(&key) {
            Some(current) if current.created_at >= event.created_at => {}
            _ => {
                latest.insert(key, event);
            }
        }
    }

    let mut result: Vec<Event> = latest.into_values().collect();
    result.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    result
}

/// Sort newest first; `reverse` gives oldest first for append-style views.
pub fn sort_by_recency(events: &mut [Event], reverse: bool) {
    if reverse {
        events.sort_by_key(|event| event.created_at);
    } else {
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

/// `(pubkey, d-tag)` key of an addressable event; missing `d` maps to "".
pub fn address_key(event: &Event) -> (String, String) {
    (
        event.pubkey.clone(),
        event.identifier().unwrap_or_default().to_string(),
    )
}

/// Key under which a newer event supersedes an older one.
///
/// Replaceable kinds key by pubkey and kind, addressable kinds also by `d` tag.
/// Other kinds have no replacement key.
pub fn replacement_key(event: &Event) -> Option<(String, u16, String)> {
    match classify_kind(event.kind) {
        KindClassification::Replaceable => {
            Some((event.pubkey.clone(), event.kind, String::new()))
        }
        KindClassification::Addressable => {
            let (pubkey, identifier) = address_key(event);
            Some((pubkey, event.kind, identifier))
        }
        _ => None,
    }
}

#[derive(PartialEq, Eq, Hash)]
enum VersionKey {
    Replacement(String, u16, String),
    Id(String),
}

/// Collapse replaceable and addressable events to their newest version.
///
/// Other events are only deduplicated by id. Sorted like `latest_per_key`.
pub fn latest_versions<I>(events: I) -> Vec<Event>
where
    I: IntoIterator<Item = Event>,
{
    latest_per_key(events, |event| match replacement_key(event) {
        Some((pubkey, kind, identifier)) => VersionKey::Replacement(pubkey, kind, identifier),
        None => VersionKey::Id(event.id.clone()),
    })
}

/// Streaming "have I seen this id" filter.
#[derive(Debug, Default)]
pub struct EventDeduper {
    seen: HashSet<String>,
}

impl EventDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time an id is offered.
    pub fn insert(&mut self, event: &Event) -> bool {
        self.seen.insert(event.id.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
