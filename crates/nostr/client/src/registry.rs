//! Pool-wide table of logical subscriptions.
//!
//! The registry outlives individual sockets: every entry is replayed onto a
//! relay when it opens.

use crate::subscription::Subscription;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or supersede; returns the replaced entry.
    pub fn insert(&mut self, subscription: Subscription) -> Option<Subscription> {
        self.entries.insert(subscription.id.clone(), subscription)
    }

    pub fn remove(&mut self, id: &str) -> Option<Subscription> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// IDs in ascending order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clones of every entry, ordered by id.
    pub fn snapshot(&self) -> Vec<Subscription> {
        let mut subscriptions: Vec<Subscription> = self.entries.values().cloned().collect();
        subscriptions.sort_by(|a, b| a.id.cmp(&b.id));
        subscriptions
    }

    pub fn drain(&mut self) -> Vec<Subscription> {
        self.entries.drain().map(|(_, subscription)| subscription).collect()
    }
}
