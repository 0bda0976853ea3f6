//! Logical subscriptions shared by the pool and its relays.

use crate::error::{ClientError, Result};
use nostr::{Event, Filter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Callback type for handling received events.
pub type EventCallback = Arc<dyn Fn(Event) -> Result<()> + Send + Sync>;

/// A subscription to filtered events.
///
/// Clones share the EOSE flag, so every relay holding a copy of the same
/// subscription reports EOSE through one flag.
#[derive(Clone)]
pub struct Subscription {
    /// Subscription ID, unique within a pool.
    pub id: String,
    /// Filters for this subscription, sent in order.
    pub filters: Vec<Filter>,
    /// Close on the relay as soon as it reports end of stored events.
    pub close_on_eose: bool,
    eose_received: Arc<AtomicBool>,
    callback: Option<EventCallback>,
    event_tx: Option<mpsc::Sender<Event>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filters", &self.filters)
            .field("close_on_eose", &self.close_on_eose)
            .field("eose", &self.has_eose())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Create a new subscription with filters and no consumer.
    pub fn new(id: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            id: id.into(),
            filters,
            close_on_eose: false,
            eose_received: Arc::new(AtomicBool::new(false)),
            callback: None,
            event_tx: None,
        }
    }

    /// Create a subscription with callback-based event handling.
    pub fn with_callback(
        id: impl Into<String>,
        filters: Vec<Filter>,
        callback: EventCallback,
    ) -> Self {
        Self {
            callback: Some(callback),
            ..Self::new(id, filters)
        }
    }

    /// Create a subscription that receives events on a bounded channel.
    pub fn with_channel(
        id: impl Into<String>,
        filters: Vec<Filter>,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(1000);
        let subscription = Self {
            event_tx: Some(tx),
            ..Self::new(id, filters)
        };
        (subscription, rx)
    }

    /// One-shot fetch: close once stored events have been delivered.
    pub fn close_on_eose(mut self) -> Self {
        self.close_on_eose = true;
        self
    }

    /// Handle a received event.
    pub fn handle_event(&self, event: Event) -> Result<()> {
        match (&self.callback, &self.event_tx) {
            (Some(callback), Some(_)) => callback(event.clone())?,
            (Some(callback), None) => return callback(event),
            (None, _) => {}
        }

        if let Some(tx) = &self.event_tx {
            tx.try_send(event).map_err(|error| match error {
                mpsc::error::TrySendError::Full(_) => {
                    ClientError::Subscription("event channel full - consumer too slow".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    ClientError::Subscription("event channel closed".to_string())
                }
            })?;
        }

        Ok(())
    }

    /// Mark EOSE as received.
    pub fn mark_eose(&self) {
        self.eose_received.store(true, Ordering::Relaxed);
    }

    /// Check if EOSE has been received.
    pub fn has_eose(&self) -> bool {
        self.eose_received.load(Ordering::Relaxed)
    }
}
