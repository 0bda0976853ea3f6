//! In-process relays.
//!
//! `MemoryTransport` stands in for the network: each URL maps to a
//! [`MemoryRelay`] that tracks REQ/CLOSE frames, serves stored events that
//! match a REQ, answers EVENT frames with a configurable OK, and can be made
//! unreachable or dropped to exercise failure paths.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, RelayMessage};
use crate::transport::{FrameSink, RelaySocket, RelayTransport};
use async_trait::async_trait;
use nostr::{Event, Filter};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// How a memory relay answers `EVENT` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReply {
    /// `["OK", id, true, ""]`
    Accept,
    /// `["OK", id, true, "duplicate: ..."]`
    Duplicate,
    /// `["OK", id, false, reason]`
    Reject(String),
    /// No answer at all.
    Ignore,
}

struct Connection {
    id: u64,
    to_client: mpsc::UnboundedSender<String>,
}

struct RelayState {
    reachable: bool,
    publish_reply: PublishReply,
    received: Vec<ClientMessage>,
    subscriptions: BTreeMap<String, Vec<Filter>>,
    stored: Vec<Event>,
    connection: Option<Connection>,
    connections_opened: usize,
}

impl Default for RelayState {
    fn default() -> Self {
        Self {
            reachable: true,
            publish_reply: PublishReply::Accept,
            received: Vec::new(),
            subscriptions: BTreeMap::new(),
            stored: Vec::new(),
            connection: None,
            connections_opened: 0,
        }
    }
}

impl RelayState {
    fn push(&self, message: &RelayMessage) {
        let Some(connection) = &self.connection else {
            return;
        };
        match message.to_json() {
            Ok(text) => {
                let _ = connection.to_client.send(text);
            }
            Err(error) => debug!("memory relay failed to encode frame: {}", error),
        }
    }

    fn handle_frame(&mut self, message: ClientMessage) {
        self.received.push(message.clone());
        match message {
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let backlog: Vec<Event> = self
                    .stored
                    .iter()
                    .filter(|event| filters.iter().any(|filter| filter.matches(event)))
                    .cloned()
                    .collect();
                for event in backlog {
                    self.push(&RelayMessage::Event(subscription_id.clone(), event));
                }
                self.push(&RelayMessage::Eose(subscription_id.clone()));
                self.subscriptions.insert(subscription_id, filters);
            }
            ClientMessage::Close(subscription_id) => {
                self.subscriptions.remove(&subscription_id);
            }
            ClientMessage::Event(event) => {
                let event_id = event.id.clone();
                let reply = match &self.publish_reply {
                    PublishReply::Accept => Some((true, String::new())),
                    PublishReply::Duplicate => {
                        Some((true, "duplicate: already have this event".to_string()))
                    }
                    PublishReply::Reject(reason) => Some((false, reason.clone())),
                    PublishReply::Ignore => None,
                };
                if matches!(reply, Some((true, _))) {
                    self.stored.push(event);
                }
                if let Some((accepted, message)) = reply {
                    self.push(&RelayMessage::Ok(event_id, accepted, message));
                }
            }
        }
    }
}

/// Handle to one in-process relay.
#[derive(Clone)]
pub struct MemoryRelay {
    url: String,
    state: Arc<Mutex<RelayState>>,
}

impl MemoryRelay {
    fn new(url: String) -> Self {
        Self {
            url,
            state: Arc::new(Mutex::new(RelayState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Unreachable relays fail every connection attempt.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    pub fn set_publish_reply(&self, reply: PublishReply) {
        self.lock().publish_reply = reply;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connection.is_some()
    }

    pub fn connections_opened(&self) -> usize {
        self.lock().connections_opened
    }

    /// Every frame received from clients, in arrival order.
    pub fn received(&self) -> Vec<ClientMessage> {
        self.lock().received.clone()
    }

    /// REQ frames only, as `(subscription_id, filters)`.
    pub fn requests(&self) -> Vec<(String, Vec<Filter>)> {
        self.lock()
            .received
            .iter()
            .filter_map(|message| match message {
                ClientMessage::Req {
                    subscription_id,
                    filters,
                } => Some((subscription_id.clone(), filters.clone())),
                _ => None,
            })
            .collect()
    }

    /// Subscriptions currently open on this relay.
    pub fn active_subscriptions(&self) -> BTreeMap<String, Vec<Filter>> {
        self.lock().subscriptions.clone()
    }

    /// Store an event so later REQs that match it receive it.
    pub fn store(&self, event: Event) {
        self.lock().stored.push(event);
    }

    /// Store an event and push it to every open subscription it matches.
    ///
    /// Returns the number of subscriptions it was delivered to.
    pub fn broadcast(&self, event: Event) -> usize {
        let mut state = self.lock();
        let targets: Vec<String> = state
            .subscriptions
            .iter()
            .filter(|(_, filters)| filters.iter().any(|filter| filter.matches(&event)))
            .map(|(id, _)| id.clone())
            .collect();
        for subscription_id in &targets {
            state.push(&RelayMessage::Event(subscription_id.clone(), event.clone()));
        }
        state.stored.push(event);
        targets.len()
    }

    /// Send a relay message regardless of subscriptions.
    pub fn send(&self, message: &RelayMessage) {
        self.lock().push(message);
    }

    /// Send raw text, e.g. malformed frames.
    pub fn send_raw(&self, text: impl Into<String>) {
        if let Some(connection) = &self.lock().connection {
            let _ = connection.to_client.send(text.into());
        }
    }

    /// Drop the connection from the relay side.
    pub fn drop_connection(&self) {
        let mut state = self.lock();
        state.connection = None;
        state.subscriptions.clear();
    }
}

struct MemorySink {
    relay: MemoryRelay,
    connection_id: u64,
}

impl FrameSink for MemorySink {
    fn send(&self, text: String) -> Result<()> {
        let mut state = self.relay.lock();
        if state.connection.as_ref().map(|c| c.id) != Some(self.connection_id) {
            return Err(ClientError::NotConnected);
        }
        match ClientMessage::from_json(&text) {
            Ok(message) => state.handle_frame(message),
            Err(error) => debug!("memory relay {} ignored frame: {}", self.relay.url, error),
        }
        Ok(())
    }

    fn close(&self) {
        let mut state = self.relay.lock();
        if state.connection.as_ref().map(|c| c.id) == Some(self.connection_id) {
            state.connection = None;
            state.subscriptions.clear();
        }
    }
}

/// Transport whose relays live in this process.
#[derive(Default)]
pub struct MemoryTransport {
    relays: Mutex<HashMap<String, MemoryRelay>>,
    next_connection: Mutex<u64>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the relay at `url`, created on first use.
    pub fn relay(&self, url: &str) -> MemoryRelay {
        let key = Url::parse(url).map_or_else(|_| url.to_string(), |parsed| parsed.to_string());
        self.relays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert_with(|| MemoryRelay::new(key))
            .clone()
    }
}

#[async_trait]
impl RelayTransport for MemoryTransport {
    async fn open(&self, url: &Url, _connect_timeout: Duration) -> Result<RelaySocket> {
        let relay = self.relay(url.as_str());
        let connection_id = {
            let mut next = self
                .next_connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };

        let (to_client, inbound) = mpsc::unbounded_channel();
        {
            let mut state = relay.lock();
            if !state.reachable {
                return Err(ClientError::Connection(format!("{} is unreachable", url)));
            }
            state.connection = Some(Connection {
                id: connection_id,
                to_client,
            });
            state.subscriptions.clear();
            state.connections_opened += 1;
        }

        Ok(RelaySocket {
            sink: Box::new(MemorySink {
                relay,
                connection_id,
            }),
            inbound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parse_relay_message;

    fn event(id: &str, kind: u16) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "a".repeat(64),
            created_at: 1,
            kind,
            tags: vec![],
            content: String::new(),
            sig: String::new(),
        }
    }

    #[tokio::test]
    async fn req_serves_backlog_then_eose() -> Result<()> {
        let transport = MemoryTransport::new();
        let relay = transport.relay("wss://relay.example");
        relay.store(event("note", 1));
        relay.store(event("profile", 0));

        let url = Url::parse("wss://relay.example")?;
        let mut socket = transport.open(&url, Duration::from_secs(1)).await?;
        socket.sink.send(
            ClientMessage::Req {
                subscription_id: "s".to_string(),
                filters: vec![Filter::new().kinds([0])],
            }
            .to_json()?,
        )?;

        let first = socket.inbound.recv().await.unwrap_or_default();
        assert!(matches!(
            parse_relay_message(&first)?,
            Some(RelayMessage::Event(sub, e)) if sub == "s" && e.id == "profile"
        ));
        let second = socket.inbound.recv().await.unwrap_or_default();
        assert!(matches!(parse_relay_message(&second)?, Some(RelayMessage::Eose(_))));
        assert_eq!(relay.active_subscriptions().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_relay_refuses_connections() -> Result<()> {
        let transport = MemoryTransport::new();
        transport.relay("wss://down.example").set_reachable(false);
        let url = Url::parse("wss://down.example")?;
        assert!(transport.open(&url, Duration::from_secs(1)).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_connection_closes_inbound() -> Result<()> {
        let transport = MemoryTransport::new();
        let relay = transport.relay("wss://relay.example");
        let url = Url::parse("wss://relay.example")?;
        let mut socket = transport.open(&url, Duration::from_secs(1)).await?;

        relay.drop_connection();
        assert!(socket.inbound.recv().await.is_none());
        assert!(socket.sink.send(r#"["CLOSE","x"]"#.to_string()).is_err());
        Ok(())
    }
}
