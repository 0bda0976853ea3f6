//! Single relay connection management.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, RelayMessage, parse_relay_message};
use crate::subscription::Subscription;
use crate::transport::{FrameSink, RelayTransport, WebSocketTransport};
use nostr::Event;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

/// Connection status of one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayStatus {
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelayStatus::Connecting => "connecting",
            RelayStatus::Open => "open",
            RelayStatus::Closed => "closed",
            RelayStatus::Error => "error",
        })
    }
}

/// Result of a `connect` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new socket was opened.
    Opened,
    /// The relay was already connecting or open.
    AlreadyActive,
}

/// How a relay answered a published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    Accepted,
    /// Accepted with a `duplicate:` message: the relay already had it.
    Seen,
    Failed(String),
}

/// Per-relay publish result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub relay_url: String,
    pub event_id: String,
    pub status: PublishStatus,
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, PublishStatus::Accepted | PublishStatus::Seen)
    }

    fn failed(relay_url: &str, event_id: &str, reason: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            event_id: event_id.to_string(),
            status: PublishStatus::Failed(reason.into()),
        }
    }
}

/// Relay connection configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub connect_timeout: Duration,
    /// How long `publish` waits for the relay's `OK`.
    pub publish_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(10),
        }
    }
}

/// Called on every status transition with the relay URL.
pub type StatusHook = Arc<dyn Fn(&str, RelayStatus) + Send + Sync>;

/// Called with the relay URL and subscription id after a `close_on_eose`
/// subscription reached EOSE and was closed on that relay.
pub type OneShotHook = Arc<dyn Fn(&str, &str) + Send + Sync>;

type SharedSink = Arc<Mutex<Option<Box<dyn FrameSink>>>>;
type PendingAcks = Arc<Mutex<HashMap<String, oneshot::Sender<(bool, String)>>>>;

/// Relay connection.
///
/// Owns at most one socket. The subscription table only holds entries while
/// the socket is open; it is cleared whenever the connection ends.
pub struct RelayConnection {
    url: Url,
    config: RelayConfig,
    transport: Arc<dyn RelayTransport>,
    state: Arc<RwLock<RelayStatus>>,
    sink: SharedSink,
    subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
    pending: PendingAcks,
    recv_task: Mutex<Option<JoinHandle<()>>>,
    generation: Arc<AtomicU64>,
    status_hook: Option<StatusHook>,
    one_shot_hook: Option<OneShotHook>,
}

/// Normalize and check a relay URL.
pub fn parse_relay_url(url: &str) -> Result<Url> {
    let parsed_url = Url::parse(url.trim())?;
    if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
        return Err(ClientError::InvalidUrl(format!(
            "URL must use ws:// or wss:// scheme, got: {}",
            parsed_url.scheme()
        )));
    }
    if parsed_url.host_str().is_none() {
        return Err(ClientError::InvalidUrl(format!("missing host: {}", url)));
    }
    Ok(parsed_url)
}

impl RelayConnection {
    /// Create a new WebSocket relay connection with default config.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, RelayConfig::default())
    }

    /// Create a new WebSocket relay connection with custom config.
    pub fn with_config(url: &str, config: RelayConfig) -> Result<Self> {
        Self::with_transport(url, config, Arc::new(WebSocketTransport))
    }

    /// Create a relay connection over any transport.
    pub fn with_transport(
        url: &str,
        config: RelayConfig,
        transport: Arc<dyn RelayTransport>,
    ) -> Result<Self> {
        Ok(Self {
            url: parse_relay_url(url)?,
            config,
            transport,
            state: Arc::new(RwLock::new(RelayStatus::Closed)),
            sink: Arc::new(Mutex::new(None)),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            recv_task: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            status_hook: None,
            one_shot_hook: None,
        })
    }

    /// Register the status transition hook.
    pub fn on_status(mut self, hook: StatusHook) -> Self {
        self.status_hook = Some(hook);
        self
    }

    /// Register the hook fired when a one-shot subscription finishes here.
    pub fn on_one_shot_done(mut self, hook: OneShotHook) -> Self {
        self.one_shot_hook = Some(hook);
        self
    }

    /// Relay URL as string.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Current connection status.
    pub async fn status(&self) -> RelayStatus {
        *self.state.read().await
    }

    pub async fn is_open(&self) -> bool {
        self.status().await == RelayStatus::Open
    }

    /// IDs of subscriptions currently open on this relay.
    pub async fn subscription_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.subscriptions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn has_subscription(&self, subscription_id: &str) -> bool {
        self.subscriptions.lock().await.contains_key(subscription_id)
    }

    fn emit(&self, status: RelayStatus) {
        if let Some(hook) = &self.status_hook {
            hook(self.url(), status);
        }
    }

    /// Connect to relay and start background receive loop.
    ///
    /// No-op while the relay is connecting or open.
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        {
            let mut state = self.state.write().await;
            if matches!(*state, RelayStatus::Connecting | RelayStatus::Open) {
                return Ok(ConnectOutcome::AlreadyActive);
            }
            *state = RelayStatus::Connecting;
        }
        self.emit(RelayStatus::Connecting);
        debug!("connecting to {}", self.url);

        let socket = match self
            .transport
            .open(&self.url, self.config.connect_timeout)
            .await
        {
            Ok(socket) => socket,
            Err(error) => {
                *self.state.write().await = RelayStatus::Error;
                self.emit(RelayStatus::Error);
                return Err(error);
            }
        };

        let generation = {
            let mut state = self.state.write().await;
            if *state != RelayStatus::Connecting {
                // disconnect() ran while the socket was opening.
                socket.sink.close();
                return Err(ClientError::Connection(format!(
                    "{} was disconnected while connecting",
                    self.url
                )));
            }
            *self.sink.lock().await = Some(socket.sink);
            *state = RelayStatus::Open;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let task = tokio::spawn(receive_loop(
            ReceiveContext {
                relay_url: self.url.to_string(),
                state: Arc::clone(&self.state),
                sink: Arc::clone(&self.sink),
                subscriptions: Arc::clone(&self.subscriptions),
                pending: Arc::clone(&self.pending),
                generation: Arc::clone(&self.generation),
                status_hook: self.status_hook.clone(),
                one_shot_hook: self.one_shot_hook.clone(),
                connection: generation,
            },
            socket.inbound,
        ));
        if let Some(previous) = self.recv_task.lock().await.replace(task) {
            previous.abort();
        }

        info!("connected to {}", self.url);
        self.emit(RelayStatus::Open);
        Ok(ConnectOutcome::Opened)
    }

    /// Disconnect from relay and stop background tasks.
    ///
    /// Drops the subscription table and fails pending publishes.
    pub async fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.recv_task.lock().await.take() {
            task.abort();
        }
        if let Some(sink) = self.sink.lock().await.take() {
            sink.close();
        }

        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, RelayStatus::Closed)
        };
        self.subscriptions.lock().await.clear();
        self.pending.lock().await.clear();

        if previous != RelayStatus::Closed {
            info!("disconnected from {}", self.url);
            self.emit(RelayStatus::Closed);
        }
    }

    /// Open a subscription on this relay.
    ///
    /// An existing subscription with the same id is closed first.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        if !self.is_open().await {
            return Err(ClientError::NotConnected);
        }

        let request = ClientMessage::Req {
            subscription_id: subscription.id.clone(),
            filters: subscription.filters.clone(),
        }
        .to_json()?;
        let subscription_id = subscription.id.clone();

        let replaced = self
            .subscriptions
            .lock()
            .await
            .insert(subscription_id.clone(), subscription)
            .is_some();
        if replaced {
            debug!("replacing subscription {} on {}", subscription_id, self.url);
            self.send_message(&ClientMessage::Close(subscription_id.clone()))
                .await?;
        }

        if let Err(error) = self.send_text(request).await {
            self.subscriptions.lock().await.remove(&subscription_id);
            return Err(error);
        }
        Ok(())
    }

    /// Close a subscription on this relay. Unknown ids are ignored.
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        let removed = self
            .subscriptions
            .lock()
            .await
            .remove(subscription_id)
            .is_some();
        if removed && self.is_open().await {
            self.send_message(&ClientMessage::Close(subscription_id.to_string()))
                .await?;
        }
        Ok(())
    }

    /// Publish an event and wait for the relay's `OK`.
    pub async fn publish(&self, event: &Event) -> PublishOutcome {
        let relay_url = self.url();
        if !self.is_open().await {
            return PublishOutcome::failed(relay_url, &event.id, "not connected");
        }
        let frame = match ClientMessage::Event(event.clone()).to_json() {
            Ok(frame) => frame,
            Err(error) => return PublishOutcome::failed(relay_url, &event.id, error.to_string()),
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.lock().await.insert(event.id.clone(), ack_tx);
        if let Err(error) = self.send_text(frame).await {
            self.pending.lock().await.remove(&event.id);
            return PublishOutcome::failed(relay_url, &event.id, error.to_string());
        }

        let status = match timeout(self.config.publish_timeout, ack_rx).await {
            Ok(Ok((true, message))) if message.starts_with("duplicate:") => PublishStatus::Seen,
            Ok(Ok((true, _))) => PublishStatus::Accepted,
            Ok(Ok((false, message))) if message.is_empty() => {
                PublishStatus::Failed("rejected".to_string())
            }
            Ok(Ok((false, message))) => PublishStatus::Failed(message),
            Ok(Err(_)) => PublishStatus::Failed("connection closed".to_string()),
            Err(_) => {
                self.pending.lock().await.remove(&event.id);
                PublishStatus::Failed(format!(
                    "no OK within {:?}",
                    self.config.publish_timeout
                ))
            }
        };

        if let PublishStatus::Failed(reason) = &status {
            warn!("publish of {} to {} failed: {}", event.id, relay_url, reason);
        }
        PublishOutcome {
            relay_url: relay_url.to_string(),
            event_id: event.id.clone(),
            status,
        }
    }

    async fn send_message(&self, message: &ClientMessage) -> Result<()> {
        self.send_text(message.to_json()?).await
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let sink = self.sink.lock().await;
        sink.as_ref().ok_or(ClientError::NotConnected)?.send(text)
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        if let Ok(mut task) = self.recv_task.try_lock()
            && let Some(task) = task.take()
        {
            task.abort();
        }
    }
}

struct ReceiveContext {
    relay_url: String,
    state: Arc<RwLock<RelayStatus>>,
    sink: SharedSink,
    subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
    pending: PendingAcks,
    generation: Arc<AtomicU64>,
    status_hook: Option<StatusHook>,
    one_shot_hook: Option<OneShotHook>,
    connection: u64,
}

impl ReceiveContext {
    async fn handle(&self, message: RelayMessage) {
        match message {
            RelayMessage::Event(subscription_id, event) => {
                let subscription = {
                    self.subscriptions
                        .lock()
                        .await
                        .get(&subscription_id)
                        .cloned()
                };
                match subscription {
                    Some(subscription) => {
                        if let Err(error) = subscription.handle_event(event) {
                            warn!(
                                "subscription {} callback error on {}: {}",
                                subscription_id, self.relay_url, error
                            );
                        }
                    }
                    None => debug!(
                        "ignoring event for unknown subscription {} on {}",
                        subscription_id, self.relay_url
                    ),
                }
            }
            RelayMessage::Eose(subscription_id) => {
                let close = {
                    let mut subscriptions = self.subscriptions.lock().await;
                    match subscriptions.get(&subscription_id) {
                        Some(subscription) => {
                            subscription.mark_eose();
                            subscription.close_on_eose
                                && subscriptions.remove(&subscription_id).is_some()
                        }
                        None => false,
                    }
                };
                if close {
                    debug!(
                        "closing one-shot subscription {} on {}",
                        subscription_id, self.relay_url
                    );
                    let sent = match ClientMessage::Close(subscription_id.clone()).to_json() {
                        Ok(frame) => match self.sink.lock().await.as_ref() {
                            Some(sink) => sink.send(frame),
                            None => Err(ClientError::NotConnected),
                        },
                        Err(error) => Err(error),
                    };
                    if let Err(error) = sent {
                        warn!("failed to close subscription on {}: {}", self.relay_url, error);
                    }
                    if let Some(hook) = &self.one_shot_hook {
                        hook(&self.relay_url, &subscription_id);
                    }
                }
            }
            RelayMessage::Ok(event_id, accepted, message) => {
                if let Some(ack) = self.pending.lock().await.remove(&event_id) {
                    let _ = ack.send((accepted, message));
                }
            }
            RelayMessage::Closed(subscription_id, message) => {
                self.subscriptions.lock().await.remove(&subscription_id);
                info!(
                    "{} closed subscription {}: {}",
                    self.relay_url, subscription_id, message
                );
            }
            RelayMessage::Notice(message) => {
                info!("notice from {}: {}", self.relay_url, message);
            }
            RelayMessage::Auth(challenge) => {
                debug!("auth challenge from {}: {}", self.relay_url, challenge);
            }
        }
    }

    /// Connection ended on the relay side.
    async fn finish(&self) {
        if self.generation.load(Ordering::SeqCst) != self.connection {
            return;
        }
        self.sink.lock().await.take();
        *self.state.write().await = RelayStatus::Closed;
        self.subscriptions.lock().await.clear();
        self.pending.lock().await.clear();
        warn!("connection to {} closed", self.relay_url);
        if let Some(hook) = &self.status_hook {
            hook(&self.relay_url, RelayStatus::Closed);
        }
    }
}

async fn receive_loop(context: ReceiveContext, mut inbound: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = inbound.recv().await {
        match parse_relay_message(&text) {
            Ok(Some(message)) => context.handle(message).await,
            Ok(None) => {}
            Err(error) => warn!("protocol parse error on {}: {}", context.relay_url, error),
        }
    }
    context.finish().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryTransport, PublishReply};
    use nostr::Filter;
    use std::sync::Mutex as StdMutex;

    const URL: &str = "wss://relay.example";

    fn note(id: &str) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "a".repeat(64),
            created_at: 10,
            kind: 1,
            tags: vec![],
            content: "hello".to_string(),
            sig: "s".repeat(128),
        }
    }

    fn relay(transport: &Arc<MemoryTransport>) -> RelayConnection {
        let transport: Arc<dyn RelayTransport> = transport.clone();
        RelayConnection::with_transport(URL, RelayConfig::default(), transport).unwrap()
    }

    fn collecting(id: &str) -> (Subscription, Arc<StdMutex<Vec<String>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = Subscription::with_callback(
            id,
            vec![Filter::new().kinds([1])],
            Arc::new(move |event: Event| {
                sink.lock().unwrap().push(event.id);
                Ok(())
            }),
        );
        (subscription, seen)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn rejects_non_websocket_urls() {
        assert!(matches!(
            RelayConnection::new("https://relay.example"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(RelayConnection::new("not a url").is_err());
        assert_eq!(
            RelayConnection::new(URL).unwrap().url(),
            "wss://relay.example/"
        );
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);

        assert_eq!(relay.connect().await.unwrap(), ConnectOutcome::Opened);
        assert_eq!(relay.connect().await.unwrap(), ConnectOutcome::AlreadyActive);
        assert_eq!(transport.relay(URL).connections_opened(), 1);
        assert_eq!(relay.status().await, RelayStatus::Open);
    }

    #[tokio::test]
    async fn failed_connect_reports_error_status() {
        let transport = Arc::new(MemoryTransport::new());
        transport.relay(URL).set_reachable(false);
        let statuses = Arc::new(StdMutex::new(Vec::new()));
        let record = Arc::clone(&statuses);
        let relay = relay(&transport).on_status(Arc::new(move |_: &str, status: RelayStatus| {
            record.lock().unwrap().push(status);
        }));

        assert!(relay.connect().await.is_err());
        assert_eq!(relay.status().await, RelayStatus::Error);
        assert_eq!(
            *statuses.lock().unwrap(),
            vec![RelayStatus::Connecting, RelayStatus::Error]
        );

        transport.relay(URL).set_reachable(true);
        assert_eq!(relay.connect().await.unwrap(), ConnectOutcome::Opened);
    }

    #[tokio::test]
    async fn routes_events_and_ignores_unknown_subscriptions() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();

        let (subscription, seen) = collecting("feed");
        relay.subscribe(subscription).await.unwrap();
        let server = transport.relay(URL);
        server.broadcast(note("one"));
        server.send(&RelayMessage::Event("other".to_string(), note("two")));
        server.send_raw("not json");
        server.broadcast(note("three"));
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["one", "three"]);
        assert_eq!(relay.status().await, RelayStatus::Open);
    }

    #[tokio::test]
    async fn resubscribe_sends_close_then_req() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();

        relay.subscribe(Subscription::new("feed", vec![])).await.unwrap();
        relay.subscribe(Subscription::new("feed", vec![])).await.unwrap();

        let received = transport.relay(URL).received();
        assert!(matches!(received[1], ClientMessage::Close(ref id) if id == "feed"));
        assert!(matches!(received[2], ClientMessage::Req { .. }));
        assert_eq!(relay.subscription_ids().await, vec!["feed"]);
    }

    #[tokio::test]
    async fn eose_closes_one_shot_subscriptions() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();

        let once = Subscription::new("once", vec![Filter::new().kinds([0])]).close_on_eose();
        relay.subscribe(once.clone()).await.unwrap();
        settle().await;

        assert!(once.has_eose());
        assert!(!relay.has_subscription("once").await);
        assert!(transport.relay(URL).active_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn one_shot_hook_reports_finished_subscriptions() {
        let transport = Arc::new(MemoryTransport::new());
        let finished = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&finished);
        let relay = relay(&transport).on_one_shot_done(Arc::new(move |url: &str, id: &str| {
            sink.lock().unwrap().push((url.to_string(), id.to_string()));
        }));
        relay.connect().await.unwrap();

        relay
            .subscribe(Subscription::new("feed", vec![Filter::new().kinds([1])]))
            .await
            .unwrap();
        relay
            .subscribe(Subscription::new("once", vec![Filter::new().kinds([0])]).close_on_eose())
            .await
            .unwrap();
        settle().await;

        assert_eq!(
            *finished.lock().unwrap(),
            vec![("wss://relay.example/".to_string(), "once".to_string())]
        );
        assert!(relay.has_subscription("feed").await);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_id_is_noop() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();

        relay.unsubscribe("missing").await.unwrap();
        assert!(transport.relay(URL).received().is_empty());
    }

    #[tokio::test]
    async fn publish_maps_ok_replies() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        let server = transport.relay(URL);

        let offline = relay.publish(&note("x")).await;
        assert_eq!(offline.status, PublishStatus::Failed("not connected".to_string()));

        relay.connect().await.unwrap();
        assert_eq!(relay.publish(&note("a")).await.status, PublishStatus::Accepted);

        server.set_publish_reply(PublishReply::Duplicate);
        assert_eq!(relay.publish(&note("b")).await.status, PublishStatus::Seen);

        server.set_publish_reply(PublishReply::Reject("blocked: spam".to_string()));
        let rejected = relay.publish(&note("c")).await;
        assert_eq!(
            rejected.status,
            PublishStatus::Failed("blocked: spam".to_string())
        );
        assert!(!rejected.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn publish_times_out_without_ok() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();
        transport.relay(URL).set_publish_reply(PublishReply::Ignore);

        let outcome = relay.publish(&note("a")).await;
        assert!(matches!(outcome.status, PublishStatus::Failed(ref reason) if reason.starts_with("no OK")));
    }

    #[tokio::test]
    async fn remote_close_clears_state() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();
        relay.subscribe(Subscription::new("feed", vec![])).await.unwrap();

        transport.relay(URL).drop_connection();
        settle().await;

        assert_eq!(relay.status().await, RelayStatus::Closed);
        assert!(relay.subscription_ids().await.is_empty());
        assert_eq!(relay.connect().await.unwrap(), ConnectOutcome::Opened);
    }

    #[tokio::test]
    async fn disconnect_closes_socket() {
        let transport = Arc::new(MemoryTransport::new());
        let relay = relay(&transport);
        relay.connect().await.unwrap();
        relay.subscribe(Subscription::new("feed", vec![])).await.unwrap();

        relay.disconnect().await;
        assert_eq!(relay.status().await, RelayStatus::Closed);
        assert!(!transport.relay(URL).is_connected());
        assert!(matches!(
            relay.subscribe(Subscription::new("late", vec![])).await,
            Err(ClientError::NotConnected)
        ));
    }
}
