//! Relay pool for multi-relay fanout.
//!
//! The pool owns one `RelayConnection` per URL and a registry of logical
//! subscriptions. Registry entries are opened on every open relay and
//! replayed whenever a relay (re)opens, so callers subscribe once regardless
//! of which relays are currently reachable.

use crate::error::{ClientError, Result};
use crate::registry::SubscriptionRegistry;
use crate::relay::{
    ConnectOutcome, PublishOutcome, RelayConfig, RelayConnection, RelayStatus, parse_relay_url,
};
use crate::status::{ConnectedListener, ConnectedRelays, ListenerHandle};
use crate::subscription::Subscription;
use crate::transport::{RelayTransport, WebSocketTransport};
use futures_util::future::join_all;
use nostr::Event;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Drop a finished one-shot subscription from the registry once no relay
/// still has it open, so reconnects do not replay it.
async fn retire_one_shot(
    relays: &Weak<RelayMap>,
    registry: &Weak<RwLock<SubscriptionRegistry>>,
    id: &str,
) {
    let (Some(relays), Some(registry)) = (relays.upgrade(), registry.upgrade()) else {
        return;
    };
    let relays: Vec<Arc<RelayConnection>> = relays.read().await.values().cloned().collect();
    for relay in &relays {
        if relay.has_subscription(id).await {
            return;
        }
    }

    let mut registry = registry.write().await;
    if registry.get(id).is_some_and(|subscription| subscription.close_on_eose) {
        registry.remove(id);
        debug!("retired one-shot subscription {}", id);
    }
}

/// Relay pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of relays in the pool.
    pub max_relays: usize,
    /// Relay configuration template.
    pub relay_config: RelayConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_relays: 16,
            relay_config: RelayConfig::default(),
        }
    }
}

type RelayMap = RwLock<HashMap<String, Arc<RelayConnection>>>;

/// Multi-relay pool with a shared subscription registry.
pub struct RelayPool {
    relays: Arc<RelayMap>,
    registry: Arc<RwLock<SubscriptionRegistry>>,
    connected: ConnectedRelays,
    transport: Arc<dyn RelayTransport>,
    config: PoolConfig,
}

impl RelayPool {
    /// Create a WebSocket relay pool.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    /// Create a pool over any transport.
    pub fn with_transport(config: PoolConfig, transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            relays: Arc::new(RwLock::new(HashMap::new())),
            registry: Arc::new(RwLock::new(SubscriptionRegistry::new())),
            connected: ConnectedRelays::new(),
            transport,
            config,
        }
    }

    /// Add a relay and connect it.
    ///
    /// Connection failures are logged, not returned; the heartbeat retries.
    /// Returns `false` if the relay was already managed.
    pub async fn add_relay(&self, url: &str) -> Result<bool> {
        let Some(relay) = self.insert_relay(url).await? else {
            return Ok(false);
        };
        self.connect_relay(&relay).await;
        Ok(true)
    }

    /// Add a relay without connecting it.
    pub(crate) async fn insert_relay(&self, url: &str) -> Result<Option<Arc<RelayConnection>>> {
        let key = parse_relay_url(url)?.to_string();
        let mut relays = self.relays.write().await;
        if relays.contains_key(&key) {
            return Ok(None);
        }
        if relays.len() >= self.config.max_relays {
            return Err(ClientError::InvalidRequest(format!(
                "maximum relay limit ({}) reached",
                self.config.max_relays
            )));
        }

        let connected = self.connected.clone();
        let weak_relays = Arc::downgrade(&self.relays);
        let weak_registry = Arc::downgrade(&self.registry);
        let relay = RelayConnection::with_transport(
            &key,
            self.config.relay_config.clone(),
            Arc::clone(&self.transport),
        )?
        .on_status(Arc::new(move |url: &str, status: RelayStatus| {
            connected.set(url, status == RelayStatus::Open);
        }))
        .on_one_shot_done(Arc::new(move |_: &str, id: &str| {
            let relays = Weak::clone(&weak_relays);
            let registry = Weak::clone(&weak_registry);
            let id = id.to_string();
            tokio::spawn(async move { retire_one_shot(&relays, &registry, &id).await });
        }));
        let relay = Arc::new(relay);
        relays.insert(key.clone(), Arc::clone(&relay));
        info!("added relay {}", key);
        Ok(Some(relay))
    }

    /// Disconnect and forget a relay. Registry subscriptions are untouched.
    pub async fn remove_relay(&self, url: &str) -> Result<bool> {
        let key = parse_relay_url(url)?.to_string();
        let removed = self.relays.write().await.remove(&key);
        let Some(relay) = removed else {
            return Ok(false);
        };
        relay.disconnect().await;
        self.connected.set(&key, false);
        info!("removed relay {}", key);
        Ok(true)
    }

    /// Connect every managed relay concurrently; returns how many are open.
    ///
    /// Open relays are left alone, so this is safe to call repeatedly.
    pub async fn connect(&self) -> usize {
        let relays = self.relay_list().await;
        join_all(relays.iter().map(|relay| self.connect_relay(relay)))
            .await
            .into_iter()
            .filter(|open| *open)
            .count()
    }

    async fn connect_relay(&self, relay: &Arc<RelayConnection>) -> bool {
        match relay.connect().await {
            Ok(ConnectOutcome::Opened) => {
                self.replay(relay).await;
                true
            }
            Ok(ConnectOutcome::AlreadyActive) => relay.is_open().await,
            Err(error) => {
                warn!("failed to connect to {}: {}", relay.url(), error);
                false
            }
        }
    }

    /// Open every registry subscription on a freshly opened relay.
    async fn replay(&self, relay: &RelayConnection) {
        let subscriptions = self.registry.read().await.snapshot();
        if !subscriptions.is_empty() {
            debug!(
                "replaying {} subscriptions on {}",
                subscriptions.len(),
                relay.url()
            );
        }
        for subscription in subscriptions {
            // Removal waits on this guard, so its CLOSE pass follows the REQ.
            let registry = self.registry.read().await;
            if !registry.contains(&subscription.id) {
                continue;
            }
            let id = subscription.id.clone();
            if let Err(error) = relay.subscribe(subscription).await {
                warn!("failed to replay {} on {}: {}", id, relay.url(), error);
            }
            drop(registry);
        }
    }

    /// Disconnect all relays. They stay managed.
    pub async fn disconnect_all(&self) {
        let relays = self.relay_list().await;
        join_all(relays.iter().map(|relay| relay.disconnect())).await;
    }

    /// Register a subscription and open it on every open relay.
    ///
    /// An existing subscription with the same id is superseded.
    pub async fn add_subscription(&self, subscription: Subscription) {
        let replaced = self
            .registry
            .write()
            .await
            .insert(subscription.clone())
            .is_some();
        if replaced {
            debug!("superseding subscription {}", subscription.id);
        }

        let relays = self.relay_list().await;
        let opens = relays.iter().map(|relay| {
            let subscription = subscription.clone();
            async move {
                if !relay.is_open().await {
                    return;
                }
                let id = subscription.id.clone();
                if let Err(error) = relay.subscribe(subscription).await {
                    warn!("failed to open {} on {}: {}", id, relay.url(), error);
                }
            }
        });
        join_all(opens).await;
    }

    /// Close a subscription everywhere and drop it from the registry.
    ///
    /// Unknown ids are a no-op.
    pub async fn remove_subscription(&self, id: &str) {
        self.registry.write().await.remove(id);
        let relays = self.relay_list().await;
        let closes = relays.iter().map(|relay| async move {
            if let Err(error) = relay.unsubscribe(id).await {
                debug!("failed to close {} on {}: {}", id, relay.url(), error);
            }
        });
        join_all(closes).await;
    }

    /// Remove every registered subscription.
    pub async fn remove_all_subscriptions(&self) {
        let ids = self.registry.read().await.ids();
        for id in ids {
            self.remove_subscription(&id).await;
        }
    }

    /// Publish to every managed relay; one outcome per relay, sorted by URL.
    ///
    /// Relays that are not open report `Failed("not connected")`.
    pub async fn publish(&self, event: &Event) -> Vec<PublishOutcome> {
        let relays = self.relay_list().await;
        join_all(relays.iter().map(|relay| relay.publish(event))).await
    }

    /// Open relays, sorted.
    pub fn connected_relays(&self) -> Vec<String> {
        self.connected.snapshot()
    }

    /// Listen for changes to the set of open relays.
    pub fn on_connected_change(&self, listener: ConnectedListener) -> ListenerHandle {
        self.connected.subscribe(listener)
    }

    /// Managed relay URLs, sorted.
    pub async fn relay_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.relays.read().await.keys().cloned().collect();
        urls.sort();
        urls
    }

    /// Get relay by URL.
    pub async fn relay(&self, url: &str) -> Option<Arc<RelayConnection>> {
        let key = parse_relay_url(url).ok()?.to_string();
        self.relays.read().await.get(&key).cloned()
    }

    /// Registered subscription ids, sorted.
    pub async fn subscription_ids(&self) -> Vec<String> {
        self.registry.read().await.ids()
    }

    async fn relay_list(&self) -> Vec<Arc<RelayConnection>> {
        let mut relays: Vec<Arc<RelayConnection>> =
            self.relays.read().await.values().cloned().collect();
        relays.sort_by(|a, b| a.url().cmp(b.url()));
        relays
    }
}
