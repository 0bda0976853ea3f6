//! `NostrClient`: the application-facing service.
//!
//! Wires the relay pool, the persisted relay list, the profile cache and the
//! profile fetch coalescer together. Construct one per application and call
//! `init` once; there is no global instance.

use crate::coalescer::{FlushDecision, ProfileFetchCoalescer};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::pool::RelayPool;
use crate::profiles::{ProfileCache, ProfileCacheEntry};
use crate::relay::{PublishOutcome, parse_relay_url};
use crate::scheduler::{RepeatingTask, spawn_at};
use crate::settings::{FileSettingsStore, SettingsStore};
use crate::signer::Signer;
use crate::status::{ConnectedListener, ListenerHandle};
use crate::subscription::{EventCallback, Subscription};
use crate::transport::{RelayTransport, WebSocketTransport};
use nostr::{Event, EventTemplate, Filter, KIND_METADATA, verify_event};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turns queued pubkeys into batched kind 0 subscriptions.
struct ProfileFetcher {
    pool: Arc<RelayPool>,
    store: Arc<dyn SettingsStore>,
    coalescer: Mutex<ProfileFetchCoalescer>,
    cache: Arc<Mutex<ProfileCache>>,
    batches: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileFetcher {
    fn add(self: &Arc<Self>, pubkey: &str) {
        lock(&self.cache).ensure(pubkey);
        let decision = lock(&self.coalescer).add(pubkey, Instant::now());
        if let FlushDecision::ScheduleFlush { at } = decision {
            let fetcher = Arc::clone(self);
            let handle = spawn_at(at, async move { fetcher.flush().await });
            if let Some(previous) = lock(&self.timer).replace(handle) {
                previous.abort();
            }
        }
    }

    fn remove(&self, pubkey: &str) -> bool {
        lock(&self.coalescer).remove(pubkey)
    }

    async fn flush(&self) {
        let batch = lock(&self.coalescer).flush_due(Instant::now());
        let Some(authors) = batch else {
            return;
        };

        let id = format!("profiles-{}", self.batches.fetch_add(1, Ordering::SeqCst) + 1);
        let requested: HashSet<String> = authors.iter().cloned().collect();
        let filter = Filter::new()
            .kinds([KIND_METADATA])
            .authors(authors.iter().cloned());

        let cache = Arc::clone(&self.cache);
        let store = Arc::clone(&self.store);
        let callback: EventCallback = Arc::new(move |event: Event| {
            if !requested.contains(&event.pubkey) {
                return Ok(());
            }
            let stored = lock(&cache)
                .apply(&event)
                .map_err(|e| ClientError::InvalidEvent(e.to_string()))?;
            if let Some(entry) = stored
                && let Err(error) = store.save_profile(&entry)
            {
                warn!("failed to persist profile {}: {}", entry.pubkey, error);
            }
            Ok(())
        });

        info!("fetching {} profiles as {}", authors.len(), id);
        self.pool
            .add_subscription(Subscription::with_callback(id, vec![filter], callback).close_on_eose())
            .await;
    }

    fn cancel(&self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
    }
}

/// Application-facing Nostr client.
pub struct NostrClient {
    config: ClientConfig,
    pool: Arc<RelayPool>,
    store: Arc<dyn SettingsStore>,
    signer: Option<Arc<dyn Signer>>,
    relay_list: tokio::sync::Mutex<Vec<String>>,
    profiles: Arc<ProfileFetcher>,
    heartbeat: Mutex<Option<RepeatingTask>>,
}

impl NostrClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn RelayTransport>,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        let pool = Arc::new(RelayPool::with_transport(config.pool_config(), transport));
        let profiles = Arc::new(ProfileFetcher {
            pool: Arc::clone(&pool),
            store: Arc::clone(&store),
            coalescer: Mutex::new(ProfileFetchCoalescer::new(config.coalescer_config())),
            cache: Arc::new(Mutex::new(ProfileCache::new(config.profile_conflict))),
            batches: AtomicU64::new(0),
            timer: Mutex::new(None),
        });
        Self {
            config,
            pool,
            store,
            signer: None,
            relay_list: tokio::sync::Mutex::new(Vec::new()),
            profiles,
            heartbeat: Mutex::new(None),
        }
    }

    /// WebSocket client persisting to the configured data directory.
    pub fn websocket(config: ClientConfig) -> Self {
        let store = Arc::new(FileSettingsStore::new(config.data_path()));
        Self::new(config, Arc::new(WebSocketTransport), store)
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &RelayPool {
        &self.pool
    }

    /// Load persisted state, connect relays and start the reconnect heartbeat.
    ///
    /// The configured relays seed the store the first time.
    pub async fn init(&self) -> Result<()> {
        let relays = match self.store.load_relays()? {
            Some(relays) => relays,
            None => {
                let seeds: Vec<String> = self
                    .config
                    .relays
                    .iter()
                    .filter_map(|url| parse_relay_url(url).ok().map(|url| url.to_string()))
                    .collect();
                self.store.save_relays(&seeds)?;
                seeds
            }
        };
        lock(&self.profiles.cache).load(self.store.load_profiles()?);

        let mut managed = self.relay_list.lock().await;
        managed.clear();
        for url in relays {
            match self.pool.insert_relay(&url).await {
                Ok(_) => {
                    let key = parse_relay_url(&url)?.to_string();
                    if !managed.contains(&key) {
                        managed.push(key);
                    }
                }
                Err(error) => warn!("skipping saved relay {}: {}", url, error),
            }
        }
        let total = managed.len();
        drop(managed);

        let open = self.pool.connect().await;
        info!("connected to {}/{} relays", open, total);
        self.start_heartbeat();
        Ok(())
    }

    fn start_heartbeat(&self) {
        let pool = Arc::clone(&self.pool);
        let task = RepeatingTask::spawn(self.config.reconnect_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                let open = pool.connect().await;
                debug!("heartbeat: {} relays open", open);
            }
        });
        *lock(&self.heartbeat) = Some(task);
    }

    /// Stop timers, drop every subscription and disconnect.
    pub async fn dispose(&self) {
        if let Some(mut heartbeat) = lock(&self.heartbeat).take() {
            heartbeat.cancel();
        }
        self.profiles.cancel();
        self.pool.remove_all_subscriptions().await;
        self.pool.disconnect_all().await;
        info!("nostr client disposed");
    }

    /// Subscribe with a callback invoked once per relay-delivered copy.
    ///
    /// Reusing an active id replaces that subscription.
    pub async fn subscribe(
        &self,
        id: impl Into<String>,
        filters: Vec<Filter>,
        callback: EventCallback,
    ) -> Result<()> {
        self.add_subscription(Subscription::with_callback(id, filters, callback))
            .await
    }

    /// Subscribe with a prepared subscription (channel consumers, one-shot fetches).
    pub async fn add_subscription(&self, subscription: Subscription) -> Result<()> {
        if subscription.id.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "subscription id must not be empty".to_string(),
            ));
        }
        for filter in &subscription.filters {
            filter.validate()?;
        }
        self.pool.add_subscription(subscription).await;
        Ok(())
    }

    /// Close a subscription. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: &str) {
        self.pool.remove_subscription(id).await;
    }

    /// Publish a signed event to every relay.
    ///
    /// Per-relay failures are reported in the outcomes, not as an error.
    pub async fn publish(&self, event: &Event) -> Result<Vec<PublishOutcome>> {
        match verify_event(event) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ClientError::InvalidEvent(format!(
                    "event {} has an invalid id or signature",
                    event.id
                )));
            }
            Err(error) => return Err(ClientError::InvalidEvent(error.to_string())),
        }

        let outcomes = self.pool.publish(event).await;
        let accepted = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "published {} to {}/{} relays",
            event.id,
            accepted,
            outcomes.len()
        );
        Ok(outcomes)
    }

    /// Sign a template with the configured signer, then publish it.
    pub async fn sign_and_publish(
        &self,
        template: EventTemplate,
    ) -> Result<(Event, Vec<PublishOutcome>)> {
        let signer = self.signer.as_ref().ok_or(ClientError::NoSigner)?;
        let event = signer.sign_event(template).await?;
        let outcomes = self.publish(&event).await?;
        Ok((event, outcomes))
    }

    /// Queue a pubkey for a batched metadata fetch.
    pub async fn add_profile_to_fetch(&self, pubkey: &str) -> Result<()> {
        Filter::new().authors([pubkey]).validate()?;
        self.profiles.add(pubkey);
        Ok(())
    }

    /// Drop a pubkey that has not been fetched yet.
    pub fn remove_profile_to_fetch(&self, pubkey: &str) -> bool {
        self.profiles.remove(pubkey)
    }

    pub fn profile(&self, pubkey: &str) -> Option<ProfileCacheEntry> {
        lock(&self.profiles.cache).get(pubkey).cloned()
    }

    pub fn profiles(&self) -> Vec<ProfileCacheEntry> {
        lock(&self.profiles.cache).entries()
    }

    /// Add a relay; the relay list is persisted before it changes in memory.
    pub async fn add_relay(&self, url: &str) -> Result<bool> {
        let key = parse_relay_url(url)?.to_string();
        let mut managed = self.relay_list.lock().await;
        if managed.contains(&key) {
            return Ok(false);
        }
        if managed.len() >= self.config.max_relays {
            return Err(ClientError::InvalidRequest(format!(
                "maximum relay limit ({}) reached",
                self.config.max_relays
            )));
        }

        let mut updated = managed.clone();
        updated.push(key.clone());
        self.store.save_relays(&updated)?;
        *managed = updated;
        drop(managed);

        self.pool.add_relay(&key).await?;
        Ok(true)
    }

    /// Remove a relay; the relay list is persisted before it changes in memory.
    pub async fn remove_relay(&self, url: &str) -> Result<bool> {
        let key = parse_relay_url(url)?.to_string();
        let mut managed = self.relay_list.lock().await;
        if !managed.contains(&key) {
            return Ok(false);
        }

        let updated: Vec<String> = managed.iter().filter(|u| **u != key).cloned().collect();
        self.store.save_relays(&updated)?;
        *managed = updated;
        drop(managed);

        self.pool.remove_relay(&key).await?;
        Ok(true)
    }

    /// Managed relays in the order they were added.
    pub async fn relays(&self) -> Vec<String> {
        self.relay_list.lock().await.clone()
    }

    pub fn connected_relays(&self) -> Vec<String> {
        self.pool.connected_relays()
    }

    pub fn on_connected_relays_change(&self, listener: ConnectedListener) -> ListenerHandle {
        self.pool.on_connected_change(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::settings::MemorySettingsStore;

    fn client(store: Arc<MemorySettingsStore>) -> NostrClient {
        let config = ClientConfig {
            relays: vec!["wss://seed.example".to_string()],
            ..ClientConfig::default()
        };
        let transport: Arc<dyn RelayTransport> = Arc::new(MemoryTransport::new());
        NostrClient::new(config, transport, store)
    }

    #[tokio::test]
    async fn init_seeds_store_from_config() {
        let store = Arc::new(MemorySettingsStore::new());
        let client = client(Arc::clone(&store));
        client.init().await.unwrap();

        assert_eq!(
            store.load_relays().unwrap(),
            Some(vec!["wss://seed.example/".to_string()])
        );
        assert_eq!(client.relays().await, vec!["wss://seed.example/"]);
        assert_eq!(client.connected_relays(), vec!["wss://seed.example/"]);
        client.dispose().await;
        assert!(client.connected_relays().is_empty());
    }

    #[tokio::test]
    async fn init_prefers_saved_relays() {
        let store = Arc::new(MemorySettingsStore::with_relays(["wss://saved.example"]));
        let client = client(store);
        client.init().await.unwrap();
        assert_eq!(client.relays().await, vec!["wss://saved.example/"]);
    }

    #[tokio::test]
    async fn rejects_malformed_filters() {
        let client = client(Arc::new(MemorySettingsStore::new()));
        let result = client
            .subscribe(
                "bad",
                vec![Filter::new().authors(["not-hex"])],
                Arc::new(|_| Ok(())),
            )
            .await;
        assert!(matches!(result, Err(ClientError::InvalidFilter(_))));
        assert!(client.pool().subscription_ids().await.is_empty());
    }

    #[tokio::test]
    async fn sign_and_publish_requires_signer() {
        let client = client(Arc::new(MemorySettingsStore::new()));
        let template = EventTemplate {
            created_at: 1,
            kind: 1,
            tags: vec![],
            content: "hi".to_string(),
        };
        assert!(matches!(
            client.sign_and_publish(template).await,
            Err(ClientError::NoSigner)
        ));
    }

    #[tokio::test]
    async fn add_profile_rejects_bad_pubkeys() {
        let client = client(Arc::new(MemorySettingsStore::new()));
        assert!(client.add_profile_to_fetch("npub1xyz").await.is_err());
        assert!(client.profile("npub1xyz").is_none());
    }
}
