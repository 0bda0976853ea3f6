//! Nostr relay pool and subscription multiplexer.
//!
//! - one `RelayConnection` per relay over a pluggable `RelayTransport`
//! - `RelayPool` fanning subscriptions and publishes out to every relay and
//!   replaying subscriptions onto relays that (re)open
//! - batched profile metadata fetching into a persisted `ProfileCache`
//! - `NostrClient` tying it together for applications

pub mod client;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod memory;
pub mod message;
pub mod pool;
pub mod profiles;
pub mod registry;
pub mod relay;
pub mod scheduler;
pub mod settings;
pub mod signer;
pub mod status;
pub mod subscription;
pub mod transport;

pub use client::NostrClient;
pub use coalescer::{CoalescerConfig, FlushDecision, ProfileFetchCoalescer};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use memory::{MemoryRelay, MemoryTransport, PublishReply};
pub use message::{ClientMessage, RelayMessage, parse_relay_message};
pub use pool::{PoolConfig, RelayPool};
pub use profiles::{ProfileCache, ProfileCacheEntry, ProfileConflictPolicy};
pub use registry::SubscriptionRegistry;
pub use relay::{
    ConnectOutcome, PublishOutcome, PublishStatus, RelayConfig, RelayConnection, RelayStatus,
};
pub use scheduler::RepeatingTask;
pub use settings::{FileSettingsStore, MemorySettingsStore, SettingsStore};
pub use signer::{LocalKeySigner, Signer};
pub use status::{ConnectedListener, ConnectedRelays, ListenerHandle};
pub use subscription::{EventCallback, Subscription};
pub use transport::{FrameSink, RelaySocket, RelayTransport, WebSocketTransport};
