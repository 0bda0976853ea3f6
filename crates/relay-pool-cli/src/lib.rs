#![expect(clippy::print_stdout, reason = "command results are written to stdout")]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nostr::{
    Event, EventDeduper, EventTemplate, Filter, KIND_LIVE_EVENT, KIND_ZAP_RECEIPT, LiveEvent,
    ZapReceipt, latest_versions,
};
use nostr_client::relay::parse_relay_url;
use nostr_client::{
    ClientConfig, FileSettingsStore, LocalKeySigner, NostrClient, PublishStatus, SettingsStore,
    Subscription,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

/// Environment variable holding the hex secret key used by `publish`.
pub const SECRET_KEY_ENV: &str = "NOSTR_SECRET_KEY";

#[derive(Parser, Debug)]
#[command(name = "relaypool")]
#[command(about = "Nostr relay pool: manage relays, watch feeds, fetch profiles, publish")]
pub struct RelayPoolCli {
    /// Config file (defaults to $NOSTR_POOL_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding relays.json and profiles.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the saved relay list
    Relays {
        #[command(subcommand)]
        command: RelaysCommand,
    },
    /// Subscribe and print matching events as JSON lines
    Watch(WatchArgs),
    /// Fetch profile metadata for one or more pubkeys
    Profile(ProfileArgs),
    /// Sign a note with a local key and publish it
    Publish(PublishArgs),
}

#[derive(Subcommand, Debug)]
pub enum RelaysCommand {
    List,
    Add { url: String },
    Remove { url: String },
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Event kinds (repeatable)
    #[arg(long = "kind")]
    pub kinds: Vec<u16>,
    /// Author pubkeys in hex (repeatable)
    #[arg(long = "author")]
    pub authors: Vec<String>,
    /// Hashtags matched against `t` tags (repeatable)
    #[arg(long = "hashtag")]
    pub hashtags: Vec<String>,
    #[arg(long)]
    pub since: Option<u64>,
    #[arg(long)]
    pub limit: Option<u64>,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,
    /// Print every relay-delivered copy instead of deduplicating by id
    #[arg(long)]
    pub no_dedup: bool,
    /// One line per event; live activities and zap receipts are decoded
    #[arg(long)]
    pub summary: bool,
    /// Buffer until the watch ends, then print only the newest version of
    /// replaceable and addressable events
    #[arg(long)]
    pub latest: bool,
}

impl WatchArgs {
    pub fn filter(&self) -> Filter {
        let mut filter = Filter::new();
        if !self.kinds.is_empty() {
            filter = filter.kinds(self.kinds.iter().copied());
        }
        if !self.authors.is_empty() {
            filter = filter.authors(self.authors.iter().cloned());
        }
        if !self.hashtags.is_empty() {
            filter = filter.tag("t", self.hashtags.iter().map(|t| t.to_lowercase()));
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        filter
    }
}

#[derive(clap::Args, Debug)]
pub struct ProfileArgs {
    /// Pubkeys in hex
    #[arg(required = true)]
    pub pubkeys: Vec<String>,
    /// How long to wait for relays to answer
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,
}

#[derive(clap::Args, Debug)]
pub struct PublishArgs {
    #[arg(long)]
    pub content: String,
    #[arg(long, default_value_t = 1)]
    pub kind: u16,
    /// Tags as `name=value` (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Secret key in hex; falls back to $NOSTR_SECRET_KEY
    #[arg(long)]
    pub secret_key_hex: Option<String>,
}

impl PublishArgs {
    pub fn parsed_tags(&self) -> Result<Vec<Vec<String>>> {
        self.tags
            .iter()
            .map(|tag| match tag.split_once('=') {
                Some((name, value)) if !name.is_empty() => {
                    Ok(vec![name.to_string(), value.to_string()])
                }
                _ => bail!("invalid tag {:?}, expected name=value", tag),
            })
            .collect()
    }
}

fn load_config(cli: &RelayPoolCli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClientConfig::load().context("failed to load config")?,
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = Some(data_dir.clone());
    }
    Ok(config)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

pub async fn run() -> Result<()> {
    let cli = RelayPoolCli::parse();
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Relays { command } => run_relays(&config, command),
        Commands::Watch(args) => run_watch(config, args).await,
        Commands::Profile(args) => run_profile(config, args).await,
        Commands::Publish(args) => run_publish(config, args).await,
    }
}

fn run_relays(config: &ClientConfig, command: RelaysCommand) -> Result<()> {
    let store = FileSettingsStore::new(config.data_path());
    let saved = match store.load_relays()? {
        Some(relays) => relays,
        None => config.relays.clone(),
    };
    let mut relays: Vec<String> = saved
        .iter()
        .filter_map(|relay| parse_relay_url(relay).ok())
        .map(|url| url.to_string())
        .collect();

    match command {
        RelaysCommand::List => {
            for relay in relays {
                println!("{relay}");
            }
            return Ok(());
        }
        RelaysCommand::Add { url } => {
            let url = parse_relay_url(&url)?.to_string();
            if relays.contains(&url) {
                println!("{url} already saved");
                return Ok(());
            }
            relays.push(url.clone());
            println!("added {url}");
        }
        RelaysCommand::Remove { url } => {
            let url = parse_relay_url(&url)?.to_string();
            let before = relays.len();
            relays.retain(|relay| *relay != url);
            if relays.len() == before {
                println!("{url} is not saved");
                return Ok(());
            }
            println!("removed {url}");
        }
    }

    store
        .save_relays(&relays)
        .with_context(|| format!("failed to save relays in {}", store.dir().display()))
}

async fn connect(config: ClientConfig) -> Result<NostrClient> {
    let client = NostrClient::websocket(config);
    client.init().await.context("failed to start client")?;
    if client.connected_relays().is_empty() {
        bail!("no relay could be reached");
    }
    Ok(client)
}

async fn run_watch(config: ClientConfig, args: WatchArgs) -> Result<()> {
    let client = connect(config).await?;
    let (subscription, mut events) = Subscription::with_channel("watch", vec![args.filter()]);
    client.add_subscription(subscription).await?;
    info!("watching {} relays", client.connected_relays().len());

    let deadline = args.duration.map(Duration::from_secs);
    let stop = async {
        match deadline {
            Some(duration) => tokio::time::sleep(duration).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    tokio::pin!(stop);

    let mut deduper = EventDeduper::new();
    let mut buffered = Vec::new();
    loop {
        tokio::select! {
            () = &mut stop => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                if args.latest {
                    buffered.push(event);
                    continue;
                }
                if !args.no_dedup && !deduper.insert(&event) {
                    continue;
                }
                print_event(&event, args.summary)?;
            }
        }
    }

    client.dispose().await;
    for event in latest_versions(buffered) {
        print_event(&event, args.summary)?;
    }
    Ok(())
}

fn print_event(event: &Event, summary: bool) -> Result<()> {
    if summary {
        println!("{}", summarize(event));
    } else {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn summarize(event: &Event) -> String {
    match event.kind {
        KIND_LIVE_EVENT => match LiveEvent::from_event(event) {
            Ok(live) => format!(
                "live {} [{}] {} host={} viewers={}",
                live.address(),
                live.status.map_or("unknown", |status| status.as_str()),
                live.title.as_deref().unwrap_or("(untitled)"),
                live.host(),
                live.current_participants.unwrap_or_default(),
            ),
            Err(err) => format!("live {} undecodable: {}", event.id, err),
        },
        KIND_ZAP_RECEIPT => match ZapReceipt::from_event(event) {
            Ok(zap) => format!(
                "zap {} sats -> {} from {} {:?}",
                zap.amount_sats()
                    .map_or_else(|| "?".to_string(), |sats| sats.to_string()),
                zap.recipient,
                zap.sender.as_deref().unwrap_or("anonymous"),
                zap.comment,
            ),
            Err(err) => format!("zap {} undecodable: {}", event.id, err),
        },
        kind => {
            let preview: String = event.content.chars().take(80).collect();
            format!("{} kind={} {} {:?}", event.created_at, kind, event.pubkey, preview)
        }
    }
}

async fn run_profile(config: ClientConfig, args: ProfileArgs) -> Result<()> {
    let client = connect(config).await?;
    for pubkey in &args.pubkeys {
        client
            .add_profile_to_fetch(pubkey)
            .await
            .with_context(|| format!("invalid pubkey {pubkey}"))?;
    }
    tokio::time::sleep(Duration::from_millis(args.wait_ms)).await;

    for pubkey in &args.pubkeys {
        if let Some(profile) = client.profile(pubkey) {
            println!("{}", serde_json::to_string(&profile)?);
        }
    }
    client.dispose().await;
    Ok(())
}

async fn run_publish(config: ClientConfig, args: PublishArgs) -> Result<()> {
    let secret_key_hex = match &args.secret_key_hex {
        Some(key) => key.clone(),
        None => std::env::var(SECRET_KEY_ENV)
            .with_context(|| format!("pass --secret-key-hex or set {SECRET_KEY_ENV}"))?,
    };
    let signer = LocalKeySigner::from_hex(&secret_key_hex)?;
    let template = EventTemplate {
        created_at: unix_now(),
        kind: args.kind,
        tags: args.parsed_tags()?,
        content: args.content.clone(),
    };

    let client = connect(config).await?.with_signer(Arc::new(signer));
    let (event, outcomes) = client.sign_and_publish(template).await?;
    println!("{}", event.id);
    for outcome in &outcomes {
        match &outcome.status {
            PublishStatus::Accepted => println!("{}\taccepted", outcome.relay_url),
            PublishStatus::Seen => println!("{}\tduplicate", outcome.relay_url),
            PublishStatus::Failed(reason) => println!("{}\tfailed: {}", outcome.relay_url, reason),
        }
    }
    client.dispose().await;

    if !outcomes.iter().any(|outcome| outcome.is_success()) {
        bail!("no relay accepted the event");
    }
    Ok(())
}
