//! Integration tests for subscription multiplexing and publish fan-out.

use nostr::{Event, EventDeduper, EventTemplate, Filter, finalize_event, generate_secret_key};
use nostr_client::{
    ClientConfig, ClientError, ClientMessage, EventCallback, MemorySettingsStore, MemoryTransport,
    NostrClient, PublishReply, PublishStatus, RelayTransport,
};
use std::sync::{Arc, Mutex};

const A: &str = "wss://a.example/";
const B: &str = "wss://b.example/";
const C: &str = "wss://c.example/";

fn client_with(transport: &Arc<MemoryTransport>, relays: &[&str]) -> NostrClient {
    let config = ClientConfig {
        relays: relays.iter().map(|r| r.to_string()).collect(),
        ..ClientConfig::default()
    };
    let transport: Arc<dyn RelayTransport> = transport.clone();
    NostrClient::new(config, transport, Arc::new(MemorySettingsStore::new()))
}

fn signed_note(content: &str, kind: u16) -> Event {
    let template = EventTemplate {
        created_at: 1_700_000_000,
        kind,
        tags: vec![],
        content: content.to_string(),
    };
    finalize_event(&template, &generate_secret_key()).unwrap()
}

fn recorder() -> (EventCallback, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: EventCallback = Arc::new(move |event| {
        sink.lock().unwrap().push(event);
        Ok(())
    });
    (callback, seen)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_subscription_replays_onto_relay_that_opens_later() {
    let transport = Arc::new(MemoryTransport::new());
    transport.relay(B).set_reachable(false);
    let client = client_with(&transport, &[A, B]);
    client.init().await.unwrap();
    assert_eq!(client.connected_relays(), vec![A]);

    let (callback, seen) = recorder();
    client
        .subscribe("feed", vec![Filter::new().kinds([1])], callback)
        .await
        .unwrap();
    assert!(transport.relay(B).requests().is_empty());

    transport.relay(B).set_reachable(true);
    assert_eq!(client.pool().connect().await, 2);

    let requests = transport.relay(B).requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "feed");
    assert_eq!(requests[0].1, vec![Filter::new().kinds([1])]);

    transport.relay(B).broadcast(signed_note("late relay", 1));
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(&transport, &[A, B]);
    client.init().await.unwrap();

    let (callback, _) = recorder();
    client
        .subscribe("feed", vec![Filter::new().kinds([1])], callback)
        .await
        .unwrap();
    client.unsubscribe("feed").await;
    client.unsubscribe("feed").await;
    client.unsubscribe("never-existed").await;

    for url in [A, B] {
        let relay = transport.relay(url);
        assert!(relay.active_subscriptions().is_empty());
        let closes = relay
            .received()
            .into_iter()
            .filter(|m| matches!(m, ClientMessage::Close(_)))
            .count();
        assert_eq!(closes, 1, "{url} should see exactly one CLOSE");
    }
    assert!(client.pool().subscription_ids().await.is_empty());
}

#[tokio::test]
async fn test_resubscribe_replaces_filters_and_callback() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(&transport, &[A]);
    client.init().await.unwrap();

    let (first, first_seen) = recorder();
    let (second, second_seen) = recorder();
    client
        .subscribe("feed", vec![Filter::new().kinds([1])], first)
        .await
        .unwrap();
    client
        .subscribe("feed", vec![Filter::new().kinds([7])], second)
        .await
        .unwrap();

    let relay = transport.relay(A);
    let active = relay.active_subscriptions();
    assert_eq!(active.len(), 1);
    assert_eq!(active["feed"], vec![Filter::new().kinds([7])]);

    relay.broadcast(signed_note("note", 1));
    relay.broadcast(signed_note("+", 7));
    settle().await;

    assert!(first_seen.lock().unwrap().is_empty());
    let second_seen = second_seen.lock().unwrap();
    assert_eq!(second_seen.len(), 1);
    assert_eq!(second_seen[0].kind, 7);
}

#[tokio::test]
async fn test_partial_publish_success() {
    let transport = Arc::new(MemoryTransport::new());
    transport
        .relay(B)
        .set_publish_reply(PublishReply::Reject("blocked: not on whitelist".to_string()));
    transport.relay(C).set_reachable(false);
    let client = client_with(&transport, &[A, B, C]);
    client.init().await.unwrap();

    let event = signed_note("hello relays", 1);
    let outcomes = client.publish(&event).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].relay_url, A);
    assert_eq!(outcomes[0].status, PublishStatus::Accepted);
    assert_eq!(
        outcomes[1].status,
        PublishStatus::Failed("blocked: not on whitelist".to_string())
    );
    assert_eq!(
        outcomes[2].status,
        PublishStatus::Failed("not connected".to_string())
    );
    assert!(outcomes.iter().all(|o| o.event_id == event.id));
}

#[tokio::test]
async fn test_publish_reports_connection_lost_before_ok() {
    let transport = Arc::new(MemoryTransport::new());
    transport.relay(A).set_publish_reply(PublishReply::Ignore);
    let client = client_with(&transport, &[A]);
    client.init().await.unwrap();

    let event = signed_note("lost", 1);
    let (outcomes, ()) = tokio::join!(client.publish(&event), async {
        settle().await;
        transport.relay(A).drop_connection();
    });

    let outcomes = outcomes.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].status,
        PublishStatus::Failed("connection closed".to_string())
    );
    assert!(client.connected_relays().is_empty());
}

#[tokio::test]
async fn test_duplicate_publish_reported_as_seen() {
    let transport = Arc::new(MemoryTransport::new());
    transport.relay(A).set_publish_reply(PublishReply::Duplicate);
    let client = client_with(&transport, &[A]);
    client.init().await.unwrap();

    let outcomes = client.publish(&signed_note("again", 1)).await.unwrap();
    assert_eq!(outcomes[0].status, PublishStatus::Seen);
    assert!(outcomes[0].is_success());
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_before_sending() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(&transport, &[A]);
    client.init().await.unwrap();

    let mut event = signed_note("original", 1);
    event.content = "tampered".to_string();
    let result = client.publish(&event).await;

    assert!(matches!(result, Err(ClientError::InvalidEvent(_))));
    assert!(
        !transport
            .relay(A)
            .received()
            .iter()
            .any(|m| matches!(m, ClientMessage::Event(_)))
    );
}

#[tokio::test]
async fn test_events_from_several_relays_are_delivered_per_copy() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(&transport, &[A, B]);
    client.init().await.unwrap();

    let (callback, seen) = recorder();
    client
        .subscribe("feed", vec![Filter::new().kinds([1])], callback)
        .await
        .unwrap();

    let event = signed_note("everywhere", 1);
    transport.relay(A).broadcast(event.clone());
    transport.relay(B).broadcast(event.clone());
    settle().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let mut deduper = EventDeduper::new();
    let unique: Vec<&Event> = seen.iter().filter(|e| deduper.insert(e)).collect();
    assert_eq!(unique.len(), 1);
}

#[tokio::test]
async fn test_relay_drop_and_heartbeat_reconnect_restores_subscriptions() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(&transport, &[A]);
    client.init().await.unwrap();

    let (callback, seen) = recorder();
    client
        .subscribe("feed", vec![Filter::new().kinds([1])], callback)
        .await
        .unwrap();

    transport.relay(A).drop_connection();
    settle().await;
    assert!(client.connected_relays().is_empty());

    // What the heartbeat does on each tick.
    client.pool().connect().await;
    assert_eq!(client.connected_relays(), vec![A]);

    transport.relay(A).broadcast(signed_note("back", 1));
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}
