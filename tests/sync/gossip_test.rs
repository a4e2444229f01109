// Gossip Tests
// Tests for per-peer outbound queues and fire-and-forget delivery

use async_trait::async_trait;
use docledger::ledger::Entry;
use docledger::sync::{GossipConfig, GossipEngine, Message, MessageType};
use docledger::transport::{MemoryNetwork, MessageHandler, PeerAddress};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every message it receives
#[derive(Default)]
struct Recorder {
    received: Mutex<Vec<MessageType>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle_message(&self, message: Message) -> Option<Message> {
        self.received.lock().unwrap().push(message.message_type());
        None
    }
}

/// Never finishes handling a message
struct Stuck;

#[async_trait]
impl MessageHandler for Stuck {
    async fn handle_message(&self, _message: Message) -> Option<Message> {
        std::future::pending::<()>().await;
        None
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn addr(host: &str) -> PeerAddress {
    PeerAddress::tcp(host, 3000)
}

// ============================================================================
// DELIVERY
// ============================================================================

#[tokio::test]
async fn test_broadcast_reaches_every_peer() {
    let network = MemoryNetwork::new();
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    network.register(addr("10.0.0.2"), &a);
    network.register(addr("10.0.0.3"), &b);

    let engine = GossipEngine::new(network.client(), GossipConfig::default());
    let accepted = engine.broadcast(
        &Message::NewEntry(Entry::genesis()),
        &[addr("10.0.0.2"), addr("10.0.0.3")],
    );

    assert_eq!(accepted, 2);
    assert!(wait_until(|| a.count() == 1 && b.count() == 1).await);
    assert_eq!(a.received.lock().unwrap()[0], MessageType::NewEntry);
    assert_eq!(engine.session_peers().len(), 2);
}

#[tokio::test]
async fn test_messages_delivered_in_order() {
    let network = MemoryNetwork::new();
    let peer = Arc::new(Recorder::default());
    network.register(addr("10.0.0.2"), &peer);

    let engine = GossipEngine::new(network.client(), GossipConfig::default());
    engine.broadcast(&Message::NewEntry(Entry::genesis()), &[addr("10.0.0.2")]);
    engine.broadcast(&Message::PeerAnnouncement(addr("10.0.0.9")), &[addr("10.0.0.2")]);

    assert!(wait_until(|| peer.count() == 2).await);
    assert_eq!(
        *peer.received.lock().unwrap(),
        vec![MessageType::NewEntry, MessageType::PeerAnnouncement]
    );
}

// ============================================================================
// FAILURE ISOLATION
// ============================================================================

#[tokio::test]
async fn test_unreachable_peer_does_not_block_others() {
    let network = MemoryNetwork::new();
    let healthy = Arc::new(Recorder::default());
    network.register(addr("10.0.0.2"), &healthy);

    let engine = GossipEngine::new(
        network.client(),
        GossipConfig::new().with_reconnect_backoff(Duration::from_millis(5)),
    );
    let accepted = engine.broadcast(
        &Message::NewEntry(Entry::genesis()),
        &[addr("10.0.0.99"), addr("10.0.0.2")],
    );

    // Enqueueing succeeds for both; delivery only for the reachable one
    assert_eq!(accepted, 2);
    assert!(wait_until(|| healthy.count() == 1).await);
    assert!(wait_until(|| engine.stats().send_failures >= 1).await);
    assert!(wait_until(|| engine.stats().messages_sent == 1).await);
}

#[tokio::test]
async fn test_full_queue_drops_instead_of_blocking() {
    let network = MemoryNetwork::new();
    let stuck = Arc::new(Stuck);
    network.register(addr("10.0.0.2"), &stuck);

    let engine = GossipEngine::new(network.client(), GossipConfig::new().with_queue_depth(1));
    let targets = [addr("10.0.0.2")];

    let mut accepted = 0;
    for _ in 0..10 {
        accepted += engine.broadcast(&Message::NewEntry(Entry::genesis()), &targets);
        tokio::task::yield_now().await;
    }

    // One message in flight, at most one buffered; the rest were dropped
    assert!(accepted <= 2);
    assert_eq!(engine.stats().messages_dropped, 10 - accepted as u64);
}

#[tokio::test]
async fn test_shutdown_clears_sessions() {
    let network = MemoryNetwork::new();
    let peer = Arc::new(Recorder::default());
    network.register(addr("10.0.0.2"), &peer);

    let engine = GossipEngine::new(network.client(), GossipConfig::default());
    engine.broadcast(&Message::Ping, &[addr("10.0.0.2")]);
    engine.shutdown();

    assert!(engine.session_peers().is_empty());
}
