// Gossip Engine - Push propagation to every known peer
//
// Each peer gets its own bounded outbound queue drained by a dedicated task
// that keeps a persistent session open. Broadcasting only enqueues, so a
// slow or unreachable peer never holds up the caller. Delivery is
// fire-and-forget: a full queue or a failed send drops the message.

use crate::sync::protocol::Message;
use crate::transport::{PeerAddress, PeerClient, PeerSession};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for the gossip engine
#[derive(Clone, Debug)]
pub struct GossipConfig {
    /// Messages buffered per peer before new ones are dropped
    pub queue_depth: usize,
    /// Pause after failing to reach a peer
    pub reconnect_backoff: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

impl GossipConfig {
    /// Create a new config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set per-peer queue depth
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Set reconnect backoff
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }
}

/// Statistics about the gossip engine
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GossipStats {
    pub messages_enqueued: u64,
    pub messages_dropped: u64,
    pub messages_sent: u64,
    pub send_failures: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failures: AtomicU64,
}

/// Outbound push fan-out
pub struct GossipEngine {
    client: Arc<dyn PeerClient>,
    config: GossipConfig,
    queues: Mutex<HashMap<PeerAddress, mpsc::Sender<Message>>>,
    counters: Arc<Counters>,
}

impl GossipEngine {
    /// Create a new gossip engine
    pub fn new(client: Arc<dyn PeerClient>, config: GossipConfig) -> Self {
        Self {
            client,
            config,
            queues: Mutex::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Enqueue `message` for every peer in `peers`; returns how many accepted it.
    ///
    /// Must be called from within a tokio runtime: the first message for a
    /// peer spawns that peer's worker.
    pub fn broadcast(&self, message: &Message, peers: &[PeerAddress]) -> usize {
        let mut queues = match self.queues.lock() {
            Ok(queues) => queues,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut accepted = 0;
        for peer in peers {
            let queue = queues
                .entry(peer.clone())
                .or_insert_with(|| self.spawn_worker(peer.clone()));

            match queue.try_send(message.clone()) {
                Ok(()) => {
                    accepted += 1;
                    self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(peer = %peer, "outbound queue full, message dropped");
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Worker ended; start a fresh one for next time
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    queues.insert(peer.clone(), self.spawn_worker(peer.clone()));
                }
            }
        }

        debug!(kind = ?message.message_type(), accepted, peers = peers.len(), "broadcast");
        accepted
    }

    /// Peers that currently have an outbound queue
    pub fn session_peers(&self) -> Vec<PeerAddress> {
        match self.queues.lock() {
            Ok(queues) => queues.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    /// Get statistics
    pub fn stats(&self) -> GossipStats {
        GossipStats {
            messages_enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            messages_dropped: self.counters.dropped.load(Ordering::Relaxed),
            messages_sent: self.counters.sent.load(Ordering::Relaxed),
            send_failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Drop every queue; workers finish what is buffered and exit
    pub fn shutdown(&self) {
        if let Ok(mut queues) = self.queues.lock() {
            queues.clear();
        }
    }

    fn spawn_worker(&self, peer: PeerAddress) -> mpsc::Sender<Message> {
        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        tokio::spawn(run_peer_worker(
            peer,
            self.client.clone(),
            rx,
            self.counters.clone(),
            self.config.reconnect_backoff,
        ));
        tx
    }
}

async fn run_peer_worker(
    peer: PeerAddress,
    client: Arc<dyn PeerClient>,
    mut rx: mpsc::Receiver<Message>,
    counters: Arc<Counters>,
    backoff: Duration,
) {
    let mut session: Option<Box<dyn PeerSession>> = None;

    while let Some(message) = rx.recv().await {
        if session.is_none() {
            match client.open_session(&peer).await {
                Ok(opened) => session = Some(opened),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "peer unreachable, message dropped");
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            }
        }

        if let Some(open) = session.as_mut() {
            match open.send(&message).await {
                Ok(()) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.is_retryable() => {
                    warn!(peer = %peer, error = %e, "send failed, session dropped");
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    session = None;
                }
                Err(e) => {
                    // Nothing reached the wire; the session stays usable
                    warn!(peer = %peer, error = %e, "message not sendable, dropped");
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    debug!(peer = %peer, "outbound worker stopped");
}
