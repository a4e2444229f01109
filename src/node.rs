// Node - One ledger participant
//
// Owns the ledger, the peer registry and the authority set, and wires them
// to the gossip engine and the conflict resolver. Chain mutations happen
// under the ledger lock together with their persistence and the enqueue of
// the resulting push; peer I/O never happens while that lock is held.

use crate::config::{ConfigError, NodeConfig};
use crate::ledger::{
    AuthoritySet, DocumentRecord, Entry, IngestOutcome, Ledger, LedgerError, Payload,
};
use crate::storage::{ChainStorage, ChainStore, StoreError};
use crate::sync::{
    ConflictResolver, DocumentQuery, GossipEngine, GossipStats, Message, MessageType, NodeStatus,
    PeerRegistry, PeerStats,
};
use crate::transport::{MessageHandler, PeerAddress, PeerClient, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

// ============================================================================
// NODE ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unexpected response: {0:?}")]
    UnexpectedResponse(MessageType),

    #[error("Rejected by peer: {0}")]
    Rejected(String),
}

impl NodeError {
    /// Check if the peer could not be reached or did not answer in time
    pub fn is_peer_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

// ============================================================================
// NODE
// ============================================================================

/// A running ledger node
pub struct Node {
    name: String,
    address: PeerAddress,
    /// Addresses that reach this node and must never be treated as peers
    self_aliases: Vec<PeerAddress>,
    authorities: AuthoritySet,
    ledger: Mutex<Ledger>,
    peers: RwLock<PeerRegistry>,
    gossip: GossipEngine,
    resolver: ConflictResolver,
    client: Arc<dyn PeerClient>,
    peer_timeout: Duration,
}

impl Node {
    /// Build a node over an explicit chain store and peer client
    pub fn new(
        config: &NodeConfig,
        store: Box<dyn ChainStorage>,
        client: Arc<dyn PeerClient>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        let ledger = Ledger::open(store)?;
        let address = config.advertised_address();
        let mut self_aliases = config.self_aliases();
        self_aliases.push(address.clone());

        info!(
            node = %config.node_name,
            address = %address,
            len = ledger.len(),
            "node ready"
        );

        Ok(Self {
            name: config.node_name.clone(),
            peers: RwLock::new(PeerRegistry::new(address.clone())),
            address,
            self_aliases,
            authorities: config.authority_set(),
            ledger: Mutex::new(ledger),
            gossip: GossipEngine::new(client.clone(), config.gossip.clone()),
            resolver: ConflictResolver::new(client.clone(), config.peer_timeout),
            client,
            peer_timeout: config.peer_timeout,
        })
    }

    /// Build a node persisting to `<data_dir>/<node_name>` with sled
    pub fn open(config: &NodeConfig, client: Arc<dyn PeerClient>) -> Result<Self, NodeError> {
        let store = ChainStore::open_for_node(&config.data_dir, &config.node_name)?;
        store.save_node_name(&config.node_name)?;
        Self::new(config, Box::new(store), client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address advertised to peers
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn authorities(&self) -> &AuthoritySet {
        &self.authorities
    }

    // ------------------------------------------------------------------------
    // Ledger operations
    // ------------------------------------------------------------------------

    /// Wrap `record` in a new entry signed by this node, append it, then push it to every peer
    pub async fn submit_document(&self, record: DocumentRecord) -> Result<Entry, NodeError> {
        let entry = {
            let mut ledger = self.ledger.lock().await;
            let entry = ledger.next_entry(
                Payload::Document(record),
                &self.name,
                Utc::now().timestamp_millis(),
            );
            ledger.append(entry.clone(), &self.authorities)?;

            // Enqueue before unlocking so peers receive entries in chain order
            let targets = self.remote_peers().await;
            self.gossip
                .broadcast(&Message::NewEntry(entry.clone()), &targets);
            entry
        };

        info!(index = entry.index(), hash = %entry.hash(), "document attested");
        Ok(entry)
    }

    /// Accept an entry pushed by a peer.
    ///
    /// Never fails: rejected entries are logged and dropped. Returns what
    /// happened, or `None` if the entry was not taken.
    pub async fn ingest_entry(&self, entry: Entry) -> Option<IngestOutcome> {
        let index = entry.index();
        let hash = entry.hash().clone();

        let result = self.ledger.lock().await.ingest(entry, &self.authorities);
        match result {
            Ok(IngestOutcome::Appended) => {
                info!(index, hash = %hash, "entry ingested");
                Some(IngestOutcome::Appended)
            }
            Ok(IngestOutcome::Duplicate) => {
                debug!(index, hash = %hash, "duplicate entry ignored");
                Some(IngestOutcome::Duplicate)
            }
            Err(e) if e.is_persistence() => {
                error!(index, hash = %hash, error = %e, "failed to persist ingested entry");
                None
            }
            Err(e) => {
                warn!(index, hash = %hash, error = %e, "incoming entry rejected");
                None
            }
        }
    }

    /// Read-only copy of the chain
    pub async fn list_entries(&self) -> Vec<Entry> {
        self.current_chain_snapshot().await
    }

    /// The complete chain, as served to pulling peers
    pub async fn current_chain_snapshot(&self) -> Vec<Entry> {
        self.ledger.lock().await.snapshot()
    }

    pub async fn chain_len(&self) -> usize {
        self.ledger.lock().await.len()
    }

    /// First entry whose document satisfies `predicate`
    pub async fn find_by_document<F>(&self, predicate: F) -> Option<Entry>
    where
        F: Fn(&DocumentRecord) -> bool,
    {
        self.ledger.lock().await.find_by_document(predicate).cloned()
    }

    pub async fn find_document(&self, query: &DocumentQuery) -> Option<Entry> {
        self.find_by_document(|record| query.matches(record)).await
    }

    /// Adopt `chain` if it is strictly longer than ours and fully valid.
    ///
    /// Validation failures and short chains give `Ok(false)`; only a
    /// persistence failure is an error.
    pub async fn accept_chain_snapshot(&self, chain: Vec<Entry>) -> Result<bool, NodeError> {
        let candidate = chain.len();
        let result = self.ledger.lock().await.replace(chain, &self.authorities);

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_persistence() => Err(e.into()),
            Err(LedgerError::ChainTooShort { local, .. }) => {
                debug!(candidate, local, "chain snapshot not longer, ignored");
                Ok(false)
            }
            Err(e) => {
                warn!(candidate, error = %e, "chain snapshot rejected");
                Ok(false)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Peer discovery
    // ------------------------------------------------------------------------

    /// Add `address` and return the full registry; a new peer is announced to the others
    pub async fn register_peer(&self, address: PeerAddress) -> Vec<PeerAddress> {
        let (added, snapshot) = {
            let mut peers = self.peers.write().await;
            let added = peers.add_peer(address.clone());
            (added, peers.snapshot())
        };

        if added {
            info!(peer = %address, "peer registered");
            let targets: Vec<PeerAddress> = self
                .remote_peers()
                .await
                .into_iter()
                .filter(|p| p != &address)
                .collect();
            self.gossip
                .broadcast(&Message::PeerAnnouncement(address), &targets);
        }

        snapshot
    }

    /// Record a peer someone else announced; not forwarded further
    pub async fn handle_announcement(&self, address: PeerAddress) {
        if self.peers.write().await.add_peer(address.clone()) {
            debug!(peer = %address, "peer learned from announcement");
        }
    }

    /// Union `addresses` into the registry and return the full registry
    pub async fn merge_peers(&self, addresses: Vec<PeerAddress>) -> Vec<PeerAddress> {
        let mut peers = self.peers.write().await;
        let added = peers.merge(addresses);
        if !added.is_empty() {
            debug!(added = added.len(), total = peers.peer_count(), "peer list merged");
        }
        peers.snapshot()
    }

    /// Register with `target` and merge the registry it returns; yields the newly learned peers
    pub async fn register_with(&self, target: &PeerAddress) -> Result<Vec<PeerAddress>, NodeError> {
        let reply = self
            .request(target, Message::RegisterPeer(self.address.clone()))
            .await?;

        let list = match reply {
            Message::PeerList(list) => list,
            other => return Err(NodeError::UnexpectedResponse(other.message_type())),
        };

        let mut peers = self.peers.write().await;
        let mut added = peers.merge(std::iter::once(target.clone()));
        added.extend(peers.merge(list));
        info!(peer = %target, learned = added.len(), "registered with peer");
        Ok(added)
    }

    /// Every known address, own address included
    pub async fn peer_snapshot(&self) -> Vec<PeerAddress> {
        self.peers.read().await.snapshot()
    }

    /// Known peers other than this node itself
    pub async fn remote_peers(&self) -> Vec<PeerAddress> {
        self.peers.read().await.remote_peers(&self.self_aliases)
    }

    pub async fn peer_stats(&self) -> PeerStats {
        self.peers.read().await.stats()
    }

    // ------------------------------------------------------------------------
    // Synchronization
    // ------------------------------------------------------------------------

    /// Pull `peer`'s chain and adopt it if it is longer and valid
    pub async fn pull_chain_from(&self, peer: &PeerAddress) -> Result<bool, NodeError> {
        let chain = self.resolver.fetch_chain(peer).await?;
        self.accept_chain_snapshot(chain).await
    }

    /// Replace the local chain with the longest valid peer chain, if any is longer.
    ///
    /// Peers are queried without holding the ledger lock; the length check is
    /// repeated under the lock before replacing.
    pub async fn resolve(&self) -> Result<bool, NodeError> {
        let targets = self.remote_peers().await;
        let local_len = self.chain_len().await;

        let report = self
            .resolver
            .find_longest(&targets, local_len, &self.authorities)
            .await;
        debug!(
            queried = report.peers_queried,
            failed = report.peers_failed,
            rejected = report.chains_rejected,
            "peers scanned"
        );

        let Some((peer, chain)) = report.best else {
            debug!(len = local_len, "local chain is authoritative");
            return Ok(false);
        };

        let replaced = self.accept_chain_snapshot(chain).await?;
        if replaced {
            info!(peer = %peer, "adopted longer chain from peer");
        }
        Ok(replaced)
    }

    /// Join the network through `target`: register, then pull its chain
    pub async fn bootstrap(&self, target: &PeerAddress) -> Result<bool, NodeError> {
        self.register_with(target).await?;
        let replaced = self.pull_chain_from(target).await?;
        info!(peer = %target, replaced, "bootstrap complete");
        Ok(replaced)
    }

    pub async fn status(&self) -> NodeStatus {
        let (chain_length, tip_hash) = {
            let ledger = self.ledger.lock().await;
            (ledger.len() as u64, ledger.tip().hash().clone())
        };

        NodeStatus {
            node_name: self.name.clone(),
            address: self.address.clone(),
            chain_length,
            tip_hash,
            peers: self.peer_snapshot().await,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn gossip_stats(&self) -> GossipStats {
        self.gossip.stats()
    }

    /// Stop outbound gossip workers
    pub fn shutdown(&self) {
        self.gossip.shutdown();
    }

    async fn request(&self, peer: &PeerAddress, message: Message) -> Result<Message, NodeError> {
        let reply = timeout(self.peer_timeout, self.client.request(peer, message))
            .await
            .map_err(|_| TransportError::Timeout)??;

        match reply {
            Message::Rejected(reason) => Err(NodeError::Rejected(reason)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl MessageHandler for Node {
    async fn handle_message(&self, message: Message) -> Option<Message> {
        match message {
            Message::NewEntry(entry) => {
                self.ingest_entry(entry).await;
                None
            }
            Message::RegisterPeer(address) => {
                Some(Message::PeerList(self.register_peer(address).await))
            }
            Message::PeerAnnouncement(address) => {
                self.handle_announcement(address).await;
                None
            }
            Message::SyncPeers(addresses) => {
                Some(Message::PeerList(self.merge_peers(addresses).await))
            }
            Message::ChainRequest => {
                Some(Message::ChainResponse(self.current_chain_snapshot().await))
            }
            Message::SubmitDocument(record) => Some(match self.submit_document(record).await {
                Ok(entry) => Message::EntryAppended(entry),
                Err(e) => Message::Rejected(e.to_string()),
            }),
            Message::FindDocument(query) => {
                Some(Message::DocumentMatch(self.find_document(&query).await))
            }
            Message::Resolve => Some(match self.resolve().await {
                Ok(replaced) => Message::Resolved(replaced),
                Err(e) => Message::Rejected(e.to_string()),
            }),
            Message::Ping => Some(Message::Pong(self.status().await)),
            other => {
                debug!(kind = ?other.message_type(), "unsolicited response ignored");
                None
            }
        }
    }
}
