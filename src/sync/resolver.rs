// Conflict Resolver - Longest valid chain wins
//
// Pulls full chains from peers and picks the longest one that passes
// full-chain validation. Equal length never wins, whatever the content.
// A failing peer only removes itself from consideration.

use crate::ledger::{AuthoritySet, ChainValidator, Entry};
use crate::sync::protocol::Message;
use crate::transport::{PeerAddress, PeerClient, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Outcome of scanning peers for a better chain
#[derive(Clone, Debug, Default)]
pub struct ResolveReport {
    /// Peers asked for their chain
    pub peers_queried: usize,
    /// Peers that failed to answer (unreachable, timed out, malformed)
    pub peers_failed: usize,
    /// Chains that were long enough but failed validation
    pub chains_rejected: usize,
    /// Longest valid chain seen, if it beats the local length
    pub best: Option<(PeerAddress, Vec<Entry>)>,
}

impl ResolveReport {
    /// Length of the winning candidate, if any
    pub fn best_len(&self) -> Option<usize> {
        self.best.as_ref().map(|(_, chain)| chain.len())
    }
}

/// Pulls and compares peer chains
pub struct ConflictResolver {
    client: Arc<dyn PeerClient>,
    peer_timeout: Duration,
}

impl ConflictResolver {
    pub fn new(client: Arc<dyn PeerClient>, peer_timeout: Duration) -> Self {
        Self {
            client,
            peer_timeout,
        }
    }

    /// Request a peer's complete chain, bounded by the peer timeout
    pub async fn fetch_chain(&self, peer: &PeerAddress) -> Result<Vec<Entry>, TransportError> {
        let reply = timeout(self.peer_timeout, self.client.request(peer, Message::ChainRequest))
            .await
            .map_err(|_| TransportError::Timeout)??;

        match reply {
            Message::ChainResponse(chain) => Ok(chain),
            other => Err(TransportError::ReceiveFailed(format!(
                "expected ChainResponse, got {:?}",
                other.message_type()
            ))),
        }
    }

    /// Scan `peers` for the longest valid chain strictly longer than `local_len`.
    ///
    /// No lock is held here; the caller decides whether to replace its chain.
    pub async fn find_longest(
        &self,
        peers: &[PeerAddress],
        local_len: usize,
        authorities: &AuthoritySet,
    ) -> ResolveReport {
        let mut report = ResolveReport::default();
        let mut max_len = local_len;

        for peer in peers {
            report.peers_queried += 1;

            let chain = match self.fetch_chain(peer).await {
                Ok(chain) => chain,
                Err(e) if e.is_timeout() => {
                    warn!(peer = %peer, "chain pull timed out");
                    report.peers_failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "chain pull failed");
                    report.peers_failed += 1;
                    continue;
                }
            };

            if chain.len() <= max_len {
                debug!(peer = %peer, len = chain.len(), max_len, "peer chain not longer");
                continue;
            }

            match ChainValidator::check_full_chain(&chain, authorities) {
                Ok(()) => {
                    debug!(peer = %peer, len = chain.len(), "new best candidate");
                    max_len = chain.len();
                    report.best = Some((peer.clone(), chain));
                }
                Err(reason) => {
                    warn!(peer = %peer, %reason, "peer chain rejected");
                    report.chains_rejected += 1;
                }
            }
        }

        report
    }
}
