// Peer Registry - Known peer addresses
//
// Membership only ever grows: there is no eviction, no heartbeat timeout and
// no leave message. The registry is seeded with the node's own address.

use crate::transport::PeerAddress;
use std::collections::BTreeSet;

/// Statistics about a peer registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerStats {
    /// Every known address, own address included
    pub total_peers: usize,
    /// Known addresses other than our own
    pub remote_peers: usize,
}

/// Registry of known peers
#[derive(Clone, Debug)]
pub struct PeerRegistry {
    /// Our own advertised address
    own_address: PeerAddress,
    /// All known addresses, own address included
    peers: BTreeSet<PeerAddress>,
}

impl PeerRegistry {
    /// Create a registry seeded with our own address
    pub fn new(own_address: PeerAddress) -> Self {
        let mut peers = BTreeSet::new();
        peers.insert(own_address.clone());
        Self { own_address, peers }
    }

    pub fn own_address(&self) -> &PeerAddress {
        &self.own_address
    }

    /// Number of known addresses, own address included
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Check if an address is known
    pub fn has_peer(&self, address: &PeerAddress) -> bool {
        self.peers.contains(address)
    }

    /// Add an address; returns true if it was not known before
    pub fn add_peer(&mut self, address: PeerAddress) -> bool {
        self.peers.insert(address)
    }

    /// Union `addresses` into the registry; returns the ones that were new
    pub fn merge<I>(&mut self, addresses: I) -> Vec<PeerAddress>
    where
        I: IntoIterator<Item = PeerAddress>,
    {
        addresses
            .into_iter()
            .filter(|address| self.peers.insert(address.clone()))
            .collect()
    }

    /// Sorted snapshot of every known address
    pub fn snapshot(&self) -> Vec<PeerAddress> {
        self.peers.iter().cloned().collect()
    }

    /// Known addresses that are not in `exclude` (our own address and aliases)
    pub fn remote_peers(&self, exclude: &[PeerAddress]) -> Vec<PeerAddress> {
        self.peers
            .iter()
            .filter(|p| *p != &self.own_address && !exclude.contains(p))
            .cloned()
            .collect()
    }

    /// Get statistics
    pub fn stats(&self) -> PeerStats {
        PeerStats {
            total_peers: self.peers.len(),
            remote_peers: self.remote_peers(&[]).len(),
        }
    }
}
