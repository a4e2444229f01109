// Node Configuration - Identity, addresses, storage location and timings

use crate::ledger::{AuthoritySet, DEFAULT_AUTHORITIES};
use crate::sync::GossipConfig;
use crate::transport::PeerAddress;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Default root for per-node data directories
pub const DEFAULT_DATA_DIR: &str = "node_data";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Node name cannot be empty")]
    EmptyNodeName,

    #[error("Authority list cannot be empty")]
    NoAuthorities,

    #[error("Peer timeout cannot be zero")]
    ZeroPeerTimeout,
}

/// Everything a node needs to start
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Identity used as the validator of locally created entries
    pub node_name: String,
    /// Interface to listen on
    pub bind_address: String,
    pub port: u16,
    /// Host peers should use to reach us; detected when unset
    pub advertise_host: Option<String>,
    /// Root directory; the chain lives in `<data_dir>/<node_name>`
    pub data_dir: PathBuf,
    /// Peer to join on startup
    pub bootstrap: Option<PeerAddress>,
    /// Authorized validator identities (own name is always added)
    pub authorities: Vec<String>,
    /// Bound on every peer request
    pub peer_timeout: Duration,
    /// Run conflict resolution on this interval
    pub resolve_interval: Option<Duration>,
    pub gossip: GossipConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: generate_node_name(),
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            advertise_host: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            bootstrap: None,
            authorities: DEFAULT_AUTHORITIES.iter().map(|s| s.to_string()).collect(),
            peer_timeout: Duration::from_secs(5),
            resolve_interval: None,
            gossip: GossipConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_name(mut self, name: &str) -> Self {
        self.node_name = name.to_string();
        self
    }

    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = addr.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_advertise_host(mut self, host: &str) -> Self {
        self.advertise_host = Some(host.to_string());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_bootstrap(mut self, peer: PeerAddress) -> Self {
        self.bootstrap = Some(peer);
        self
    }

    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities = authorities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    pub fn with_resolve_interval(mut self, interval: Option<Duration>) -> Self {
        self.resolve_interval = interval;
        self
    }

    pub fn with_gossip(mut self, gossip: GossipConfig) -> Self {
        self.gossip = gossip;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::EmptyNodeName);
        }
        if self.authorities.is_empty() {
            return Err(ConfigError::NoAuthorities);
        }
        if self.peer_timeout.is_zero() {
            return Err(ConfigError::ZeroPeerTimeout);
        }
        Ok(())
    }

    /// Configured authorities plus our own identity
    pub fn authority_set(&self) -> AuthoritySet {
        let mut set = AuthoritySet::new(self.authorities.iter().cloned());
        set.insert(&self.node_name);
        set
    }

    /// Address we tell peers to use
    pub fn advertised_address(&self) -> PeerAddress {
        let host = self
            .advertise_host
            .clone()
            .unwrap_or_else(detect_local_ip);
        PeerAddress::tcp(&host, self.port)
    }

    /// Other names this node answers to; never queried during resolution
    pub fn self_aliases(&self) -> Vec<PeerAddress> {
        vec![
            PeerAddress::tcp("127.0.0.1", self.port),
            PeerAddress::tcp("localhost", self.port),
        ]
    }
}

/// `node_` followed by four random hex characters
pub fn generate_node_name() -> String {
    let bytes: [u8; 2] = rand::random();
    format!("node_{}", hex::encode(bytes))
}

/// First non-loopback IPv4 this host routes from, or `localhost`.
///
/// Connecting a UDP socket sends nothing; it only asks the OS which local
/// address it would use.
pub fn detect_local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| ip.is_ipv4() && !ip.is_loopback() && !ip.is_unspecified())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "localhost".to_string())
}
