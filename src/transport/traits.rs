// Transport Traits and Core Types
// Defines the peer-facing seams (client, session, handler) and the types shared by all implementations

use crate::sync::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// TRANSPORT CONFIG
// ============================================================================

/// Maximum encoded size of a single frame
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Base configuration for all transport types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Maximum number of simultaneous inbound connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u32,
    /// Request/response timeout in seconds
    pub message_timeout_secs: u32,
    /// Largest frame accepted or sent
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            connection_timeout_secs: 5,
            message_timeout_secs: 10,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connection_timeout(mut self, secs: u32) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    pub fn with_message_timeout(mut self, secs: u32) -> Self {
        self.message_timeout_secs = secs;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs as u64)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_secs(self.message_timeout_secs as u64)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.max_connections == 0 {
            return Err(TransportError::InvalidConfig("max_connections cannot be 0".to_string()));
        }
        if self.max_frame_size == 0 {
            return Err(TransportError::InvalidConfig("max_frame_size cannot be 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// PEER ADDRESS
// ============================================================================

/// Network address of a peer node
///
/// Parsed from `host:port`, optionally prefixed with `tcp://` or `http://`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    /// Create a TCP address
    pub fn tcp(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form suitable for connecting
    pub fn socket_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = ["tcp://", "http://", "https://"]
            .iter()
            .find_map(|scheme| trimmed.strip_prefix(scheme))
            .unwrap_or(trimmed)
            .trim_end_matches('/');

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
        if host.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;

        Ok(Self::tcp(host, port))
    }
}

// ============================================================================
// TRANSPORT STATE
// ============================================================================

/// State of a listening transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error(String),
}

impl TransportState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: &TransportState) -> bool {
        matches!(
            (self, target),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Error(_))
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Error(_))
                | (Self::Stopping, Self::Stopped)
                | (Self::Error(_), Self::Stopped)
                | (Self::Error(_), Self::Starting)
        )
    }
}

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur talking to a peer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Maximum connections reached")]
    MaxConnectionsReached,

    #[error("Transport already running")]
    AlreadyRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Frame of {0} bytes exceeds the limit")]
    PayloadTooLarge(usize),
}

impl TransportError {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Check if the connection is still usable after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionFailed(_)
                | Self::ConnectionClosed
                | Self::SendFailed(_)
                | Self::ReceiveFailed(_)
        )
    }
}

// ============================================================================
// SEAMS
// ============================================================================

/// Something that answers protocol messages (a node)
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message; `Some` is sent back to the requester
    async fn handle_message(&self, message: Message) -> Option<Message>;
}

/// A long-lived outbound channel to one peer
#[async_trait]
pub trait PeerSession: Send {
    /// Push a message; no reply is expected
    async fn send(&mut self, message: &Message) -> Result<(), TransportError>;
}

/// Outbound access to peers
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Send a request and wait for its single reply
    async fn request(
        &self,
        address: &PeerAddress,
        message: Message,
    ) -> Result<Message, TransportError>;

    /// Open a persistent session for fire-and-forget pushes
    async fn open_session(
        &self,
        address: &PeerAddress,
    ) -> Result<Box<dyn PeerSession>, TransportError>;
}
