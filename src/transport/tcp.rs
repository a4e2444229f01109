// TCP Transport Implementation
// Serves protocol messages to peers and makes outbound requests/sessions over TCP

use crate::sync::Message;
use crate::transport::frame::{read_frame, write_frame};
use crate::transport::{
    MessageHandler, PeerAddress, PeerClient, PeerSession, TransportConfig, TransportError,
    TransportState,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

// ============================================================================
// TCP TRANSPORT CONFIG
// ============================================================================

/// Configuration for TCP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// Base transport configuration
    pub base: TransportConfig,
    /// Address to bind to
    pub bind_address: String,
    /// Port to bind to (0 for random)
    pub bind_port: u16,
    /// Enable TCP_NODELAY
    pub nodelay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            base: TransportConfig::default(),
            bind_address: "0.0.0.0".to_string(),
            bind_port: 0,
            nodelay: true,
        }
    }
}

impl TcpTransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_config(mut self, base: TransportConfig) -> Self {
        self.base = base;
        self
    }

    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = addr.to_string();
        self
    }

    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

// ============================================================================
// TRANSPORT STATISTICS
// ============================================================================

/// Snapshot of listener activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportStats {
    /// Number of open inbound connections
    pub connections_active: usize,
    /// Total inbound connections accepted
    pub connections_total: u64,
    /// Total frames received
    pub messages_received: u64,
    /// Total reply frames sent
    pub messages_sent: u64,
    /// Connections that ended with an error
    pub errors: u64,
    /// Connections dropped at the connection limit
    pub connections_refused: u64,
}

#[derive(Default)]
struct Counters {
    connections_active: AtomicUsize,
    connections_total: AtomicU64,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    errors: AtomicU64,
    connections_refused: AtomicU64,
}

// ============================================================================
// TCP TRANSPORT (listener)
// ============================================================================

/// Accepts peer connections and feeds their frames to a [`MessageHandler`]
pub struct TcpTransport {
    config: TcpTransportConfig,
    state: TransportState,
    local_address: Option<PeerAddress>,
    listener_handle: Option<tokio::task::JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            state: TransportState::Stopped,
            local_address: None,
            listener_handle: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Bind and start serving `handler`
    pub async fn start(&mut self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
        if !self.state.can_transition_to(&TransportState::Starting) {
            return Err(TransportError::AlreadyRunning);
        }
        self.config.base.validate()?;

        self.state = TransportState::Starting;

        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.bind_port);
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.state = TransportState::Error(e.to_string());
                return Err(TransportError::ConnectionFailed(e.to_string()));
            }
        };

        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let local = PeerAddress::tcp(&local_addr.ip().to_string(), local_addr.port());
        info!(address = %local, "listening");
        self.local_address = Some(local);

        let counters = self.counters.clone();
        let max_connections = self.config.base.max_connections as usize;
        let max_frame_size = self.config.base.max_frame_size;
        let nodelay = self.config.nodelay;

        let handle = tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        break;
                    }
                };

                if counters.connections_active.load(Ordering::SeqCst) >= max_connections {
                    let error = TransportError::MaxConnectionsReached;
                    warn!(%addr, %error, "connection refused");
                    counters.connections_refused.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
                stream.set_nodelay(nodelay).ok();

                counters.connections_active.fetch_add(1, Ordering::SeqCst);
                counters.connections_total.fetch_add(1, Ordering::SeqCst);

                let handler = handler.clone();
                let counters = counters.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, handler, &counters, max_frame_size).await {
                        debug!(%addr, error = %e, "connection ended with error");
                        counters.errors.fetch_add(1, Ordering::SeqCst);
                    }
                    counters.connections_active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        self.listener_handle = Some(handle);
        self.state = TransportState::Running;
        Ok(())
    }

    /// Stop accepting connections
    pub async fn stop(&mut self) -> Result<(), TransportError> {
        if !self.state.can_transition_to(&TransportState::Stopping) {
            // Nothing is listening; a failed start still settles to Stopped
            if self.state.can_transition_to(&TransportState::Stopped) {
                self.state = TransportState::Stopped;
            }
            return Ok(());
        }

        self.state = TransportState::Stopping;
        if let Some(handle) = self.listener_handle.take() {
            handle.abort();
        }
        self.local_address = None;
        self.state = TransportState::Stopped;
        Ok(())
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    /// Address actually bound (if running)
    pub fn local_address(&self) -> Option<PeerAddress> {
        self.local_address.clone()
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            connections_active: self.counters.connections_active.load(Ordering::SeqCst),
            connections_total: self.counters.connections_total.load(Ordering::SeqCst),
            messages_received: self.counters.messages_received.load(Ordering::SeqCst),
            messages_sent: self.counters.messages_sent.load(Ordering::SeqCst),
            errors: self.counters.errors.load(Ordering::SeqCst),
            connections_refused: self.counters.connections_refused.load(Ordering::SeqCst),
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    handler: Arc<dyn MessageHandler>,
    counters: &Counters,
    max_frame_size: usize,
) -> Result<(), TransportError> {
    let (mut reader, mut writer) = stream.into_split();

    while let Some(message) = read_frame(&mut reader, max_frame_size).await? {
        counters.messages_received.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = handler.handle_message(message).await {
            write_frame(&mut writer, &reply, max_frame_size).await?;
            counters.messages_sent.fetch_add(1, Ordering::SeqCst);
        }
    }

    Ok(())
}

// ============================================================================
// TCP PEER CLIENT (outbound)
// ============================================================================

/// Outbound requests and sessions over TCP
#[derive(Debug, Clone, Default)]
pub struct TcpPeerClient {
    config: TransportConfig,
}

impl TcpPeerClient {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    async fn connect(&self, address: &PeerAddress) -> Result<TcpStream, TransportError> {
        let stream = timeout(
            self.config.connection_timeout(),
            TcpStream::connect(address.socket_string()),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        stream.set_nodelay(true).ok();
        Ok(stream)
    }
}

#[async_trait]
impl PeerClient for TcpPeerClient {
    async fn request(
        &self,
        address: &PeerAddress,
        message: Message,
    ) -> Result<Message, TransportError> {
        let mut stream = self.connect(address).await?;
        let max_frame_size = self.config.max_frame_size;

        let exchange = async {
            write_frame(&mut stream, &message, max_frame_size).await?;
            read_frame(&mut stream, max_frame_size)
                .await?
                .ok_or(TransportError::ConnectionClosed)
        };

        timeout(self.config.message_timeout(), exchange)
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn open_session(
        &self,
        address: &PeerAddress,
    ) -> Result<Box<dyn PeerSession>, TransportError> {
        let stream = self.connect(address).await?;
        Ok(Box::new(TcpSession {
            stream,
            config: self.config.clone(),
        }))
    }
}

/// Persistent push connection to one peer
struct TcpSession {
    stream: TcpStream,
    config: TransportConfig,
}

#[async_trait]
impl PeerSession for TcpSession {
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        timeout(
            self.config.message_timeout(),
            write_frame(&mut self.stream, message, self.config.max_frame_size),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
    }
}
