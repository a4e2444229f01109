// Transport module - THE WIRE
// Provides the peer-facing seams plus TCP and in-process implementations

mod frame;
mod memory;
mod tcp;
mod traits;

pub use traits::{
    // Seams
    MessageHandler, PeerClient, PeerSession,
    // Configuration
    TransportConfig, DEFAULT_MAX_FRAME_SIZE,
    // Address and lifecycle
    PeerAddress, TransportState,
    // Errors
    TransportError,
};

pub use frame::{read_frame, write_frame};
pub use memory::MemoryNetwork;
pub use tcp::{TcpPeerClient, TcpTransport, TcpTransportConfig, TransportStats};
