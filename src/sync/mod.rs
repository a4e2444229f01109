// Sync module - HOW NODES TALK
// Handles push gossip, peer discovery and longest-chain conflict resolution

mod gossip;
mod peer;
mod protocol;
mod resolver;

pub use gossip::{GossipConfig, GossipEngine, GossipStats};
pub use peer::{PeerRegistry, PeerStats};
pub use protocol::{DocumentQuery, Message, MessageType, NodeStatus, ProtocolError};
pub use resolver::{ConflictResolver, ResolveReport};
