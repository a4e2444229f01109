// Protocol - Message types for node-to-node communication
//
// Defines the wire format for all messages exchanged between nodes:
// - NewEntry: Push-based entry propagation
// - RegisterPeer/PeerList/PeerAnnouncement/SyncPeers: Peer discovery
// - ChainRequest/ChainResponse: Pull-based full-chain transfer
// - SubmitDocument/FindDocument/Resolve/Ping: Operations for local clients

use crate::ledger::{DocumentRecord, Entry, EntryHash};
use crate::transport::PeerAddress;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Types of messages in the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    NewEntry,
    RegisterPeer,
    PeerList,
    PeerAnnouncement,
    SyncPeers,
    ChainRequest,
    ChainResponse,
    SubmitDocument,
    EntryAppended,
    FindDocument,
    DocumentMatch,
    Resolve,
    Resolved,
    Ping,
    Pong,
    Rejected,
}

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
}

/// How a client looks a document up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentQuery {
    /// Match on the document id
    ById(String),
    /// Match on the SHA-256 hex of the file content
    ByContentHash(String),
}

impl DocumentQuery {
    /// Check if a record satisfies this query
    pub fn matches(&self, record: &DocumentRecord) -> bool {
        match self {
            DocumentQuery::ById(id) => &record.document_id == id,
            DocumentQuery::ByContentHash(hash) => &record.document_hash == hash,
        }
    }
}

/// A node's self-description, answered to `Ping`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_name: String,
    pub address: PeerAddress,
    pub chain_length: u64,
    pub tip_hash: EntryHash,
    pub peers: Vec<PeerAddress>,
    /// Milliseconds since the unix epoch when the status was taken
    pub timestamp: i64,
}

/// Wrapper for all message types
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    /// A freshly appended entry, pushed without acknowledgement
    NewEntry(Entry),
    /// "Add me"; answered with `PeerList`
    RegisterPeer(PeerAddress),
    /// Full registry snapshot
    PeerList(Vec<PeerAddress>),
    /// Lightweight "this peer exists" notice; no reply
    PeerAnnouncement(PeerAddress),
    /// Merge these addresses; answered with `PeerList`
    SyncPeers(Vec<PeerAddress>),
    /// Ask for the complete chain; answered with `ChainResponse`
    ChainRequest,
    /// The responder's complete chain, in order
    ChainResponse(Vec<Entry>),
    /// Attest a document; answered with `EntryAppended` or `Rejected`
    SubmitDocument(DocumentRecord),
    EntryAppended(Entry),
    /// Look a document up; answered with `DocumentMatch`
    FindDocument(DocumentQuery),
    DocumentMatch(Option<Entry>),
    /// Run conflict resolution now; answered with `Resolved`
    Resolve,
    Resolved(bool),
    /// Liveness check; answered with `Pong`
    Ping,
    Pong(NodeStatus),
    /// A request could not be served
    Rejected(String),
}

impl Message {
    /// Get the message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::NewEntry(_) => MessageType::NewEntry,
            Message::RegisterPeer(_) => MessageType::RegisterPeer,
            Message::PeerList(_) => MessageType::PeerList,
            Message::PeerAnnouncement(_) => MessageType::PeerAnnouncement,
            Message::SyncPeers(_) => MessageType::SyncPeers,
            Message::ChainRequest => MessageType::ChainRequest,
            Message::ChainResponse(_) => MessageType::ChainResponse,
            Message::SubmitDocument(_) => MessageType::SubmitDocument,
            Message::EntryAppended(_) => MessageType::EntryAppended,
            Message::FindDocument(_) => MessageType::FindDocument,
            Message::DocumentMatch(_) => MessageType::DocumentMatch,
            Message::Resolve => MessageType::Resolve,
            Message::Resolved(_) => MessageType::Resolved,
            Message::Ping => MessageType::Ping,
            Message::Pong(_) => MessageType::Pong,
            Message::Rejected(_) => MessageType::Rejected,
        }
    }

    /// Check if the sender waits for a reply
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Message::RegisterPeer(_)
                | Message::SyncPeers(_)
                | Message::ChainRequest
                | Message::SubmitDocument(_)
                | Message::FindDocument(_)
                | Message::Resolve
                | Message::Ping
        )
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        postcard::to_allocvec(self).map_err(|e| ProtocolError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        postcard::from_bytes(bytes).map_err(|e| ProtocolError::DeserializationFailed(e.to_string()))
    }
}
