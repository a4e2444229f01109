// docledger - Permissioned proof-of-authority ledger for document attestations
//
// Each node keeps a hash-chained ledger of attestation entries, pushes new
// entries to its peers, and converges on the longest valid chain.

pub mod attest;
pub mod config;
pub mod ledger;
pub mod node;
pub mod storage;
pub mod sync;
pub mod transport;

pub use config::{ConfigError, NodeConfig};
pub use ledger::{AuthoritySet, DocumentRecord, Entry, EntryHash, Ledger, LedgerError, Payload};
pub use node::{Node, NodeError};
pub use sync::{DocumentQuery, Message};
pub use transport::PeerAddress;
