// Ledger module - THE CHAIN
// Handles entries, proof-of-authority validation and the node's local chain

mod authority;
mod chain;
mod entry;
mod validation;

pub use authority::{AuthoritySet, DEFAULT_AUTHORITIES};
pub use chain::{IngestOutcome, Ledger, LedgerError};
pub use entry::{
    DocumentRecord, Entry, EntryHash, Payload, GENESIS_LABEL, GENESIS_PREVIOUS_HASH,
    GENESIS_VALIDATOR,
};
pub use validation::{ChainValidator, RejectReason};
