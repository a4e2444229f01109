// Ledger - The node's append-only chain of entries
//
// Every mutation (append, ingest, replace) is persisted before it is
// reported as done. If the write fails the in-memory chain is put back the
// way it was, so memory and disk never disagree.

use crate::ledger::authority::AuthoritySet;
use crate::ledger::entry::{DocumentRecord, Entry, EntryHash, Payload};
use crate::ledger::validation::{ChainValidator, RejectReason};
use crate::storage::{ChainStorage, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from ledger mutations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Rejected entry: {0}")]
    RejectedEntry(RejectReason),

    #[error("Rejected chain: {0}")]
    RejectedChain(RejectReason),

    #[error("Candidate chain of length {candidate} is not longer than local chain of length {local}")]
    ChainTooShort { candidate: usize, local: usize },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    /// Check if the failure came from storage rather than validation
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// What happened to an entry received from a peer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Validated, appended and persisted
    Appended,
    /// Already present (same hash); nothing changed
    Duplicate,
}

/// A node's ledger
pub struct Ledger {
    entries: Vec<Entry>,
    store: Box<dyn ChainStorage>,
}

impl Ledger {
    /// Load the chain from `store`, creating and persisting genesis if empty
    pub fn open(store: Box<dyn ChainStorage>) -> Result<Self, LedgerError> {
        let entries = store.load_chain()?.unwrap_or_default();

        let mut ledger = Self { entries, store };
        if ledger.entries.is_empty() {
            ledger.entries.push(Entry::genesis());
            ledger.persist()?;
            info!(hash = %ledger.tip().hash(), "genesis entry created");
        } else {
            info!(len = ledger.entries.len(), "ledger loaded");
        }

        Ok(ledger)
    }

    /// Number of entries, genesis included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A ledger always holds at least the genesis entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry
    pub fn tip(&self) -> &Entry {
        // open() guarantees genesis and replace() refuses empty chains
        &self.entries[self.entries.len() - 1]
    }

    /// All entries in chain order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Owned copy of the chain
    pub fn snapshot(&self) -> Vec<Entry> {
        self.entries.clone()
    }

    /// Build the next entry on top of the current tip
    pub fn next_entry(&self, payload: Payload, validator: &str, timestamp: i64) -> Entry {
        let tip = self.tip();
        Entry::new(
            tip.index() + 1,
            timestamp,
            payload,
            tip.hash().clone(),
            validator,
        )
    }

    /// Check if an entry with this hash is anywhere in the chain
    pub fn contains_hash(&self, hash: &EntryHash) -> bool {
        self.entries.iter().any(|e| e.hash() == hash)
    }

    /// Validate `entry` against the tip, append it and persist the chain
    pub fn append(&mut self, entry: Entry, authorities: &AuthoritySet) -> Result<(), LedgerError> {
        self.check_candidate(&entry, authorities)
            .map_err(LedgerError::RejectedEntry)?;

        let index = entry.index();
        self.entries.push(entry);
        if let Err(e) = self.persist() {
            self.entries.pop();
            warn!(index, error = %e, "append rolled back");
            return Err(e);
        }

        debug!(index, hash = %self.tip().hash(), "entry appended");
        Ok(())
    }

    /// Accept an entry that arrived from a peer.
    ///
    /// Entries already present are a no-op. Everything else goes through
    /// the same validation and persistence as [`Ledger::append`].
    pub fn ingest(
        &mut self,
        entry: Entry,
        authorities: &AuthoritySet,
    ) -> Result<IngestOutcome, LedgerError> {
        // Dedupe ahead of validation so a re-received entry logs as a duplicate, not a rejection
        if self.contains_hash(entry.hash()) {
            debug!(index = entry.index(), hash = %entry.hash(), "entry already present");
            return Ok(IngestOutcome::Duplicate);
        }

        self.append(entry, authorities)?;
        Ok(IngestOutcome::Appended)
    }

    /// Replace the whole chain with a strictly longer, fully valid one
    pub fn replace(
        &mut self,
        candidate: Vec<Entry>,
        authorities: &AuthoritySet,
    ) -> Result<(), LedgerError> {
        if candidate.len() <= self.entries.len() {
            return Err(LedgerError::ChainTooShort {
                candidate: candidate.len(),
                local: self.entries.len(),
            });
        }

        ChainValidator::check_full_chain(&candidate, authorities)
            .map_err(LedgerError::RejectedChain)?;

        let previous = std::mem::replace(&mut self.entries, candidate);
        if let Err(e) = self.persist() {
            self.entries = previous;
            warn!(error = %e, "chain replacement rolled back");
            return Err(e);
        }

        info!(
            old_len = previous.len(),
            new_len = self.entries.len(),
            tip = %self.tip().hash(),
            "chain replaced"
        );
        Ok(())
    }

    /// First entry whose document satisfies `predicate` (linear scan)
    pub fn find_by_document<F>(&self, predicate: F) -> Option<&Entry>
    where
        F: Fn(&DocumentRecord) -> bool,
    {
        self.entries
            .iter()
            .find(|e| e.document().is_some_and(&predicate))
    }

    /// Look up a document by its id
    pub fn find_by_document_id(&self, document_id: &str) -> Option<&Entry> {
        self.find_by_document(|d| d.document_id == document_id)
    }

    /// Look up a document by its content hash
    pub fn find_by_content_hash(&self, document_hash: &str) -> Option<&Entry> {
        self.find_by_document(|d| d.document_hash == document_hash)
    }

    fn check_candidate(&self, entry: &Entry, authorities: &AuthoritySet) -> Result<(), RejectReason> {
        // The genesis rule only applies to an empty ledger, which never
        // exists after open(); a second genesis would break the chain.
        if entry.is_genesis() && !self.entries.is_empty() {
            return Err(RejectReason::UnexpectedGenesis);
        }
        ChainValidator::check_candidate(entry, self.tip(), authorities)
    }

    fn persist(&self) -> Result<(), LedgerError> {
        self.store.save_chain(&self.entries)?;
        Ok(())
    }
}
