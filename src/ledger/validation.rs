// Chain Validation - Proof-of-authority rules for entries and whole chains
//
// Both checks are pure: they never mutate anything and only log.

use crate::ledger::authority::AuthoritySet;
use crate::ledger::entry::{Entry, EntryHash, GENESIS_VALIDATOR};
use thiserror::Error;
use tracing::debug;

/// Why an entry or chain was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Invalid genesis: index 0 must have validator \"genesis\" and previous hash \"0\"")]
    InvalidGenesis,

    #[error("Hash mismatch at index {index}: stored {stored}, computed {computed}")]
    HashMismatch {
        index: u64,
        stored: EntryHash,
        computed: EntryHash,
    },

    #[error("Broken link at index {index}: expected previous hash {expected}, found {found}")]
    BrokenLink {
        index: u64,
        expected: EntryHash,
        found: EntryHash,
    },

    #[error("Unauthorized validator at index {index}: {validator}")]
    UnauthorizedValidator { index: u64, validator: String },

    #[error("Genesis entry cannot be appended to a non-empty ledger")]
    UnexpectedGenesis,

    #[error("Empty chain")]
    EmptyChain,
}

/// Validator for ledger entries and chains
pub struct ChainValidator;

impl ChainValidator {
    /// Check a single candidate against the current tip.
    ///
    /// Genesis candidates (index 0) only need the genesis validator and the
    /// "0" previous hash. Every other candidate must carry its own correct
    /// hash, link to the tip and be signed by an authorized validator.
    pub fn check_candidate(
        entry: &Entry,
        tip: &Entry,
        authorities: &AuthoritySet,
    ) -> Result<(), RejectReason> {
        if entry.is_genesis() {
            if entry.validator() == GENESIS_VALIDATOR && entry.previous_hash().is_genesis_parent() {
                return Ok(());
            }
            return Err(RejectReason::InvalidGenesis);
        }

        let computed = entry.recompute_hash();
        let hash_ok = &computed == entry.hash();
        let link_ok = entry.previous_hash() == tip.hash();
        let authority_ok = authorities.is_authorized(entry.validator());

        debug!(
            index = entry.index(),
            hash_ok, link_ok, authority_ok, "candidate validation"
        );

        if !hash_ok {
            return Err(RejectReason::HashMismatch {
                index: entry.index(),
                stored: entry.hash().clone(),
                computed,
            });
        }
        if !link_ok {
            return Err(RejectReason::BrokenLink {
                index: entry.index(),
                expected: tip.hash().clone(),
                found: entry.previous_hash().clone(),
            });
        }
        if !authority_ok {
            return Err(RejectReason::UnauthorizedValidator {
                index: entry.index(),
                validator: entry.validator().to_string(),
            });
        }
        Ok(())
    }

    /// Boolean form of [`ChainValidator::check_candidate`]
    pub fn validate_candidate(entry: &Entry, tip: &Entry, authorities: &AuthoritySet) -> bool {
        Self::check_candidate(entry, tip, authorities).is_ok()
    }

    /// Walk a whole chain from position 1 and stop at the first violation.
    ///
    /// The entry at position 0 is taken as-is; it is not checked against the
    /// genesis rule.
    pub fn check_full_chain(
        entries: &[Entry],
        authorities: &AuthoritySet,
    ) -> Result<(), RejectReason> {
        if entries.is_empty() {
            return Err(RejectReason::EmptyChain);
        }

        for pair in entries.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);

            let computed = current.recompute_hash();
            if &computed != current.hash() {
                return Err(RejectReason::HashMismatch {
                    index: current.index(),
                    stored: current.hash().clone(),
                    computed,
                });
            }

            if current.previous_hash() != previous.hash() {
                return Err(RejectReason::BrokenLink {
                    index: current.index(),
                    expected: previous.hash().clone(),
                    found: current.previous_hash().clone(),
                });
            }

            if !authorities.is_authorized(current.validator()) {
                return Err(RejectReason::UnauthorizedValidator {
                    index: current.index(),
                    validator: current.validator().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Boolean form of [`ChainValidator::check_full_chain`]
    pub fn validate_full_chain(entries: &[Entry], authorities: &AuthoritySet) -> bool {
        match Self::check_full_chain(entries, authorities) {
            Ok(()) => true,
            Err(reason) => {
                debug!(%reason, len = entries.len(), "chain rejected");
                false
            }
        }
    }
}
