// Ledger Entry - One immutable, hash-chained attestation record
//
// The hash is computed once at construction and stored. Re-deriving it is
// only ever done to verify a stored entry, never to replace the stored value.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Validator identity that signs the genesis entry
pub const GENESIS_VALIDATOR: &str = "genesis";

/// Previous-hash marker carried by the genesis entry
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Label stored as the genesis payload
pub const GENESIS_LABEL: &str = "Genesis Block - Document Validation System";

const PAYLOAD_TAG_GENESIS: u8 = 0;
const PAYLOAD_TAG_DOCUMENT: u8 = 1;

/// Lowercase hex SHA-256 digest identifying an entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryHash(String);

impl EntryHash {
    /// Wrap an already-rendered hash string
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The "0" marker used as the genesis entry's previous hash
    pub fn genesis_parent() -> Self {
        Self(GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Get the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the genesis parent marker
    pub fn is_genesis_parent(&self) -> bool {
        self.0 == GENESIS_PREVIOUS_HASH
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document attestation as assembled by the submitting collaborator.
///
/// The ledger never interprets these fields; they only participate in the
/// entry hash through [`Payload::canonical_bytes`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub title: String,
    pub issuer: String,
    pub recipient: String,
    pub issue_date: String,
    /// SHA-256 hex of the attested file's content
    pub document_hash: String,
    /// Opaque (encrypted) reference to where the file is stored
    pub storage_ref: String,
    pub verified: bool,
}

impl DocumentRecord {
    /// Create a record with the identifying fields; the rest default to empty
    pub fn new(document_id: &str, document_hash: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            title: String::new(),
            issuer: String::new(),
            recipient: String::new(),
            issue_date: String::new(),
            document_hash: document_hash.to_string(),
            storage_ref: String::new(),
            verified: true,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.issuer = issuer.to_string();
        self
    }

    pub fn with_recipient(mut self, recipient: &str) -> Self {
        self.recipient = recipient.to_string();
        self
    }

    pub fn with_issue_date(mut self, issue_date: &str) -> Self {
        self.issue_date = issue_date.to_string();
        self
    }

    pub fn with_storage_ref(mut self, storage_ref: &str) -> Self {
        self.storage_ref = storage_ref.to_string();
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }
}

/// What an entry attests to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Free-form label carried only by the genesis entry
    Genesis(String),
    /// A document attestation
    Document(DocumentRecord),
}

impl Payload {
    /// Get the document record, if this payload carries one
    pub fn document(&self) -> Option<&DocumentRecord> {
        match self {
            Payload::Document(record) => Some(record),
            Payload::Genesis(_) => None,
        }
    }

    /// Pinned byte encoding of the payload used as hash input.
    ///
    /// Layout: one tag byte, then every field length-prefixed (u32 LE) in
    /// declaration order, booleans as a single byte. Changing this changes
    /// every hash on every node.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Payload::Genesis(label) => {
                bytes.push(PAYLOAD_TAG_GENESIS);
                put_str(&mut bytes, label);
            }
            Payload::Document(record) => {
                bytes.push(PAYLOAD_TAG_DOCUMENT);
                put_str(&mut bytes, &record.document_id);
                put_str(&mut bytes, &record.title);
                put_str(&mut bytes, &record.issuer);
                put_str(&mut bytes, &record.recipient);
                put_str(&mut bytes, &record.issue_date);
                put_str(&mut bytes, &record.document_hash);
                put_str(&mut bytes, &record.storage_ref);
                bytes.push(record.verified as u8);
            }
        }
        bytes
    }
}

fn put_str(bytes: &mut Vec<u8>, value: &str) {
    bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
    bytes.extend_from_slice(value.as_bytes());
}

/// One ledger record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    index: u64,
    /// Milliseconds since the unix epoch (0 for genesis)
    timestamp: i64,
    payload: Payload,
    previous_hash: EntryHash,
    validator: String,
    hash: EntryHash,
}

impl Entry {
    /// Build a new entry, computing and storing its hash
    pub fn new(
        index: u64,
        timestamp: i64,
        payload: Payload,
        previous_hash: EntryHash,
        validator: &str,
    ) -> Self {
        let hash = Self::compute_hash(index, &previous_hash, timestamp, &payload, validator);
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            validator: validator.to_string(),
            hash,
        }
    }

    /// Reassemble an entry from all six fields without recomputing its hash.
    ///
    /// Used for entries received from elsewhere; the stored hash is kept
    /// as-is so validation can detect tampering.
    pub fn from_parts(
        index: u64,
        timestamp: i64,
        payload: Payload,
        previous_hash: EntryHash,
        validator: &str,
        hash: EntryHash,
    ) -> Self {
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            validator: validator.to_string(),
            hash,
        }
    }

    /// The genesis entry every fresh ledger starts from
    pub fn genesis() -> Self {
        Self::new(
            0,
            0,
            Payload::Genesis(GENESIS_LABEL.to_string()),
            EntryHash::genesis_parent(),
            GENESIS_VALIDATOR,
        )
    }

    /// Digest over (index, previous_hash, timestamp, payload, validator)
    pub fn compute_hash(
        index: u64,
        previous_hash: &EntryHash,
        timestamp: i64,
        payload: &Payload,
        validator: &str,
    ) -> EntryHash {
        let mut hasher = Sha256::new();
        hasher.update(index.to_le_bytes());
        hasher.update((previous_hash.as_str().len() as u32).to_le_bytes());
        hasher.update(previous_hash.as_str().as_bytes());
        hasher.update(timestamp.to_le_bytes());
        hasher.update(payload.canonical_bytes());
        hasher.update((validator.len() as u32).to_le_bytes());
        hasher.update(validator.as_bytes());
        EntryHash(hex::encode(hasher.finalize()))
    }

    /// Re-derive the hash from the current fields (verification only)
    pub fn recompute_hash(&self) -> EntryHash {
        Self::compute_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.payload,
            &self.validator,
        )
    }

    /// Check if the stored hash matches the fields
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.recompute_hash()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn previous_hash(&self) -> &EntryHash {
        &self.previous_hash
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }

    pub fn hash(&self) -> &EntryHash {
        &self.hash
    }

    /// Check if this entry claims the genesis position
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Shortcut to the attested document, if any
    pub fn document(&self) -> Option<&DocumentRecord> {
        self.payload.document()
    }
}
