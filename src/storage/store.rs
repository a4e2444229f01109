// ChainStore - Durable storage for a node's ledger
//
// The whole chain is stored under a single key and overwritten on every
// mutation. There is no append log and nothing to compact.

use crate::ledger::Entry;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Key layout
mod keys {
    pub const CHAIN: &[u8] = b"ledger:chain";
    pub const NODE_NAME: &[u8] = b"ledger:node_name";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("Write refused: {0}")]
    WriteRefused(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Somewhere a ledger can keep its chain
pub trait ChainStorage: Send + Sync {
    /// Replace the stored chain with `entries`; durable once this returns Ok
    fn save_chain(&self, entries: &[Entry]) -> Result<(), StoreError>;

    /// Load the stored chain, if one was ever saved
    fn load_chain(&self) -> Result<Option<Vec<Entry>>, StoreError>;
}

fn encode_chain(entries: &[Entry]) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(entries).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode_chain(bytes: &[u8]) -> Result<Vec<Entry>, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

/// sled-backed chain storage
///
/// One database per node, opened under a node-identity-scoped directory.
pub struct ChainStore {
    db: sled::Db,
}

impl ChainStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open the store for `node_name` under `data_dir`
    pub fn open_for_node<P: AsRef<Path>>(data_dir: P, node_name: &str) -> Result<Self, StoreError> {
        let store = Self::open(data_dir.as_ref().join(node_name))?;
        if store.load_node_name()?.is_none() {
            store.save_node_name(node_name)?;
        }
        Ok(store)
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.is_empty())
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    /// Record which node owns this store
    pub fn save_node_name(&self, node_name: &str) -> Result<(), StoreError> {
        self.db.insert(keys::NODE_NAME, node_name.as_bytes())?;
        self.flush()
    }

    /// Load the owning node's name
    pub fn load_node_name(&self) -> Result<Option<String>, StoreError> {
        match self.db.get(keys::NODE_NAME)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| StoreError::DeserializationFailed(e.to_string())),
            None => Ok(None),
        }
    }
}

impl ChainStorage for ChainStore {
    fn save_chain(&self, entries: &[Entry]) -> Result<(), StoreError> {
        let bytes = encode_chain(entries)?;
        self.db.insert(keys::CHAIN, bytes)?;
        self.flush()?;
        debug!(len = entries.len(), "chain persisted");
        Ok(())
    }

    fn load_chain(&self) -> Result<Option<Vec<Entry>>, StoreError> {
        match self.db.get(keys::CHAIN)? {
            Some(bytes) => Ok(Some(decode_chain(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// In-memory chain storage for tests and throwaway nodes
///
/// Holds the encoded chain exactly as the sled store would, and can be told
/// to refuse writes to exercise persistence failures.
#[derive(Default)]
pub struct MemoryChainStore {
    chain: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ChainStorage for MemoryChainStore {
    fn save_chain(&self, entries: &[Entry]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRefused("writes disabled".to_string()));
        }
        let bytes = encode_chain(entries)?;
        let mut slot = self
            .chain
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        *slot = Some(bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_chain(&self) -> Result<Option<Vec<Entry>>, StoreError> {
        let slot = self
            .chain
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        slot.as_deref().map(decode_chain).transpose()
    }
}

/// Shared handle, so a caller can keep inspecting a store the ledger owns
impl<S: ChainStorage + ?Sized> ChainStorage for Arc<S> {
    fn save_chain(&self, entries: &[Entry]) -> Result<(), StoreError> {
        (**self).save_chain(entries)
    }

    fn load_chain(&self) -> Result<Option<Vec<Entry>>, StoreError> {
        (**self).load_chain()
    }
}
