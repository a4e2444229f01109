// Storage module - PERSISTENCE
// Handles whole-chain persistence using sled

mod store;

pub use store::{ChainStorage, ChainStore, MemoryChainStore, StorageStats, StoreError};
