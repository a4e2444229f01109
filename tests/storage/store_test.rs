// Store Tests
// Tests for the sled-backed whole-chain store

use docledger::ledger::{DocumentRecord, Entry, Payload};
use docledger::storage::{ChainStorage, ChainStore, MemoryChainStore, StoreError};
use tempfile::TempDir;

fn chain(len: usize) -> Vec<Entry> {
    let mut chain = vec![Entry::genesis()];
    while chain.len() < len {
        let tip = &chain[chain.len() - 1];
        let entry = Entry::new(
            tip.index() + 1,
            tip.index() as i64,
            Payload::Document(DocumentRecord::new("D", "abc")),
            tip.hash().clone(),
            "validator1",
        );
        chain.push(entry);
    }
    chain
}

// ============================================================================
// STORE CREATION
// ============================================================================

#[test]
fn test_store_open_new() {
    let temp_dir = TempDir::new().unwrap();
    let store = ChainStore::open(temp_dir.path()).unwrap();

    assert!(store.is_empty().unwrap());
    assert!(store.load_chain().unwrap().is_none());
}

#[test]
fn test_store_scoped_by_node_name() {
    let temp_dir = TempDir::new().unwrap();

    {
        let alpha = ChainStore::open_for_node(temp_dir.path(), "node_alpha").unwrap();
        alpha.save_chain(&chain(3)).unwrap();
        assert_eq!(alpha.load_node_name().unwrap().as_deref(), Some("node_alpha"));
    }

    let beta = ChainStore::open_for_node(temp_dir.path(), "node_beta").unwrap();
    assert!(beta.load_chain().unwrap().is_none());
    assert!(temp_dir.path().join("node_alpha").exists());
    assert!(temp_dir.path().join("node_beta").exists());
}

// ============================================================================
// WHOLE-CHAIN OVERWRITE
// ============================================================================

#[test]
fn test_save_overwrites_previous_chain() {
    let temp_dir = TempDir::new().unwrap();
    let store = ChainStore::open(temp_dir.path()).unwrap();

    store.save_chain(&chain(5)).unwrap();
    store.save_chain(&chain(2)).unwrap();

    assert_eq!(store.load_chain().unwrap(), Some(chain(2)));
}

#[test]
fn test_chain_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = ChainStore::open(temp_dir.path()).unwrap();
        store.save_chain(&chain(4)).unwrap();
    }

    let store = ChainStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.load_chain().unwrap(), Some(chain(4)));

    let stats = store.stats().unwrap();
    assert!(stats.key_count >= 1);
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[test]
fn test_memory_store_counts_writes() {
    let store = MemoryChainStore::new();

    store.save_chain(&chain(1)).unwrap();
    store.save_chain(&chain(2)).unwrap();

    assert_eq!(store.write_count(), 2);
    assert_eq!(store.load_chain().unwrap(), Some(chain(2)));
}

#[test]
fn test_memory_store_refusal_keeps_old_chain() {
    let store = MemoryChainStore::new();
    store.save_chain(&chain(2)).unwrap();

    store.set_fail_writes(true);
    let result = store.save_chain(&chain(3));
    assert!(matches!(result, Err(StoreError::WriteRefused(_))));
    assert_eq!(store.load_chain().unwrap(), Some(chain(2)));

    store.set_fail_writes(false);
    store.save_chain(&chain(3)).unwrap();
    assert_eq!(store.load_chain().unwrap(), Some(chain(3)));
}
