// Validation Tests
// Tests for single-entry and full-chain proof-of-authority checks

use docledger::ledger::{
    AuthoritySet, ChainValidator, DocumentRecord, Entry, EntryHash, Payload, RejectReason,
};

fn authorities() -> AuthoritySet {
    AuthoritySet::with_defaults("node_x")
}

fn next(tip: &Entry, validator: &str) -> Entry {
    let index = tip.index() + 1;
    Entry::new(
        index,
        index as i64 * 1_000,
        Payload::Document(DocumentRecord::new(&format!("D{index}"), &format!("h{index}"))),
        tip.hash().clone(),
        validator,
    )
}

fn chain_of(len: usize) -> Vec<Entry> {
    let mut chain = vec![Entry::genesis()];
    while chain.len() < len {
        let entry = next(&chain[chain.len() - 1], "validator1");
        chain.push(entry);
    }
    chain
}

// ============================================================================
// CANDIDATE VALIDATION
// ============================================================================

#[test]
fn test_candidate_valid() {
    let genesis = Entry::genesis();
    let entry = next(&genesis, "node_x");

    assert!(ChainValidator::validate_candidate(&entry, &genesis, &authorities()));
}

#[test]
fn test_candidate_genesis_rule() {
    let genesis = Entry::genesis();
    assert!(ChainValidator::validate_candidate(&genesis, &genesis, &authorities()));

    let bad = Entry::new(
        0,
        0,
        Payload::Genesis("other".to_string()),
        EntryHash::genesis_parent(),
        "validator1",
    );
    assert_eq!(
        ChainValidator::check_candidate(&bad, &genesis, &authorities()),
        Err(RejectReason::InvalidGenesis)
    );
}

#[test]
fn test_candidate_hash_mismatch() {
    let genesis = Entry::genesis();
    let good = next(&genesis, "validator1");
    let forged = Entry::from_parts(
        good.index(),
        good.timestamp() + 5,
        good.payload().clone(),
        good.previous_hash().clone(),
        good.validator(),
        good.hash().clone(),
    );

    assert!(matches!(
        ChainValidator::check_candidate(&forged, &genesis, &authorities()),
        Err(RejectReason::HashMismatch { index: 1, .. })
    ));
}

#[test]
fn test_candidate_broken_link() {
    let chain = chain_of(3);
    // Links to genesis, but the tip is index 2
    let stale = next(&chain[0], "validator1");

    assert!(matches!(
        ChainValidator::check_candidate(&stale, &chain[2], &authorities()),
        Err(RejectReason::BrokenLink { .. })
    ));
}

#[test]
fn test_candidate_unauthorized_despite_valid_hash_and_link() {
    let genesis = Entry::genesis();
    let entry = next(&genesis, "mallory");

    assert!(entry.has_valid_hash());
    assert_eq!(entry.previous_hash(), genesis.hash());
    assert_eq!(
        ChainValidator::check_candidate(&entry, &genesis, &authorities()),
        Err(RejectReason::UnauthorizedValidator {
            index: 1,
            validator: "mallory".to_string(),
        })
    );
}

// ============================================================================
// FULL-CHAIN VALIDATION
// ============================================================================

#[test]
fn test_full_chain_valid() {
    let chain = chain_of(5);

    assert!(ChainValidator::validate_full_chain(&chain, &authorities()));
    for pair in chain.windows(2) {
        assert_eq!(pair[1].previous_hash(), pair[0].hash());
    }
}

#[test]
fn test_full_chain_genesis_only() {
    assert!(ChainValidator::validate_full_chain(&[Entry::genesis()], &authorities()));
}

#[test]
fn test_full_chain_empty_rejected() {
    assert_eq!(
        ChainValidator::check_full_chain(&[], &authorities()),
        Err(RejectReason::EmptyChain)
    );
}

#[test]
fn test_full_chain_reports_first_violation() {
    let mut chain = chain_of(5);
    chain[3] = Entry::new(
        3,
        3_000,
        chain[3].payload().clone(),
        EntryHash::new("not-the-previous-hash"),
        "validator1",
    );

    match ChainValidator::check_full_chain(&chain, &authorities()) {
        Err(RejectReason::BrokenLink { index, found, .. }) => {
            assert_eq!(index, 3);
            assert_eq!(found.as_str(), "not-the-previous-hash");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_full_chain_unauthorized_entry() {
    let mut chain = chain_of(3);
    let rogue = next(&chain[2], "mallory");
    chain.push(rogue);

    assert!(!ChainValidator::validate_full_chain(&chain, &authorities()));
}

#[test]
fn test_full_chain_does_not_check_position_zero() {
    // A non-standard first entry is accepted as long as the rest links to it
    let root = Entry::new(
        0,
        42,
        Payload::Genesis("forged".to_string()),
        EntryHash::new("x"),
        "nobody",
    );
    let child = next(&root, "validator2");

    assert!(ChainValidator::validate_full_chain(&[root, child], &authorities()));
}
