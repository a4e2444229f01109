// Peer Tests
// Tests for the monotonic peer registry

use docledger::sync::PeerRegistry;
use docledger::transport::PeerAddress;

fn addr(host: &str) -> PeerAddress {
    PeerAddress::tcp(host, 3000)
}

// ============================================================================
// REGISTRY MEMBERSHIP
// ============================================================================

#[test]
fn test_registry_starts_with_self() {
    let registry = PeerRegistry::new(addr("10.0.0.1"));

    assert_eq!(registry.own_address(), &addr("10.0.0.1"));
    assert_eq!(registry.snapshot(), vec![addr("10.0.0.1")]);
}

#[test]
fn test_registry_register_a_b_a() {
    let me = addr("10.0.0.1");
    let a = addr("10.0.0.2");
    let b = addr("10.0.0.3");
    let mut registry = PeerRegistry::new(me.clone());

    assert!(registry.add_peer(a.clone()));
    assert!(registry.add_peer(b.clone()));
    assert!(!registry.add_peer(a.clone()));

    assert_eq!(registry.remote_peers(&[]), vec![a, b]);
    assert_eq!(registry.peer_count(), 3);
}

#[test]
fn test_merge_is_union() {
    let mut registry = PeerRegistry::new(addr("10.0.0.1"));
    registry.add_peer(addr("10.0.0.2"));

    let added = registry.merge(vec![addr("10.0.0.2"), addr("10.0.0.3"), addr("10.0.0.1")]);

    assert_eq!(added, vec![addr("10.0.0.3")]);
    assert_eq!(registry.peer_count(), 3);
}

#[test]
fn test_merge_never_removes() {
    let mut registry = PeerRegistry::new(addr("10.0.0.1"));
    registry.add_peer(addr("10.0.0.2"));

    registry.merge(Vec::new());

    assert!(registry.has_peer(&addr("10.0.0.2")));
}

// ============================================================================
// SELF EXCLUSION
// ============================================================================

#[test]
fn test_remote_peers_exclude_aliases() {
    let mut registry = PeerRegistry::new(addr("10.0.0.1"));
    registry.add_peer(PeerAddress::tcp("127.0.0.1", 3000));
    registry.add_peer(PeerAddress::tcp("localhost", 3000));
    registry.add_peer(addr("10.0.0.2"));

    let aliases = [
        PeerAddress::tcp("127.0.0.1", 3000),
        PeerAddress::tcp("localhost", 3000),
    ];
    assert_eq!(registry.remote_peers(&aliases), vec![addr("10.0.0.2")]);

    let stats = registry.stats();
    assert_eq!(stats.total_peers, 4);
    assert_eq!(stats.remote_peers, 3);
}
