// TCP Transport Tests
// Loopback tests for the listener, request/response and push sessions

use docledger::ledger::{DocumentRecord, Entry, Payload};
use docledger::node::Node;
use docledger::storage::MemoryChainStore;
use docledger::sync::{DocumentQuery, Message};
use docledger::transport::{
    PeerAddress, PeerClient, TcpPeerClient, TcpTransport, TcpTransportConfig, TransportConfig,
    TransportError, TransportState,
};
use docledger::NodeConfig;
use std::sync::Arc;
use std::time::Duration;

fn client() -> TcpPeerClient {
    TcpPeerClient::new(
        TransportConfig::new()
            .with_connection_timeout(2)
            .with_message_timeout(2),
    )
}

async fn serve_node(name: &str) -> (Arc<Node>, TcpTransport, PeerAddress) {
    serve_node_with(name, TransportConfig::new()).await
}

async fn serve_node_with(
    name: &str,
    base: TransportConfig,
) -> (Arc<Node>, TcpTransport, PeerAddress) {
    let config = NodeConfig::new()
        .with_node_name(name)
        .with_advertise_host("127.0.0.1");
    let node = Arc::new(
        Node::new(
            &config,
            Box::new(MemoryChainStore::new()),
            Arc::new(client()),
        )
        .unwrap(),
    );

    let mut transport = TcpTransport::new(
        TcpTransportConfig::new()
            .with_base_config(base)
            .with_bind_address("127.0.0.1")
            .with_bind_port(0),
    );
    transport.start(node.clone()).await.unwrap();
    let address = transport.local_address().unwrap();

    (node, transport, address)
}

// ============================================================================
// LISTENER LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_transport_start_and_stop() {
    let (_node, mut transport, address) = serve_node("node_tcp").await;

    assert_eq!(transport.state(), &TransportState::Running);
    assert_eq!(address.host(), "127.0.0.1");
    assert_ne!(address.port(), 0);

    transport.stop().await.unwrap();
    assert_eq!(transport.state(), &TransportState::Stopped);
    assert!(transport.local_address().is_none());
}

#[tokio::test]
async fn test_double_start_refused() {
    let (node, mut transport, _address) = serve_node("node_tcp").await;

    let result = transport.start(node.clone()).await;
    assert!(matches!(result, Err(TransportError::AlreadyRunning)));
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (node, mut transport, _address) = serve_node("node_tcp").await;

    transport.stop().await.unwrap();
    transport.stop().await.unwrap();
    assert_eq!(transport.state(), &TransportState::Stopped);

    transport.start(node.clone()).await.unwrap();
    assert_eq!(transport.state(), &TransportState::Running);
    let address = transport.local_address().unwrap();
    assert!(matches!(
        client().request(&address, Message::Ping).await,
        Ok(Message::Pong(_))
    ));
}

#[tokio::test]
async fn test_connection_limit_refuses_extra_peers() {
    let (_node, transport, address) =
        serve_node_with("node_tcp", TransportConfig::new().with_max_connections(1)).await;

    let _held = client().open_session(&address).await.unwrap();
    for _ in 0..100 {
        if transport.stats().connections_active == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.stats().connections_active, 1);

    let result = client().request(&address, Message::Ping).await;
    assert!(result.is_err());

    for _ in 0..100 {
        if transport.stats().connections_refused == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.stats().connections_refused, 1);
    assert_eq!(transport.stats().connections_total, 1);
}

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

#[tokio::test]
async fn test_ping_over_tcp() {
    let (_node, _transport, address) = serve_node("node_tcp").await;

    match client().request(&address, Message::Ping).await.unwrap() {
        Message::Pong(status) => {
            assert_eq!(status.node_name, "node_tcp");
            assert_eq!(status.chain_length, 1);
            assert_eq!(&status.tip_hash, Entry::genesis().hash());
        }
        other => panic!("unexpected reply: {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_and_find_over_tcp() {
    let (node, transport, address) = serve_node("node_tcp").await;
    let client = client();

    let appended = match client
        .request(&address, Message::SubmitDocument(DocumentRecord::new("D1", "abc")))
        .await
        .unwrap()
    {
        Message::EntryAppended(entry) => entry,
        other => panic!("unexpected reply: {:?}", other),
    };
    assert_eq!(appended.index(), 1);
    assert_eq!(appended.validator(), "node_tcp");

    match client
        .request(
            &address,
            Message::FindDocument(DocumentQuery::ByContentHash("abc".to_string())),
        )
        .await
        .unwrap()
    {
        Message::DocumentMatch(Some(found)) => assert_eq!(found, appended),
        other => panic!("unexpected reply: {:?}", other),
    }

    match client.request(&address, Message::ChainRequest).await.unwrap() {
        Message::ChainResponse(chain) => assert_eq!(chain, node.list_entries().await),
        other => panic!("unexpected reply: {:?}", other),
    }

    assert!(transport.stats().messages_received >= 3);
}

#[tokio::test]
async fn test_connection_refused() {
    let (_node, mut transport, address) = serve_node("node_tcp").await;
    transport.stop().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = client().request(&address, Message::Ping).await;
    assert!(result.is_err());
}

// ============================================================================
// PUSH SESSIONS
// ============================================================================

#[tokio::test]
async fn test_session_pushes_entries() {
    let (node, _transport, address) = serve_node("node_tcp").await;

    let genesis = Entry::genesis();
    let first = Entry::new(
        1,
        1,
        Payload::Document(DocumentRecord::new("D1", "abc")),
        genesis.hash().clone(),
        "validator1",
    );
    let second = Entry::new(
        2,
        2,
        Payload::Document(DocumentRecord::new("D2", "def")),
        first.hash().clone(),
        "validator2",
    );

    let mut session = client().open_session(&address).await.unwrap();
    session.send(&Message::NewEntry(first.clone())).await.unwrap();
    session.send(&Message::NewEntry(second.clone())).await.unwrap();

    for _ in 0..100 {
        if node.chain_len().await == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(node.list_entries().await, vec![genesis, first, second]);
}
