// Memory Transport - In-process network for running several nodes together
//
// Nodes register under an address; requests and sessions call straight
// into the registered handler. Addresses can be taken offline to simulate
// unreachable peers.

use crate::sync::Message;
use crate::transport::{MessageHandler, PeerAddress, PeerClient, PeerSession, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

#[derive(Default)]
struct Routes {
    handlers: HashMap<PeerAddress, Weak<dyn MessageHandler>>,
    offline: HashSet<PeerAddress>,
}

/// Shared in-process network; clone it to hand out to each node
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    routes: Arc<RwLock<Routes>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handler` reachable at `address`
    pub fn register<H>(&self, address: PeerAddress, handler: &Arc<H>)
    where
        H: MessageHandler + 'static,
    {
        let weak: Weak<dyn MessageHandler> = Arc::downgrade(handler) as Weak<dyn MessageHandler>;
        if let Ok(mut routes) = self.routes.write() {
            routes.handlers.insert(address, weak);
        }
    }

    /// Take an address offline (or bring it back)
    pub fn set_offline(&self, address: &PeerAddress, offline: bool) {
        if let Ok(mut routes) = self.routes.write() {
            if offline {
                routes.offline.insert(address.clone());
            } else {
                routes.offline.remove(address);
            }
        }
    }

    /// Hand out this network as a peer client
    pub fn client(&self) -> Arc<dyn PeerClient> {
        Arc::new(self.clone())
    }

    fn resolve(&self, address: &PeerAddress) -> Result<Arc<dyn MessageHandler>, TransportError> {
        let routes = self
            .routes
            .read()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if routes.offline.contains(address) {
            return Err(TransportError::ConnectionFailed(format!("{address} is offline")));
        }

        routes
            .handlers
            .get(address)
            .and_then(Weak::upgrade)
            .ok_or_else(|| TransportError::ConnectionFailed(format!("no route to {address}")))
    }
}

#[async_trait]
impl PeerClient for MemoryNetwork {
    async fn request(
        &self,
        address: &PeerAddress,
        message: Message,
    ) -> Result<Message, TransportError> {
        let handler = self.resolve(address)?;
        handler
            .handle_message(message)
            .await
            .ok_or(TransportError::ConnectionClosed)
    }

    async fn open_session(
        &self,
        address: &PeerAddress,
    ) -> Result<Box<dyn PeerSession>, TransportError> {
        self.resolve(address)?;
        Ok(Box::new(MemorySession {
            network: self.clone(),
            address: address.clone(),
        }))
    }
}

struct MemorySession {
    network: MemoryNetwork,
    address: PeerAddress,
}

#[async_trait]
impl PeerSession for MemorySession {
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        // Re-resolve on every push so going offline is noticed mid-session
        let handler = self.network.resolve(&self.address)?;
        handler.handle_message(message.clone()).await;
        Ok(())
    }
}
