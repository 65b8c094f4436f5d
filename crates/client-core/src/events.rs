//! Host-facing events for connection lifecycle changes
//!
//! Events are delivered two ways, mirroring the rest of the product family:
//! a broadcast channel for multi-consumer streaming
//! ([`EventSink::subscribe`]) and an optional [`ClientEventHandler`] trait
//! object for callback-style hosts. Both see every event; handlers are
//! awaited on the dispatch path so observable ordering matches transition
//! ordering.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use crate::client::types::ConnectionStatus;
use crate::session::CallId;

/// Externally observable lifecycle events
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A login attempt was rejected or failed; the reason is human-readable
    LoginFailed { reason: String },
    /// The connection state changed (always carries the transition reason)
    ConnectionChanged { status: ConnectionStatus },
    /// A fresh login completed its first successful registration
    LoggedIn,
    /// An explicit logout completed
    LoggedOut,
    /// The public network address changed and was re-resolved
    NetworkChanged { address: String, network_type: String },
    /// An inbound call passed admission and is awaiting an answer
    IncomingCall { call_id: CallId, caller: String },
}

/// Callback-style event consumer
///
/// Every method has a default empty implementation; hosts override what
/// they care about. `on_event` is the fan-in used by the delivery path and
/// normally stays untouched.
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    async fn on_login_failed(&self, _reason: String) {}

    async fn on_connection_changed(&self, _status: ConnectionStatus) {}

    async fn on_logged_in(&self) {}

    async fn on_logged_out(&self) {}

    async fn on_network_changed(&self, _address: String, _network_type: String) {}

    async fn on_incoming_call(&self, _call_id: CallId, _caller: String) {}

    async fn on_event(&self, event: ClientEvent) {
        match event {
            ClientEvent::LoginFailed { reason } => self.on_login_failed(reason).await,
            ClientEvent::ConnectionChanged { status } => self.on_connection_changed(status).await,
            ClientEvent::LoggedIn => self.on_logged_in().await,
            ClientEvent::LoggedOut => self.on_logged_out().await,
            ClientEvent::NetworkChanged { address, network_type } => {
                self.on_network_changed(address, network_type).await
            }
            ClientEvent::IncomingCall { call_id, caller } => {
                self.on_incoming_call(call_id, caller).await
            }
        }
    }
}

/// Event delivery shared by the manager, admission controller and network
/// reporter
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<ClientEvent>,
    handler: Arc<RwLock<Option<Arc<dyn ClientEventHandler>>>>,
}

impl EventSink {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Subscribe a new broadcast consumer
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Register (or replace) the callback handler
    pub async fn set_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Deliver one event to the broadcast channel and the handler
    pub async fn emit(&self, event: ClientEvent) {
        trace!(event = ?event, "emitting client event");
        // A send error only means no broadcast subscriber is attached.
        let _ = self.tx.send(event.clone());
        let handler = self.handler.read().await.clone();
        if let Some(handler) = handler {
            handler.on_event(event).await;
        }
    }
}
