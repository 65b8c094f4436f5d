//! Transport event dispatch
//!
//! One-way translation from transport events to manager state transitions.
//! The pump is the single consumer of the transport's event channel, so
//! handlers run serialized in the order the transport emitted them and no
//! handler ever observes a half-applied transition from another event.
//! No business logic lives here.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::client::manager::ConnectionManager;
use crate::transport::TransportEvent;

/// Spawn the serialized event pump for a manager
pub(crate) fn spawn_event_pump(
    manager: Arc<ConnectionManager>,
    mut events: mpsc::Receiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            trace!(event = ?event_name(&event), "dispatching transport event");
            dispatch(&manager, event).await;
        }
        debug!("transport event channel closed, dispatch pump exiting");
    })
}

async fn dispatch(manager: &Arc<ConnectionManager>, event: TransportEvent) {
    match event {
        TransportEvent::Connected => manager.on_connected().await,
        TransportEvent::Disconnected {
            code,
            reason,
            socket_url,
            ignore_reconnection,
        } => {
            manager
                .on_disconnected(code, reason, socket_url, ignore_reconnection)
                .await
        }
        TransportEvent::Registered { headers } => manager.on_registered(headers).await,
        TransportEvent::Unregistered => manager.on_unregistered().await,
        TransportEvent::RegistrationFailed {
            cause,
            status_code,
            headers: _,
        } => manager.on_registration_failed(cause, status_code).await,
        TransportEvent::NewTransaction { call_id, method } => {
            manager.on_new_transaction(call_id, method).await
        }
        TransportEvent::NewRtcSession { offer } => manager.on_new_rtc_session(offer).await,
    }
}

fn event_name(event: &TransportEvent) -> &'static str {
    match event {
        TransportEvent::Connected => "connected",
        TransportEvent::Disconnected { .. } => "disconnected",
        TransportEvent::Registered { .. } => "registered",
        TransportEvent::Unregistered => "unregistered",
        TransportEvent::RegistrationFailed { .. } => "registration_failed",
        TransportEvent::NewTransaction { .. } => "new_transaction",
        TransportEvent::NewRtcSession { .. } => "new_rtc_session",
    }
}
