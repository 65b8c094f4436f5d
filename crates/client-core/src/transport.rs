//! Signaling transport interface
//!
//! The persistent connection carrying SIP call-control messages (in
//! production a WebSocket owned by the SIP stack) is consumed through the
//! narrow surface in this module: commands on [`SignalingTransport`],
//! construction through [`TransportFactory`], and events delivered as the
//! [`TransportEvent`] tagged union. The manager never sees the SIP library
//! itself, which keeps the lifecycle logic testable against scripted
//! transports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::client::types::Credentials;
use crate::error::ClientResult;
use crate::session::SessionOffer;

/// Registrar header carrying the signed access token
pub const JWT_HEADER: &str = "X-Plivo-Jwt";

/// Case-insensitive response header collection
///
/// SIP header values are multi-valued; lookups return the first value.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    values: HashMap<String, Vec<String>>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

/// Parse the token-expiry epoch from a registration response
///
/// The token header value is a sequence of `key=value` segments delimited by
/// `;`; the `exp` segment carries the expiry in seconds since the epoch.
/// The stored value is in milliseconds.
pub fn parse_token_expiry_ms(headers: &ResponseHeaders) -> Option<u64> {
    let raw = headers.first(JWT_HEADER)?;
    for segment in raw.split(';') {
        let mut parts = segment.trim().splitn(2, '=');
        if parts.next() == Some("exp") {
            if let Some(value) = parts.next() {
                if let Ok(secs) = value.trim().parse::<u64>() {
                    return Some(secs.saturating_mul(1000));
                }
            }
        }
    }
    None
}

/// Configuration handed to the transport layer for one signaling connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Signaling endpoint for this connection
    pub socket_url: String,
    /// Registration target, `<username>@<domain>` (domain only in
    /// access-token mode, where identity is asserted by the token header)
    pub register_uri: String,
    pub credentials: Credentials,
    /// Extra headers sent on REGISTER, e.g. the access-token header
    pub extra_headers: Vec<(String, String)>,
    /// Keep-alive / registration refresh interval
    pub registration_refresh_secs: u32,
    /// Reconnection interval, already clamped to the configured bounds
    pub reconnect_interval_secs: u32,
    pub user_agent: String,
}

/// Events emitted by the signaling transport, in transport order
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The socket connected
    Connected,
    /// The socket disconnected. `ignore_reconnection` flags intentional
    /// teardown; no failover is attempted for those.
    Disconnected {
        code: u16,
        reason: String,
        socket_url: String,
        ignore_reconnection: bool,
    },
    /// Registration succeeded
    Registered { headers: ResponseHeaders },
    /// Registration was removed
    Unregistered,
    /// Registration failed
    RegistrationFailed {
        cause: String,
        status_code: Option<u16>,
        headers: ResponseHeaders,
    },
    /// A SIP transaction was observed. Used only to attach the call
    /// identifier to the logging context ahead of admission.
    NewTransaction { call_id: String, method: String },
    /// A new RTC session was offered (either direction)
    NewRtcSession { offer: SessionOffer },
}

/// Sender half used by transports to deliver events to the dispatch pump
pub type TransportEventSender = mpsc::Sender<TransportEvent>;

/// Command surface of a live signaling connection
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Open the connection and begin registration
    async fn start(&self) -> ClientResult<()>;

    /// Close the connection. The transport reports the closure through a
    /// `Disconnected` event flagged with `ignore_reconnection`.
    async fn stop(&self) -> ClientResult<()>;

    /// Swap the underlying socket on the existing user agent, used for
    /// endpoint failover after an unexpected disconnect
    async fn create_new_transport(&self, config: TransportConfig) -> ClientResult<()>;

    /// Send one keep-alive probe
    async fn send_keepalive(&self) -> ClientResult<()>;
}

/// Constructs signaling transports for login attempts
///
/// Construction failures surface as
/// [`ClientError::TransportCreationFailed`](crate::error::ClientError) and
/// are never retried automatically.
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        config: TransportConfig,
        events: TransportEventSender,
    ) -> ClientResult<Arc<dyn SignalingTransport>>;
}
