//! Core state types for the connection lifecycle
//!
//! Everything here is owned exclusively by the [`ConnectionManager`]; the
//! host observes these values through events and accessor methods.
//!
//! [`ConnectionManager`]: crate::client::manager::ConnectionManager

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use url::Url;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Connection state of the signaling layer
///
/// Transitions only occur in response to transport or registration events,
/// and every transition is emitted to the host as
/// [`ClientEvent::ConnectionChanged`](crate::events::ClientEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Registered and reachable for calls
    Connected,
    /// No usable signaling connection
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Connection state paired with the free-text reason for the last transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reason: String,
}

impl ConnectionStatus {
    pub fn connected(reason: impl Into<String>) -> Self {
        Self { state: ConnectionState::Connected, reason: reason.into() }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self { state: ConnectionState::Disconnected, reason: reason.into() }
    }
}

/// Account credentials for a login attempt
///
/// Exactly one variant is active per attempt. Access-token mode additionally
/// tracks a token-expiry epoch parsed from the registration response (see
/// [`parse_token_expiry_ms`](crate::transport::parse_token_expiry_ms)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Credentials {
    /// Username/password digest authentication
    Password { username: String, password: String },
    /// Signed access token carried in a registrar header
    AccessToken { token: String },
}

impl Credentials {
    /// Validate that the active variant is usable for a login attempt
    pub fn validate(&self) -> ClientResult<()> {
        match self {
            Credentials::Password { username, password } => {
                if username.is_empty() || password.is_empty() {
                    return Err(ClientError::login_rejected("username and password must not be empty"));
                }
            }
            Credentials::AccessToken { token } => {
                if token.is_empty() {
                    return Err(ClientError::login_rejected("access token must not be empty"));
                }
            }
        }
        Ok(())
    }

    /// Whether this is access-token mode
    pub fn is_token(&self) -> bool {
        matches!(self, Credentials::AccessToken { .. })
    }

    /// The identity string used when fetching telemetry grants
    pub fn identity(&self) -> &str {
        match self {
            Credentials::Password { username, .. } => username,
            Credentials::AccessToken { token } => token,
        }
    }

    /// The secret string used when fetching telemetry grants
    pub fn secret(&self) -> &str {
        match self {
            Credentials::Password { password, .. } => password,
            Credentials::AccessToken { token } => token,
        }
    }
}

/// Phase of the login state machine
///
/// `AwaitingOldTeardown` makes the "a fresh login supersedes the previous
/// transport" behavior an explicit transition: the queued [`PendingLogin`]
/// runs exactly once when the old transport reports disconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Idle,
    LoggingIn,
    AwaitingOldTeardown,
}

/// Single-slot continuation for a login deferred behind an old transport's
/// teardown. A newer login overwrites the slot and supersedes the older one.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub credentials: Credentials,
    pub refresh_interval_secs: Option<u32>,
    pub attempt: Uuid,
}

/// Ordered signaling endpoint list with a rotating cursor
///
/// On each disconnect-triggered reconnect the cursor advances by one
/// (wrapping), so consecutive failures walk the configured endpoints.
#[derive(Debug, Clone)]
pub struct EndpointRing {
    endpoints: Vec<Url>,
    cursor: usize,
}

impl EndpointRing {
    pub fn new(endpoints: Vec<Url>) -> ClientResult<Self> {
        if endpoints.is_empty() {
            return Err(ClientError::MissingConfiguration { field: "endpoints".into() });
        }
        Ok(Self { endpoints, cursor: 0 })
    }

    pub fn current(&self) -> &Url {
        &self.endpoints[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Advance the cursor by one with wraparound and return the new endpoint
    pub fn advance(&mut self) -> &Url {
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        &self.endpoints[self.cursor]
    }
}

/// Snapshot of the network the client last observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSnapshot {
    pub network_type: String,
    /// Public address, empty when resolution failed
    pub address: String,
}

/// Retry bookkeeping shared between the manager and the network reporter
///
/// `ip_retry_count` is bounded and reset on success or at the ceiling;
/// `reinvite_attempts` only ever grows and exists for diagnostics.
#[derive(Debug, Default)]
pub struct RetryState {
    ip_retry_count: AtomicU32,
    reinvite_attempts: AtomicU64,
}

impl RetryState {
    pub fn ip_retry_count(&self) -> u32 {
        self.ip_retry_count.load(Ordering::SeqCst)
    }

    pub fn set_ip_retry_count(&self, value: u32) {
        self.ip_retry_count.store(value, Ordering::SeqCst);
    }

    pub fn reset_ip_retries(&self) {
        self.ip_retry_count.store(0, Ordering::SeqCst);
    }

    pub fn reinvite_attempts(&self) -> u64 {
        self.reinvite_attempts.load(Ordering::SeqCst)
    }

    pub fn record_reinvite(&self) -> u64 {
        self.reinvite_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(urls: &[&str]) -> EndpointRing {
        EndpointRing::new(urls.iter().map(|u| Url::parse(u).unwrap()).collect()).unwrap()
    }

    #[test]
    fn cursor_advances_with_wraparound() {
        let mut ring = ring(&[
            "wss://edge0.example.com/ws",
            "wss://edge1.example.com/ws",
            "wss://edge2.example.com/ws",
        ]);
        assert_eq!(ring.cursor(), 0);

        ring.advance();
        assert_eq!(ring.cursor(), 1);
        ring.advance();
        assert_eq!(ring.cursor(), 2);
        ring.advance();
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.current().host_str(), Some("edge0.example.com"));
    }

    #[test]
    fn empty_endpoint_list_is_rejected() {
        assert!(EndpointRing::new(Vec::new()).is_err());
    }

    #[test]
    fn credentials_validation() {
        assert!(Credentials::Password { username: "alice".into(), password: "s3cret".into() }
            .validate()
            .is_ok());
        assert!(Credentials::Password { username: "".into(), password: "s3cret".into() }
            .validate()
            .is_err());
        assert!(Credentials::AccessToken { token: "".into() }.validate().is_err());

        let token = Credentials::AccessToken { token: "jwt".into() };
        assert!(token.is_token());
        assert_eq!(token.identity(), "jwt");
    }

    #[test]
    fn reinvite_counter_is_monotonic() {
        let retry = RetryState::default();
        assert_eq!(retry.record_reinvite(), 1);
        assert_eq!(retry.record_reinvite(), 2);
        retry.reset_ip_retries();
        assert_eq!(retry.reinvite_attempts(), 2);
    }
}
