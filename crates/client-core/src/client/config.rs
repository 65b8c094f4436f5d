//! Client configuration
//!
//! # Examples
//!
//! ```rust
//! use ringwave_client_core::client::config::ClientConfig;
//!
//! let config = ClientConfig::new("phone.example.com")
//!     .with_endpoints(vec![
//!         "wss://edge0.example.com/ws".to_string(),
//!         "wss://edge1.example.com/ws".to_string(),
//!     ])
//!     .with_user_agent("RingwaveWeb/2.3".to_string())
//!     .with_multiplexing(true)
//!     .with_max_pending_invites(4);
//!
//! assert_eq!(config.domain, "phone.example.com");
//! assert!(config.allow_multiplexing);
//! assert_eq!(config.max_pending_invites, 4);
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::types::EndpointRing;
use crate::error::{ClientError, ClientResult};

/// Lower bound for the transport reconnection interval
pub const MIN_RECONNECT_INTERVAL_SECS: u32 = 2;
/// Upper bound for the transport reconnection interval
pub const MAX_RECONNECT_INTERVAL_SECS: u32 = 30;

/// Default registration refresh interval
pub const DEFAULT_REGISTRATION_REFRESH_SECS: u32 = 300;

/// Configuration for the connection lifecycle layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ordered signaling endpoints; failover rotates through them
    pub endpoints: Vec<String>,
    /// SIP domain used to build the registration URI
    pub domain: String,
    pub user_agent: String,
    /// Whether concurrent call sessions are allowed at all
    pub allow_multiplexing: bool,
    /// Ceiling on simultaneously pending inbound invites
    pub max_pending_invites: usize,
    pub registration_refresh_secs: u32,
    /// Requested reconnection interval; clamped to the module bounds when
    /// transport configs are built
    pub reconnect_interval_secs: u32,
    /// Keep-alive period while no call is active
    pub keepalive_idle_secs: u64,
    /// Keep-alive period while a call is active
    pub keepalive_in_call_secs: u64,
    /// Retry ceiling for public-address resolution
    pub ip_retry_limit: u32,
    /// Broadcast buffer for host-facing events
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            domain: String::new(),
            user_agent: "ringwave-client".to_string(),
            allow_multiplexing: false,
            max_pending_invites: 2,
            registration_refresh_secs: DEFAULT_REGISTRATION_REFRESH_SECS,
            reconnect_interval_secs: 10,
            keepalive_idle_secs: 60,
            keepalive_in_call_secs: 20,
            ip_retry_limit: 5,
            event_buffer: 64,
        }
    }
}

impl ClientConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_multiplexing(mut self, allow: bool) -> Self {
        self.allow_multiplexing = allow;
        self
    }

    pub fn with_max_pending_invites(mut self, ceiling: usize) -> Self {
        self.max_pending_invites = ceiling;
        self
    }

    pub fn with_registration_refresh(mut self, secs: u32) -> Self {
        self.registration_refresh_secs = secs;
        self
    }

    pub fn with_reconnect_interval(mut self, secs: u32) -> Self {
        self.reconnect_interval_secs = secs;
        self
    }

    pub fn with_keepalive_intervals(mut self, idle_secs: u64, in_call_secs: u64) -> Self {
        self.keepalive_idle_secs = idle_secs;
        self.keepalive_in_call_secs = in_call_secs;
        self
    }

    pub fn with_ip_retry_limit(mut self, limit: u32) -> Self {
        self.ip_retry_limit = limit;
        self
    }

    /// Parse a configuration from its JSON representation, as handed over
    /// by embedding hosts
    pub fn from_json(raw: &str) -> ClientResult<Self> {
        serde_json::from_str(raw).map_err(|e| ClientError::InvalidConfiguration {
            field: "config".into(),
            reason: e.to_string(),
        })
    }

    /// Reconnection interval clamped to the supported bounds
    pub fn clamped_reconnect_interval(&self) -> u32 {
        self.reconnect_interval_secs
            .clamp(MIN_RECONNECT_INTERVAL_SECS, MAX_RECONNECT_INTERVAL_SECS)
    }

    /// Parse and validate the endpoint list into a rotating ring
    pub fn endpoint_ring(&self) -> ClientResult<EndpointRing> {
        let mut parsed = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let url = Url::parse(endpoint).map_err(|e| ClientError::InvalidConfiguration {
                field: "endpoints".into(),
                reason: format!("{endpoint}: {e}"),
            })?;
            parsed.push(url);
        }
        EndpointRing::new(parsed)
    }
}
