//! Telemetry collaborators
//!
//! Call-quality reporting rides on two external services consumed through
//! the traits here: an HTTP API that issues insights keys and resolves the
//! public address, and a per-call stats channel for quality samples. Both
//! are best effort; their failures degrade silently and never reach the
//! host (see the error taxonomy in [`crate::error`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ClientResult;
use crate::session::CallId;

/// Grant returned by the insights service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsGrant {
    /// Key attached to call-quality reports
    pub key: String,
    /// Whether RTP-level stats collection is enabled for this account
    pub rtp_enabled: bool,
}

/// HTTP-backed telemetry service surface
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// Resolve the client's current public network address
    async fn resolve_public_address(&self) -> ClientResult<String>;

    /// Fetch the insights key and RTP flag for the logged-in identity
    async fn fetch_insights_key(
        &self,
        identity: &str,
        secret: &str,
        is_token: bool,
    ) -> ClientResult<InsightsGrant>;

    /// Open a quality-telemetry channel for one call
    async fn open_stats_channel(&self, call_id: &CallId) -> ClientResult<Arc<dyn StatsChannel>>;
}

/// Per-call quality-telemetry channel
#[async_trait]
pub trait StatsChannel: Send + Sync {
    /// Record the start of media setup for timing telemetry
    fn mark_media_setup_start(&self);

    /// Close the channel and flush whatever was buffered
    async fn close(&self);
}
