//! Call session interface and the active-call registry
//!
//! Session objects (media negotiation, DTMF, hold, and the rest of the
//! in-call surface) live downstream of this crate; the lifecycle layer
//! consumes them through [`CallSession`] and [`IncomingInvite`] and
//! constructs them through [`SessionFactory`]. The [`CallRegistry`] holds at
//! most one primary session plus the pending inbound invites, and is mutated
//! only by the admission controller under the manager's orchestration.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ClientResult;
use crate::telemetry::StatsChannel;

/// SIP status used when rejecting an inadmissible inbound call
pub const SIP_BUSY_HERE: u16 = 486;
/// Reason phrase paired with [`SIP_BUSY_HERE`]
pub const SIP_BUSY_HERE_REASON: &str = "Busy Here";

/// Call identifier, taken from the SIP Call-ID of the dialog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Direction of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Signaling state of the media connection backing a session
///
/// `Closed` is terminal; a primary session observed in this state is stale
/// and gets dropped by the admission controller's self-heal pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// An established (or establishing) call session
#[async_trait]
pub trait CallSession: Send + Sync {
    fn call_id(&self) -> &CallId;

    fn direction(&self) -> CallDirection;

    fn signaling_state(&self) -> SignalingState;

    /// Whether the local party has muted the call
    fn is_muted(&self) -> bool;

    /// Re-send the session's SIP re-INVITE, optionally requesting an ICE
    /// restart, to recover media after a transport swap
    async fn renegotiate(&self, ice_restart: bool) -> ClientResult<()>;
}

/// A not-yet-answered inbound INVITE
#[async_trait]
pub trait IncomingInvite: Send + Sync {
    fn call_id(&self) -> &CallId;

    /// Caller identity from the INVITE
    fn caller(&self) -> &str;

    /// Whether the underlying signaling session already ended (canceled or
    /// timed out before a decision was made)
    fn is_ended(&self) -> bool;

    /// Apply the media-description attribute fix-up before the session
    /// object is constructed from this invite
    fn normalize_media_description(&self);

    /// Answer the INVITE with a final failure response
    async fn reject(&self, status: u16, reason: &str) -> ClientResult<()>;
}

/// A newly signaled call, before admission
#[derive(Clone)]
pub enum SessionOffer {
    Inbound { invite: Arc<dyn IncomingInvite> },
    Outbound { call_id: CallId, target: String },
}

impl SessionOffer {
    pub fn call_id(&self) -> &CallId {
        match self {
            SessionOffer::Inbound { invite } => invite.call_id(),
            SessionOffer::Outbound { call_id, .. } => call_id,
        }
    }

    pub fn direction(&self) -> CallDirection {
        match self {
            SessionOffer::Inbound { .. } => CallDirection::Inbound,
            SessionOffer::Outbound { .. } => CallDirection::Outbound,
        }
    }
}

impl std::fmt::Debug for SessionOffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOffer::Inbound { invite } => f
                .debug_struct("Inbound")
                .field("call_id", invite.call_id())
                .field("caller", &invite.caller())
                .finish(),
            SessionOffer::Outbound { call_id, target } => f
                .debug_struct("Outbound")
                .field("call_id", call_id)
                .field("target", target)
                .finish(),
        }
    }
}

/// Constructs downstream session objects for admitted calls
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_inbound(
        &self,
        invite: Arc<dyn IncomingInvite>,
    ) -> ClientResult<Arc<dyn CallSession>>;

    async fn create_outbound(
        &self,
        call_id: CallId,
        target: String,
    ) -> ClientResult<Arc<dyn CallSession>>;
}

/// The active-call set: one primary session plus pending inbound invites
///
/// Per-call stats channels are tracked alongside so that teardown paths can
/// release them without reaching into the telemetry layer.
#[derive(Default)]
pub struct CallRegistry {
    primary: RwLock<Option<Arc<dyn CallSession>>>,
    pending: DashMap<CallId, Arc<dyn IncomingInvite>>,
    stats: DashMap<CallId, Arc<dyn StatsChannel>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn primary(&self) -> Option<Arc<dyn CallSession>> {
        self.primary.read().await.clone()
    }

    pub async fn has_primary(&self) -> bool {
        self.primary.read().await.is_some()
    }

    pub async fn set_primary(&self, session: Arc<dyn CallSession>) {
        *self.primary.write().await = Some(session);
    }

    pub async fn clear_primary(&self) -> Option<Arc<dyn CallSession>> {
        self.primary.write().await.take()
    }

    /// Drop the primary reference if its media connection already reached a
    /// terminal signaling state, along with its call identifiers. Self-heals
    /// from an incomplete teardown; returns whether anything was dropped.
    pub async fn drop_stale_primary(&self) -> bool {
        let mut guard = self.primary.write().await;
        let stale = guard
            .as_ref()
            .filter(|session| session.signaling_state() == SignalingState::Closed)
            .map(|session| session.call_id().clone());

        if let Some(call_id) = stale {
            warn!(call_id = %call_id, "dropping stale primary session left by incomplete teardown");
            *guard = None;
            self.pending.remove(&call_id);
            self.stats.remove(&call_id);
            true
        } else {
            false
        }
    }

    /// Remove pending invites whose underlying signaling session has ended
    pub fn purge_ended_invites(&self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, invite| !invite.is_ended());
        let purged = before.saturating_sub(self.pending.len());
        if purged > 0 {
            debug!(purged, "purged ended pending invites");
        }
        purged
    }

    pub fn insert_pending(&self, invite: Arc<dyn IncomingInvite>) {
        self.pending.insert(invite.call_id().clone(), invite);
    }

    pub fn remove_pending(&self, call_id: &CallId) -> Option<Arc<dyn IncomingInvite>> {
        self.pending.remove(call_id).map(|(_, invite)| invite)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn attach_stats(&self, call_id: &CallId, channel: Arc<dyn StatsChannel>) {
        self.stats.insert(call_id.clone(), channel);
    }

    pub fn stats_channel(&self, call_id: &CallId) -> Option<Arc<dyn StatsChannel>> {
        self.stats.get(call_id).map(|entry| entry.value().clone())
    }

    pub fn detach_stats(&self, call_id: &CallId) -> Option<Arc<dyn StatsChannel>> {
        self.stats.remove(call_id).map(|(_, channel)| channel)
    }

    /// Drop every session, invite and stats channel. Used by logout cleanup
    /// and destroy.
    pub async fn clear(&self) {
        *self.primary.write().await = None;
        self.pending.clear();
        self.stats.clear();
    }
}
