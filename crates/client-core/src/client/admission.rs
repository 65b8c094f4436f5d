//! Session admission control
//!
//! Decides whether a newly signaled call may proceed. The checks run in a
//! fixed order: stats channel first (diagnostics exist for every offered
//! call), then stale-primary self-heal, then lazy purge of ended invites,
//! then the concurrency invariants. Inadmissible inbound calls are answered
//! with SIP 486 "Busy Here" and no session object is constructed.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ClientResult;
use crate::events::{ClientEvent, EventSink};
use crate::session::{
    CallRegistry, CallSession, SessionFactory, SessionOffer, SIP_BUSY_HERE, SIP_BUSY_HERE_REASON,
};
use crate::telemetry::TelemetryApi;

pub(crate) struct AdmissionController {
    registry: Arc<CallRegistry>,
    sessions: Arc<dyn SessionFactory>,
    telemetry: Arc<dyn TelemetryApi>,
    events: EventSink,
    allow_multiplexing: bool,
    max_pending_invites: usize,
}

impl AdmissionController {
    pub(crate) fn new(
        registry: Arc<CallRegistry>,
        sessions: Arc<dyn SessionFactory>,
        telemetry: Arc<dyn TelemetryApi>,
        events: EventSink,
        allow_multiplexing: bool,
        max_pending_invites: usize,
    ) -> Self {
        Self {
            registry,
            sessions,
            telemetry,
            events,
            allow_multiplexing,
            max_pending_invites,
        }
    }

    /// Run admission for one offered call
    ///
    /// Returns the constructed session for admitted offers, `None` for
    /// rejected ones. Rejection is not an error; factory failures are.
    pub(crate) async fn admit(
        &self,
        offer: SessionOffer,
    ) -> ClientResult<Option<Arc<dyn CallSession>>> {
        let call_id = offer.call_id().clone();

        // Diagnostics channel is attached before any decision is made
        match self.telemetry.open_stats_channel(&call_id).await {
            Ok(channel) => self.registry.attach_stats(&call_id, channel),
            Err(e) => debug!(call_id = %call_id, error = %e, "stats channel unavailable for offered call"),
        }

        self.registry.drop_stale_primary().await;
        self.registry.purge_ended_invites();

        if let Some(denial) = self.check_invariants(&offer).await {
            info!(call_id = %call_id, reason = %denial, "rejecting offered call");
            if let SessionOffer::Inbound { invite } = &offer {
                if let Err(e) = invite.reject(SIP_BUSY_HERE, SIP_BUSY_HERE_REASON).await {
                    warn!(call_id = %call_id, error = %e, "failed to send busy rejection");
                }
            }
            self.registry.detach_stats(&call_id);
            return Ok(None);
        }

        let session = match offer {
            SessionOffer::Inbound { invite } => {
                invite.normalize_media_description();
                self.registry.insert_pending(invite.clone());
                let caller = invite.caller().to_string();
                let session = match self.sessions.create_inbound(invite).await {
                    Ok(session) => session,
                    Err(e) => {
                        self.registry.remove_pending(&call_id);
                        return Err(e);
                    }
                };
                self.events
                    .emit(ClientEvent::IncomingCall { call_id: call_id.clone(), caller })
                    .await;
                session
            }
            SessionOffer::Outbound { call_id, target } => {
                let session = self.sessions.create_outbound(call_id, target).await?;
                self.registry.set_primary(session.clone()).await;
                session
            }
        };

        if let Some(stats) = self.registry.stats_channel(&call_id) {
            stats.mark_media_setup_start();
        }
        Ok(Some(session))
    }

    /// Returns a denial reason when the offer violates the current-call or
    /// concurrency invariants
    async fn check_invariants(&self, offer: &SessionOffer) -> Option<&'static str> {
        let has_primary = self.registry.has_primary().await;

        match offer {
            SessionOffer::Inbound { .. } => {
                if has_primary && !self.allow_multiplexing {
                    return Some("call in progress and multiplexing disabled");
                }
                if self.registry.pending_count() >= self.max_pending_invites {
                    return Some("pending invite ceiling reached");
                }
                None
            }
            // 486 is inbound wire behavior; an outbound offer is simply
            // declined while a primary session exists
            SessionOffer::Outbound { .. } => {
                has_primary.then_some("outbound call already in progress")
            }
        }
    }
}
