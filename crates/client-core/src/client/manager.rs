//! Connection lifecycle manager
//!
//! [`ConnectionManager`] owns exactly one logical signaling connection to
//! the telephony backend: it drives login and registration, rotates through
//! the configured endpoint list on failure, recovers in-progress calls after
//! a transport swap, and keeps the host informed through
//! [`ClientEvent`](crate::events::ClientEvent) notifications.
//!
//! All shared state lives behind the manager's own locks and is mutated only
//! from the dispatch pump and the public command methods. Handlers take the
//! state lock briefly, decide, and release it before any collaborator call
//! or event emission, so host callbacks can safely re-enter the manager.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::admission::AdmissionController;
use crate::client::config::ClientConfig;
use crate::client::dispatch;
use crate::client::network::NetworkChangeReporter;
use crate::client::types::{
    ConnectionState, ConnectionStatus, Credentials, EndpointRing, LoginPhase, NetworkSnapshot,
    PendingLogin, RetryState,
};
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, ClientEventHandler, EventSink};
use crate::hooks::{AudioHooks, PlatformHooks};
use crate::session::{CallId, CallRegistry, SessionFactory, SessionOffer};
use crate::telemetry::{InsightsGrant, TelemetryApi};
use crate::transport::{
    parse_token_expiry_ms, ResponseHeaders, SignalingTransport, TransportConfig, TransportEvent,
    TransportFactory, JWT_HEADER,
};

/// Mutable lifecycle state, guarded by a single lock
struct Inner {
    connection: ConnectionStatus,
    login_phase: LoginPhase,
    pending_login: Option<PendingLogin>,
    credentials: Option<Credentials>,
    registration_refresh_secs: u32,
    token_expiry_ms: Option<u64>,
    logged_in: bool,
    /// A fresh login is in flight and has not yet seen its first
    /// registration. Distinguishes fresh-login registrations from
    /// network-change registrations.
    fresh_login_pending: bool,
    first_connect_done: bool,
    explicit_logout: bool,
    endpoints: EndpointRing,
    insights: Option<InsightsGrant>,
    /// Identifier of the current login attempt; asynchronous continuations
    /// compare against it before committing results
    attempt: Option<Uuid>,
    disconnected_at: Option<DateTime<Utc>>,
    /// Call id attached to the logging context by the dispatch layer
    log_call_id: Option<CallId>,
}

/// Owns the signaling connection, registration lifecycle, endpoint
/// failover, call admission and network-change telemetry
pub struct ConnectionManager {
    config: ClientConfig,
    transports: Arc<dyn TransportFactory>,
    telemetry: Arc<dyn TelemetryApi>,
    audio: Arc<dyn AudioHooks>,
    platform: Arc<dyn PlatformHooks>,
    events: EventSink,
    registry: Arc<CallRegistry>,
    admission: AdmissionController,
    state: Mutex<Inner>,
    transport: RwLock<Option<Arc<dyn SignalingTransport>>>,
    transport_tx: mpsc::Sender<TransportEvent>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    reconnect_check: Mutex<Option<JoinHandle<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    net_generation: Arc<AtomicU64>,
    retry: Arc<RetryState>,
    network: Arc<RwLock<NetworkSnapshot>>,
    reporter: Arc<NetworkChangeReporter>,
}

impl ConnectionManager {
    pub(crate) async fn new(
        config: ClientConfig,
        transports: Arc<dyn TransportFactory>,
        sessions: Arc<dyn SessionFactory>,
        telemetry: Arc<dyn TelemetryApi>,
        audio: Arc<dyn AudioHooks>,
        platform: Arc<dyn PlatformHooks>,
    ) -> ClientResult<Arc<Self>> {
        let endpoints = config.endpoint_ring()?;
        let events = EventSink::new(config.event_buffer);
        let registry = Arc::new(CallRegistry::new());
        let retry = Arc::new(RetryState::default());
        let net_generation = Arc::new(AtomicU64::new(0));
        let network = Arc::new(RwLock::new(NetworkSnapshot::default()));
        let (transport_tx, transport_rx) = mpsc::channel(64);

        let reporter = Arc::new(NetworkChangeReporter::new(
            telemetry.clone(),
            platform.clone(),
            events.clone(),
            net_generation.clone(),
            retry.clone(),
            config.ip_retry_limit,
            network.clone(),
        ));
        let admission = AdmissionController::new(
            registry.clone(),
            sessions,
            telemetry.clone(),
            events.clone(),
            config.allow_multiplexing,
            config.max_pending_invites,
        );

        let manager = Arc::new(Self {
            state: Mutex::new(Inner {
                connection: ConnectionStatus::disconnected("not connected"),
                login_phase: LoginPhase::Idle,
                pending_login: None,
                credentials: None,
                registration_refresh_secs: config.registration_refresh_secs,
                token_expiry_ms: None,
                logged_in: false,
                fresh_login_pending: false,
                first_connect_done: false,
                explicit_logout: false,
                endpoints,
                insights: None,
                attempt: None,
                disconnected_at: None,
                log_call_id: None,
            }),
            config,
            transports,
            telemetry,
            audio,
            platform,
            events,
            registry,
            admission,
            transport: RwLock::new(None),
            transport_tx,
            keepalive: Mutex::new(None),
            reconnect_check: Mutex::new(None),
            pump: Mutex::new(None),
            net_generation,
            retry,
            network,
            reporter,
        });

        let pump = dispatch::spawn_event_pump(manager.clone(), transport_rx);
        *manager.pump.lock().await = Some(pump);
        Ok(manager)
    }

    // ========== public command surface ==========

    /// Attempt to log in with the given credentials
    ///
    /// Returns whether the attempt was accepted. Every rejection and
    /// failure reaches the host as [`ClientEvent::LoginFailed`]; success is
    /// signaled by [`ClientEvent::LoggedIn`] once the first registration
    /// completes. If a previous transport is still up, the attempt is
    /// queued and runs exactly once after that transport's teardown.
    pub async fn login(
        self: &Arc<Self>,
        credentials: Credentials,
        refresh_interval_secs: Option<u32>,
    ) -> bool {
        if let Err(e) = credentials.validate() {
            return self.reject_login(e).await;
        }
        if self.registry.has_primary().await {
            return self
                .reject_login(ClientError::login_rejected("a call is already in progress"))
                .await;
        }
        if !self.platform.is_online() {
            return self
                .reject_login(ClientError::login_rejected("network connectivity unavailable"))
                .await;
        }

        let existing = self.transport.read().await.clone();
        if let Some(old) = existing {
            let pending = PendingLogin {
                credentials,
                refresh_interval_secs,
                attempt: Uuid::new_v4(),
            };
            {
                let mut state = self.state.lock().await;
                if state.pending_login.is_some() {
                    debug!("superseding previously queued login");
                }
                state.pending_login = Some(pending);
                state.login_phase = LoginPhase::AwaitingOldTeardown;
            }
            info!("deferring login until the old transport reports disconnection");
            if let Err(e) = old.stop().await {
                warn!(error = %e, "failed to stop old transport");
            }
            return true;
        }

        self.start_fresh_login(credentials, refresh_interval_secs).await
    }

    /// Explicitly log out. Returns whether a logout was initiated.
    pub async fn logout(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            if !state.logged_in {
                debug!("logout requested while not logged in");
                return false;
            }
            state.explicit_logout = true;
        }
        let transport = self.transport.read().await.clone();
        if let Some(transport) = transport {
            if let Err(e) = transport.stop().await {
                warn!(error = %e, "transport stop failed during logout");
            }
        }
        true
    }

    /// Tear everything down: timers, pump, transport, call registry
    pub async fn destroy(&self) {
        info!("destroying connection manager");
        self.cancel_keepalive().await;
        self.cancel_reconnect_check().await;
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        let transport = self.transport.write().await.take();
        if let Some(transport) = transport {
            let _ = transport.stop().await;
        }
        self.registry.clear().await;
        let mut state = self.state.lock().await;
        state.login_phase = LoginPhase::Idle;
        state.pending_login = None;
        state.logged_in = false;
        state.fresh_login_pending = false;
        state.credentials = None;
    }

    // ========== observers ==========

    /// Subscribe to lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Register (or replace) the callback-style event handler
    pub async fn set_event_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        self.events.set_handler(handler).await;
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.state.lock().await.connection.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.lock().await.logged_in
    }

    /// Current endpoint cursor position (diagnostics)
    pub async fn endpoint_cursor(&self) -> usize {
        self.state.lock().await.endpoints.cursor()
    }

    /// Access-token expiry in milliseconds since the epoch, when known
    pub async fn token_expiry_ms(&self) -> Option<u64> {
        self.state.lock().await.token_expiry_ms
    }

    /// Cached insights grant, cleared whenever a fetch fails
    pub async fn insights_grant(&self) -> Option<InsightsGrant> {
        self.state.lock().await.insights.clone()
    }

    pub async fn network_snapshot(&self) -> NetworkSnapshot {
        self.network.read().await.clone()
    }

    pub fn ip_retry_count(&self) -> u32 {
        self.retry.ip_retry_count()
    }

    pub fn reinvite_attempts(&self) -> u64 {
        self.retry.reinvite_attempts()
    }

    pub async fn keepalive_running(&self) -> bool {
        self.keepalive
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Timestamp of the last explicit logout
    pub async fn last_disconnect(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.disconnected_at
    }

    /// Call id most recently attached to the logging context
    pub async fn current_call_context(&self) -> Option<CallId> {
        self.state.lock().await.log_call_id.clone()
    }

    /// The active-call registry
    pub fn calls(&self) -> Arc<CallRegistry> {
        self.registry.clone()
    }

    // ========== login internals ==========

    async fn reject_login(&self, error: ClientError) -> bool {
        let reason = match &error {
            ClientError::LoginRejected { reason } => reason.clone(),
            other => other.to_string(),
        };
        warn!(reason = %reason, "login rejected");
        self.events.emit(ClientEvent::LoginFailed { reason }).await;
        false
    }

    async fn start_fresh_login(
        self: &Arc<Self>,
        credentials: Credentials,
        refresh_interval_secs: Option<u32>,
    ) -> bool {
        let attempt = Uuid::new_v4();
        let config = {
            let mut state = self.state.lock().await;
            state.login_phase = LoginPhase::LoggingIn;
            state.credentials = Some(credentials.clone());
            state.registration_refresh_secs =
                refresh_interval_secs.unwrap_or(self.config.registration_refresh_secs);
            state.fresh_login_pending = true;
            state.first_connect_done = false;
            state.token_expiry_ms = None;
            state.explicit_logout = false;
            state.attempt = Some(attempt);
            let refresh = state.registration_refresh_secs;
            let endpoint = state.endpoints.current().clone();
            self.transport_config(&credentials, refresh, endpoint.as_str())
        };

        info!(attempt = %attempt, endpoint = %config.socket_url, "starting login");
        let transport = match self.transports.create(config, self.transport_tx.clone()) {
            Ok(transport) => transport,
            Err(e) => {
                error!(error = %e, "transport creation failed");
                self.abandon_login().await;
                self.events
                    .emit(ClientEvent::LoginFailed { reason: e.to_string() })
                    .await;
                return false;
            }
        };
        *self.transport.write().await = Some(transport.clone());

        if let Err(e) = transport.start().await {
            error!(error = %e, "transport failed to start");
            *self.transport.write().await = None;
            self.abandon_login().await;
            self.events
                .emit(ClientEvent::LoginFailed { reason: e.to_string() })
                .await;
            return false;
        }
        true
    }

    async fn abandon_login(&self) {
        let mut state = self.state.lock().await;
        state.login_phase = LoginPhase::Idle;
        state.fresh_login_pending = false;
        state.credentials = None;
        state.attempt = None;
    }

    fn transport_config(
        &self,
        credentials: &Credentials,
        refresh_secs: u32,
        endpoint: &str,
    ) -> TransportConfig {
        let (register_uri, extra_headers) = match credentials {
            Credentials::Password { username, .. } => {
                (format!("{}@{}", username, self.config.domain), Vec::new())
            }
            // Identity is asserted by the token header and resolved by the
            // registrar; the register URI carries only the domain.
            Credentials::AccessToken { token } => (
                self.config.domain.clone(),
                vec![(JWT_HEADER.to_string(), token.clone())],
            ),
        };
        TransportConfig {
            socket_url: endpoint.to_string(),
            register_uri,
            credentials: credentials.clone(),
            extra_headers,
            registration_refresh_secs: refresh_secs,
            reconnect_interval_secs: self.config.clamped_reconnect_interval(),
            user_agent: self.config.user_agent.clone(),
        }
    }

    // ========== transport event handlers (called from dispatch) ==========

    pub(crate) async fn on_connected(self: &Arc<Self>) {
        self.cancel_reconnect_check().await;
        let first = {
            let mut state = self.state.lock().await;
            let first = !state.first_connect_done;
            state.first_connect_done = true;
            first
        };
        info!(first_connection = first, "signaling transport connected");
        if first {
            let generation = self.net_generation.load(Ordering::SeqCst);
            let reporter = self.reporter.clone();
            tokio::spawn(async move {
                reporter.snapshot_first_connect(generation).await;
            });
        }
    }

    pub(crate) async fn on_disconnected(
        self: &Arc<Self>,
        code: u16,
        reason: String,
        socket_url: String,
        ignore_reconnection: bool,
    ) {
        warn!(
            code,
            reason = %reason,
            socket_url = %socket_url,
            ignore_reconnection,
            "signaling transport disconnected"
        );
        let status = ConnectionStatus::disconnected(code.to_string());
        let pending = {
            let mut state = self.state.lock().await;
            state.connection = status.clone();
            state.pending_login.take()
        };
        self.events.emit(ClientEvent::ConnectionChanged { status }).await;

        if let Some(login) = pending {
            info!(attempt = %login.attempt, "running deferred login after old transport teardown");
            *self.transport.write().await = None;
            self.start_fresh_login(login.credentials, login.refresh_interval_secs)
                .await;
            return;
        }
        if ignore_reconnection {
            return;
        }
        self.rotate_and_restart().await;
        self.arm_reconnect_check().await;
    }

    /// Advance the endpoint cursor, swap the socket on the existing user
    /// agent, restart it, and recover the active call's media
    async fn rotate_and_restart(self: &Arc<Self>) {
        let rebuilt = {
            let mut state = self.state.lock().await;
            state.endpoints.advance();
            let cursor = state.endpoints.cursor();
            let endpoint = state.endpoints.current().clone();
            match state.credentials.clone() {
                Some(credentials) => {
                    let refresh = state.registration_refresh_secs;
                    Some((
                        self.transport_config(&credentials, refresh, endpoint.as_str()),
                        cursor,
                    ))
                }
                None => None,
            }
        };
        let Some((config, cursor)) = rebuilt else {
            debug!("no stored credentials, skipping reconnection");
            return;
        };

        info!(endpoint = %config.socket_url, cursor, "rotating signaling endpoint for reconnection");
        let transport = self.transport.read().await.clone();
        let Some(transport) = transport else {
            debug!("no transport to restart");
            return;
        };
        if let Err(e) = transport.create_new_transport(config).await {
            warn!(error = %e, "failed to swap transport socket");
            return;
        }
        if let Err(e) = transport.start().await {
            warn!(error = %e, "failed to restart transport");
            return;
        }

        // Fire-and-forget re-INVITE with ICE restart for the active call
        if let Some(primary) = self.registry.primary().await {
            let attempts = self.retry.record_reinvite();
            debug!(call_id = %primary.call_id(), attempts, "re-sending re-INVITE with ICE restart");
            tokio::spawn(async move {
                if let Err(e) = primary.renegotiate(true).await {
                    warn!(error = %e, "re-INVITE after transport swap failed");
                }
            });
        }
    }

    pub(crate) async fn on_registered(self: &Arc<Self>, headers: ResponseHeaders) {
        // Speech detection is suspended during a network blip; resume it
        // for a muted call before anything else.
        if let Some(primary) = self.registry.primary().await {
            if primary.is_muted() {
                self.audio.restart_speech_detection().await;
            }
        }
        let in_call = self.registry.has_primary().await;

        enum Followup {
            FreshLogin(Option<Credentials>),
            NetworkChange,
            None,
        }

        let status = ConnectionStatus::connected("registered");
        let followup = {
            let mut state = self.state.lock().await;
            state.pending_login = None;
            state.login_phase = LoginPhase::Idle;
            state.connection = status.clone();
            if matches!(state.credentials, Some(Credentials::AccessToken { .. })) {
                if let Some(expiry_ms) = parse_token_expiry_ms(&headers) {
                    debug!(expiry_ms, "stored access-token expiry");
                    state.token_expiry_ms = Some(expiry_ms);
                }
            }
            if state.fresh_login_pending {
                state.fresh_login_pending = false;
                state.logged_in = true;
                Followup::FreshLogin(state.credentials.clone())
            } else if state.logged_in {
                Followup::NetworkChange
            } else {
                Followup::None
            }
        };
        self.events.emit(ClientEvent::ConnectionChanged { status }).await;

        match followup {
            Followup::FreshLogin(credentials) => {
                info!("fresh login registered");
                self.audio.init_noise_suppression().await;
                self.events.emit(ClientEvent::LoggedIn).await;
                self.start_keepalive(in_call).await;
                self.spawn_insights_fetch(credentials).await;
            }
            Followup::NetworkChange => {
                info!(in_call, "registration after network change");
                self.start_keepalive(in_call).await;
                if in_call {
                    self.reopen_primary_stats().await;
                }
                let generation = self.net_generation.fetch_add(1, Ordering::SeqCst) + 1;
                let reporter = self.reporter.clone();
                tokio::spawn(async move {
                    reporter.report_change(generation).await;
                });
            }
            Followup::None => {
                debug!("registration without login context, nothing to do");
            }
        }
    }

    /// Tear down and recreate the quality-telemetry channel for the
    /// primary call after a mid-call network change
    async fn reopen_primary_stats(&self) {
        let Some(primary) = self.registry.primary().await else {
            return;
        };
        let call_id = primary.call_id().clone();
        if let Some(old) = self.registry.detach_stats(&call_id) {
            old.close().await;
        }
        match self.telemetry.open_stats_channel(&call_id).await {
            Ok(channel) => self.registry.attach_stats(&call_id, channel),
            Err(e) => debug!(call_id = %call_id, error = %e, "failed to reopen stats channel"),
        }
    }

    async fn spawn_insights_fetch(self: &Arc<Self>, credentials: Option<Credentials>) {
        let Some(credentials) = credentials else {
            return;
        };
        let attempt = self.state.lock().await.attempt;
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            let result = manager
                .telemetry
                .fetch_insights_key(
                    credentials.identity(),
                    credentials.secret(),
                    credentials.is_token(),
                )
                .await;
            let mut state = manager.state.lock().await;
            if state.attempt != attempt {
                debug!("discarding insights grant for superseded login");
                return;
            }
            match result {
                Ok(grant) => {
                    debug!(rtp_enabled = grant.rtp_enabled, "insights key cached");
                    state.insights = Some(grant);
                }
                Err(e) => {
                    // Non-fatal: the feature degrades silently
                    debug!(error = %e, "insights key fetch failed, clearing cached key");
                    state.insights = None;
                }
            }
        });
    }

    pub(crate) async fn on_unregistered(self: &Arc<Self>) {
        let (was_connected, explicit) = {
            let mut state = self.state.lock().await;
            state.logged_in = false;
            let was_connected = state.connection.state == ConnectionState::Connected;
            if was_connected {
                state.connection = ConnectionStatus::disconnected("unregistered");
            }
            (was_connected, state.explicit_logout)
        };
        if was_connected {
            self.events
                .emit(ClientEvent::ConnectionChanged {
                    status: ConnectionStatus::disconnected("unregistered"),
                })
                .await;
        }
        if !explicit {
            debug!("transient unregistration, no teardown");
            return;
        }

        info!("explicit logout, tearing down session state");
        self.audio.stop_ring_audio().await;
        {
            let mut state = self.state.lock().await;
            state.explicit_logout = false;
            state.disconnected_at = Some(Utc::now());
            state.credentials = None;
            state.token_expiry_ms = None;
            state.insights = None;
        }
        self.events.emit(ClientEvent::LoggedOut).await;
        self.cancel_keepalive().await;
        self.platform.logout_cleanup().await;
        self.registry.clear().await;
    }

    pub(crate) async fn on_registration_failed(
        self: &Arc<Self>,
        cause: String,
        status_code: Option<u16>,
    ) {
        let verdict = {
            let mut state = self.state.lock().await;
            if state.connection.state == ConnectionState::Disconnected && state.logged_in {
                None
            } else {
                let was_token = matches!(state.credentials, Some(Credentials::AccessToken { .. }));
                state.logged_in = false;
                state.fresh_login_pending = false;
                state.login_phase = LoginPhase::Idle;
                state.credentials = None;
                Some(was_token)
            }
        };
        let Some(was_token) = verdict else {
            debug!(cause = %cause, "ignoring stale registration failure from superseded attempt");
            return;
        };

        if was_token && status_code == Some(401) {
            warn!(cause = %cause, "registration rejected for access token");
            self.events.emit(ClientEvent::LoginFailed { reason: cause }).await;
            return;
        }

        self.cancel_keepalive().await;
        let reason = if was_token {
            ClientError::InvalidAccessToken.to_string()
        } else {
            match status_code {
                Some(code) => code.to_string(),
                None => cause.clone(),
            }
        };
        error!(cause = %cause, status_code = ?status_code, "registration failed");
        self.events.emit(ClientEvent::LoginFailed { reason }).await;
    }

    pub(crate) async fn on_new_transaction(&self, call_id: String, method: String) {
        if method.eq_ignore_ascii_case("INVITE") {
            let call_id = CallId::new(call_id);
            // Attached even for calls that later get a busy response; the
            // identifier is needed for diagnostics either way.
            info!(call_id = %call_id, "inbound INVITE transaction observed");
            self.state.lock().await.log_call_id = Some(call_id);
        }
    }

    pub(crate) async fn on_new_rtc_session(self: &Arc<Self>, offer: SessionOffer) {
        match self.admission.admit(offer).await {
            Ok(Some(session)) => {
                debug!(
                    call_id = %session.call_id(),
                    direction = ?session.direction(),
                    "session admitted"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, category = e.category(), "session setup failed");
            }
        }
    }

    // ========== background loops ==========

    async fn start_keepalive(self: &Arc<Self>, in_call: bool) {
        self.cancel_keepalive().await;
        let secs = if in_call {
            self.config.keepalive_in_call_secs
        } else {
            self.config.keepalive_idle_secs
        };
        debug!(interval_secs = secs, in_call, "starting keep-alive loop");
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    return;
                };
                let transport = manager.transport.read().await.clone();
                match transport {
                    Some(transport) => {
                        if let Err(e) = transport.send_keepalive().await {
                            debug!(error = %e, "keep-alive probe failed");
                        }
                    }
                    None => return,
                }
            }
        });
        *self.keepalive.lock().await = Some(handle);
    }

    async fn cancel_keepalive(&self) {
        if let Some(handle) = self.keepalive.lock().await.take() {
            handle.abort();
        }
    }

    async fn arm_reconnect_check(self: &Arc<Self>) {
        self.cancel_reconnect_check().await;
        let base = Duration::from_secs(u64::from(self.config.clamped_reconnect_interval()));
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(jittered(base)).await;
                let Some(manager) = weak.upgrade() else {
                    return;
                };
                let connected = {
                    manager.state.lock().await.connection.state == ConnectionState::Connected
                };
                if connected {
                    return;
                }
                debug!("still disconnected after reconnect interval, rotating again");
                manager.rotate_and_restart().await;
            }
        });
        *self.reconnect_check.lock().await = Some(handle);
    }

    async fn cancel_reconnect_check(&self) {
        if let Some(handle) = self.reconnect_check.lock().await.take() {
            handle.abort();
        }
    }
}

/// Apply ±10% jitter so reconnecting clients don't stampede one endpoint
fn jittered(base: Duration) -> Duration {
    let jitter = (rand::random::<f64>() - 0.5) * 0.2;
    let millis = base.as_millis() as f64;
    Duration::from_millis((millis * (1.0 + jitter)) as u64)
}
