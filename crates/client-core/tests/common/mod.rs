//! Scripted mock collaborators for the integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use ringwave_client_core::error::{ClientError, ClientResult};
use ringwave_client_core::session::{
    CallDirection, CallId, CallSession, IncomingInvite, SessionFactory, SignalingState,
};
use ringwave_client_core::telemetry::{InsightsGrant, StatsChannel, TelemetryApi};
use ringwave_client_core::hooks::{AudioHooks, PlatformHooks};
use ringwave_client_core::transport::{
    SignalingTransport, TransportConfig, TransportEvent, TransportEventSender, TransportFactory,
};
use ringwave_client_core::ClientEvent;

// ========== transport ==========

#[derive(Default)]
pub struct TransportLog {
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub keepalives: AtomicU32,
    pub swaps: Mutex<Vec<TransportConfig>>,
}

pub struct MockTransportFactory {
    pub log: Arc<TransportLog>,
    pub created: Mutex<Vec<TransportConfig>>,
    pub fail_create: AtomicBool,
    sender: Mutex<Option<TransportEventSender>>,
}

impl MockTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(TransportLog::default()),
            created: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            sender: Mutex::new(None),
        })
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn created_urls(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.socket_url.clone())
            .collect()
    }

    pub fn swap_urls(&self) -> Vec<String> {
        self.log
            .swaps
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.socket_url.clone())
            .collect()
    }

    /// Inject a transport event into the manager's dispatch pump
    pub async fn inject(&self, event: TransportEvent) {
        let sender = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .expect("no transport created yet");
        sender.send(event).await.expect("dispatch pump gone");
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(
        &self,
        config: TransportConfig,
        events: TransportEventSender,
    ) -> ClientResult<Arc<dyn SignalingTransport>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::transport_creation_failed("scripted failure"));
        }
        self.created.lock().unwrap().push(config.clone());
        *self.sender.lock().unwrap() = Some(events.clone());
        Ok(Arc::new(MockTransport {
            log: self.log.clone(),
            config: Mutex::new(config),
            events,
        }))
    }
}

pub struct MockTransport {
    log: Arc<TransportLog>,
    config: Mutex<TransportConfig>,
    events: TransportEventSender,
}

#[async_trait]
impl SignalingTransport for MockTransport {
    async fn start(&self) -> ClientResult<()> {
        self.log.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> ClientResult<()> {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        let socket_url = self.config.lock().unwrap().socket_url.clone();
        let _ = self.events.send(TransportEvent::Unregistered).await;
        let _ = self
            .events
            .send(TransportEvent::Disconnected {
                code: 1000,
                reason: "stopped".to_string(),
                socket_url,
                ignore_reconnection: true,
            })
            .await;
        Ok(())
    }

    async fn create_new_transport(&self, config: TransportConfig) -> ClientResult<()> {
        self.log.swaps.lock().unwrap().push(config.clone());
        *self.config.lock().unwrap() = config;
        Ok(())
    }

    async fn send_keepalive(&self) -> ClientResult<()> {
        self.log.keepalives.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ========== telemetry ==========

pub struct MockStatsChannel {
    pub call_id: CallId,
    pub closed: AtomicBool,
    pub setup_marked: AtomicBool,
}

#[async_trait]
impl StatsChannel for MockStatsChannel {
    fn mark_media_setup_start(&self) {
        self.setup_marked.store(true, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct MockTelemetry {
    pub addresses: Mutex<VecDeque<ClientResult<String>>>,
    pub grants: Mutex<VecDeque<ClientResult<InsightsGrant>>>,
    pub channels: Mutex<Vec<Arc<MockStatsChannel>>>,
    pub resolve_calls: AtomicU32,
}

impl MockTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            addresses: Mutex::new(VecDeque::new()),
            grants: Mutex::new(VecDeque::new()),
            channels: Mutex::new(Vec::new()),
            resolve_calls: AtomicU32::new(0),
        })
    }

    pub fn script_address(&self, result: ClientResult<String>) {
        self.addresses.lock().unwrap().push_back(result);
    }

    pub fn script_grant(&self, result: ClientResult<InsightsGrant>) {
        self.grants.lock().unwrap().push_back(result);
    }

    pub fn channels_for(&self, call_id: &CallId) -> Vec<Arc<MockStatsChannel>> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.call_id == call_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TelemetryApi for MockTelemetry {
    async fn resolve_public_address(&self) -> ClientResult<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.addresses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::address_resolution_failed("script exhausted")))
    }

    async fn fetch_insights_key(
        &self,
        _identity: &str,
        _secret: &str,
        _is_token: bool,
    ) -> ClientResult<InsightsGrant> {
        self.grants
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::telemetry_fetch_failed("script exhausted")))
    }

    async fn open_stats_channel(&self, call_id: &CallId) -> ClientResult<Arc<dyn StatsChannel>> {
        let channel = Arc::new(MockStatsChannel {
            call_id: call_id.clone(),
            closed: AtomicBool::new(false),
            setup_marked: AtomicBool::new(false),
        });
        self.channels.lock().unwrap().push(channel.clone());
        Ok(channel)
    }
}

// ========== sessions ==========

pub struct MockSession {
    pub call_id: CallId,
    pub direction: CallDirection,
    pub state: Mutex<SignalingState>,
    pub muted: AtomicBool,
    pub renegotiations: Mutex<Vec<bool>>,
}

impl MockSession {
    pub fn new(id: &str, direction: CallDirection) -> Arc<Self> {
        Arc::new(Self {
            call_id: CallId::from(id),
            direction,
            state: Mutex::new(SignalingState::Stable),
            muted: AtomicBool::new(false),
            renegotiations: Mutex::new(Vec::new()),
        })
    }

    pub fn set_state(&self, state: SignalingState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn ice_restarts(&self) -> usize {
        self.renegotiations
            .lock()
            .unwrap()
            .iter()
            .filter(|ice| **ice)
            .count()
    }
}

#[async_trait]
impl CallSession for MockSession {
    fn call_id(&self) -> &CallId {
        &self.call_id
    }

    fn direction(&self) -> CallDirection {
        self.direction
    }

    fn signaling_state(&self) -> SignalingState {
        *self.state.lock().unwrap()
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    async fn renegotiate(&self, ice_restart: bool) -> ClientResult<()> {
        self.renegotiations.lock().unwrap().push(ice_restart);
        Ok(())
    }
}

pub struct MockInvite {
    pub call_id: CallId,
    pub caller: String,
    pub ended: AtomicBool,
    pub normalized: AtomicBool,
    pub rejected_with: Mutex<Option<(u16, String)>>,
}

impl MockInvite {
    pub fn new(id: &str, caller: &str) -> Arc<Self> {
        Arc::new(Self {
            call_id: CallId::from(id),
            caller: caller.to_string(),
            ended: AtomicBool::new(false),
            normalized: AtomicBool::new(false),
            rejected_with: Mutex::new(None),
        })
    }

    pub fn rejection(&self) -> Option<(u16, String)> {
        self.rejected_with.lock().unwrap().clone()
    }
}

#[async_trait]
impl IncomingInvite for MockInvite {
    fn call_id(&self) -> &CallId {
        &self.call_id
    }

    fn caller(&self) -> &str {
        &self.caller
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn normalize_media_description(&self) {
        self.normalized.store(true, Ordering::SeqCst);
    }

    async fn reject(&self, status: u16, reason: &str) -> ClientResult<()> {
        *self.rejected_with.lock().unwrap() = Some((status, reason.to_string()));
        Ok(())
    }
}

pub struct MockSessionFactory {
    pub sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockSessionFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create_inbound(
        &self,
        invite: Arc<dyn IncomingInvite>,
    ) -> ClientResult<Arc<dyn CallSession>> {
        let session = MockSession::new(invite.call_id().as_str(), CallDirection::Inbound);
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn create_outbound(
        &self,
        call_id: CallId,
        _target: String,
    ) -> ClientResult<Arc<dyn CallSession>> {
        let session = MockSession::new(call_id.as_str(), CallDirection::Outbound);
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

// ========== host hooks ==========

#[derive(Default)]
pub struct MockAudio {
    pub noise_suppression_inits: AtomicU32,
    pub ring_stops: AtomicU32,
    pub speech_restarts: AtomicU32,
}

impl MockAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl AudioHooks for MockAudio {
    async fn init_noise_suppression(&self) {
        self.noise_suppression_inits.fetch_add(1, Ordering::SeqCst);
    }

    async fn stop_ring_audio(&self) {
        self.ring_stops.fetch_add(1, Ordering::SeqCst);
    }

    async fn restart_speech_detection(&self) {
        self.speech_restarts.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockPlatform {
    pub online: AtomicBool,
    pub cleanups: AtomicU32,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            cleanups: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl PlatformHooks for MockPlatform {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn network_type(&self) -> String {
        "wifi".to_string()
    }

    async fn logout_cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

// ========== helpers ==========

/// Opt-in test logging: `RUST_LOG=debug cargo test -- --nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Receive the next event or fail the test after two seconds
pub async fn recv_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("event channel closed")
}

/// Poll a condition until it holds or two seconds elapse
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within two seconds");
}
