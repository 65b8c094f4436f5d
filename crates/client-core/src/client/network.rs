//! Network-change telemetry trigger
//!
//! After a reconnection-following-registration signals a network change, the
//! reporter resolves the current public address and reports it exactly once
//! per change, tolerating transient resolution failures with bounded linear
//! backoff. Every asynchronous continuation re-checks the generation counter
//! before committing, so a resolution belonging to a superseded network
//! state is discarded instead of overwriting newer data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::client::types::{NetworkSnapshot, RetryState};
use crate::events::{ClientEvent, EventSink};
use crate::hooks::PlatformHooks;
use crate::telemetry::TelemetryApi;

/// Base delay unit for the linear resolution backoff
const RESOLUTION_RETRY_STEP: Duration = Duration::from_millis(200);

pub(crate) struct NetworkChangeReporter {
    telemetry: Arc<dyn TelemetryApi>,
    platform: Arc<dyn PlatformHooks>,
    events: EventSink,
    generation: Arc<AtomicU64>,
    retry: Arc<RetryState>,
    retry_limit: u32,
    snapshot: Arc<RwLock<NetworkSnapshot>>,
}

impl NetworkChangeReporter {
    pub(crate) fn new(
        telemetry: Arc<dyn TelemetryApi>,
        platform: Arc<dyn PlatformHooks>,
        events: EventSink,
        generation: Arc<AtomicU64>,
        retry: Arc<RetryState>,
        retry_limit: u32,
        snapshot: Arc<RwLock<NetworkSnapshot>>,
    ) -> Self {
        Self {
            telemetry,
            platform,
            events,
            generation,
            retry,
            retry_limit,
            snapshot,
        }
    }

    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Resolve and report the address for one network change
    ///
    /// Emits [`ClientEvent::NetworkChanged`] at most once. On failure the
    /// next attempt runs after `retry_count * 200ms`; at the ceiling the
    /// counter resets and the change goes unreported (best effort).
    pub(crate) async fn report_change(&self, generation: u64) {
        loop {
            if self.superseded(generation) {
                debug!(generation, "network change superseded before resolution");
                return;
            }

            match self.telemetry.resolve_public_address().await {
                Ok(address) => {
                    if self.superseded(generation) {
                        debug!(generation, "discarding stale address resolution");
                        return;
                    }
                    self.retry.reset_ip_retries();
                    let network_type = self.platform.network_type();
                    *self.snapshot.write().await = NetworkSnapshot {
                        network_type: network_type.clone(),
                        address: address.clone(),
                    };
                    debug!(address = %address, network_type = %network_type, "network change resolved");
                    self.events
                        .emit(ClientEvent::NetworkChanged { address, network_type })
                        .await;
                    return;
                }
                Err(e) => {
                    let count = self.retry.ip_retry_count();
                    if count >= self.retry_limit {
                        warn!(
                            error = %e,
                            attempts = count,
                            "giving up on address resolution after retry ceiling"
                        );
                        self.retry.reset_ip_retries();
                        return;
                    }
                    debug!(error = %e, retry = count, "address resolution failed, will retry");
                    self.retry.set_ip_retry_count(count + 1);
                    tokio::time::sleep(RESOLUTION_RETRY_STEP * count).await;
                }
            }
        }
    }

    /// One-shot snapshot on first connection: best effort, defaults to an
    /// empty address on failure, never reported as an event.
    pub(crate) async fn snapshot_first_connect(&self, generation: u64) {
        let address = match self.telemetry.resolve_public_address().await {
            Ok(address) => address,
            Err(e) => {
                debug!(error = %e, "first-connect address resolution failed, recording empty address");
                String::new()
            }
        };
        if self.superseded(generation) {
            debug!(generation, "discarding first-connect snapshot for old network state");
            return;
        }
        *self.snapshot.write().await = NetworkSnapshot {
            network_type: self.platform.network_type(),
            address,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ClientResult};
    use crate::hooks::DefaultPlatformHooks;
    use crate::session::CallId;
    use crate::telemetry::{InsightsGrant, StatsChannel};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted resolver: pops one result per call, each optionally delayed
    struct ScriptedTelemetry {
        script: Mutex<VecDeque<(Duration, ClientResult<String>)>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTelemetry {
        fn new(script: Vec<(Duration, ClientResult<String>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TelemetryApi for ScriptedTelemetry {
        async fn resolve_public_address(&self) -> ClientResult<String> {
            *self.calls.lock().unwrap() += 1;
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some((delay, result)) => {
                    tokio::time::sleep(delay).await;
                    result
                }
                None => Err(ClientError::address_resolution_failed("script exhausted")),
            }
        }

        async fn fetch_insights_key(
            &self,
            _identity: &str,
            _secret: &str,
            _is_token: bool,
        ) -> ClientResult<InsightsGrant> {
            Err(ClientError::telemetry_fetch_failed("not scripted"))
        }

        async fn open_stats_channel(
            &self,
            _call_id: &CallId,
        ) -> ClientResult<Arc<dyn StatsChannel>> {
            Err(ClientError::telemetry_fetch_failed("not scripted"))
        }
    }

    fn reporter_with(
        telemetry: Arc<ScriptedTelemetry>,
        limit: u32,
    ) -> (NetworkChangeReporter, Arc<RetryState>, Arc<AtomicU64>, EventSink) {
        let retry = Arc::new(RetryState::default());
        let generation = Arc::new(AtomicU64::new(1));
        let events = EventSink::new(16);
        let reporter = NetworkChangeReporter::new(
            telemetry,
            Arc::new(DefaultPlatformHooks),
            events.clone(),
            generation.clone(),
            retry.clone(),
            limit,
            Arc::new(RwLock::new(NetworkSnapshot::default())),
        );
        (reporter, retry, generation, events)
    }

    fn failure() -> (Duration, ClientResult<String>) {
        (Duration::ZERO, Err(ClientError::address_resolution_failed("unreachable")))
    }

    #[tokio::test]
    async fn retry_count_never_exceeds_ceiling_and_resets() {
        let telemetry = ScriptedTelemetry::new(vec![failure(), failure(), failure(), failure()]);
        let (reporter, retry, _, events) = reporter_with(telemetry.clone(), 2);
        let mut rx = events.subscribe();

        reporter.report_change(1).await;

        // limit 2 means three attempts: counts 0, 1, then give-up at 2
        assert_eq!(telemetry.calls(), 3);
        assert_eq!(retry.ip_retry_count(), 0, "counter resets at the ceiling");
        assert!(rx.try_recv().is_err(), "no event after giving up");
    }

    #[tokio::test]
    async fn success_resets_counter_and_emits_once() {
        let telemetry = ScriptedTelemetry::new(vec![
            failure(),
            (Duration::ZERO, Ok("203.0.113.9".to_string())),
        ]);
        let (reporter, retry, _, events) = reporter_with(telemetry, 5);
        let mut rx = events.subscribe();

        reporter.report_change(1).await;

        assert_eq!(retry.ip_retry_count(), 0);
        match rx.try_recv().unwrap() {
            ClientEvent::NetworkChanged { address, .. } => assert_eq!(address, "203.0.113.9"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "reported exactly once");
    }

    #[tokio::test]
    async fn later_dispatched_resolution_wins() {
        // First change resolves slowly, second change arrives meanwhile and
        // resolves fast; the slow result must be discarded.
        let telemetry = ScriptedTelemetry::new(vec![
            (Duration::from_millis(200), Ok("10.0.0.1".to_string())),
            (Duration::ZERO, Ok("10.0.0.2".to_string())),
        ]);
        let (reporter, _, generation, events) = reporter_with(telemetry, 5);
        let reporter = Arc::new(reporter);
        let mut rx = events.subscribe();

        let slow = {
            let reporter = reporter.clone();
            tokio::spawn(async move { reporter.report_change(1).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        generation.store(2, Ordering::SeqCst);
        reporter.report_change(2).await;
        slow.await.unwrap();

        match rx.try_recv().unwrap() {
            ClientEvent::NetworkChanged { address, .. } => assert_eq!(address, "10.0.0.2"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "superseded resolution emitted nothing");
        assert_eq!(reporter.snapshot.read().await.address, "10.0.0.2");
    }

    #[tokio::test]
    async fn first_connect_snapshot_defaults_to_empty_address() {
        let telemetry = ScriptedTelemetry::new(vec![failure()]);
        let (reporter, _, _, events) = reporter_with(telemetry, 5);
        let mut rx = events.subscribe();

        reporter.snapshot_first_connect(1).await;

        assert_eq!(reporter.snapshot.read().await.address, "");
        assert!(rx.try_recv().is_err(), "first-connect snapshot is not an event");
    }
}
