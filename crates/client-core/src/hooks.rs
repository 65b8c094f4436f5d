//! Host application hooks
//!
//! The audio pipeline and the host platform are out of scope for this crate
//! and are reached through the two traits below. Default no-op
//! implementations are provided for hosts that do not care.

use async_trait::async_trait;

/// Audio pipeline surface consumed by the lifecycle layer
#[async_trait]
pub trait AudioHooks: Send + Sync {
    /// Initialize the noise-suppression subsystem after a fresh login
    async fn init_noise_suppression(&self);

    /// Stop any playing ringtone/ringback audio
    async fn stop_ring_audio(&self);

    /// Restart continuous speech detection, compensating for its suspension
    /// during a network blip while the call was muted
    async fn restart_speech_detection(&self);
}

/// Platform and host-object surface
#[async_trait]
pub trait PlatformHooks: Send + Sync {
    /// Platform-reported network connectivity
    fn is_online(&self) -> bool;

    /// Platform-reported network type ("wifi", "cellular", ...)
    fn network_type(&self) -> String;

    /// Full session cleanup after an explicit logout
    async fn logout_cleanup(&self);
}

/// No-op audio hooks for hosts without an audio pipeline
#[derive(Debug, Default)]
pub struct DefaultAudioHooks;

#[async_trait]
impl AudioHooks for DefaultAudioHooks {
    async fn init_noise_suppression(&self) {}
    async fn stop_ring_audio(&self) {}
    async fn restart_speech_detection(&self) {}
}

/// Platform hooks reporting an always-online, unknown network
#[derive(Debug, Default)]
pub struct DefaultPlatformHooks;

#[async_trait]
impl PlatformHooks for DefaultPlatformHooks {
    fn is_online(&self) -> bool {
        true
    }

    fn network_type(&self) -> String {
        "unknown".to_string()
    }

    async fn logout_cleanup(&self) {}
}
