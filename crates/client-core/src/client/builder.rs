//! Builder for [`ConnectionManager`]
//!
//! # Examples
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use ringwave_client_core::client::builder::ConnectionManagerBuilder;
//! # use ringwave_client_core::client::config::ClientConfig;
//! # async fn example(
//! #     transports: Arc<dyn ringwave_client_core::transport::TransportFactory>,
//! #     sessions: Arc<dyn ringwave_client_core::session::SessionFactory>,
//! #     telemetry: Arc<dyn ringwave_client_core::telemetry::TelemetryApi>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConnectionManagerBuilder::new(
//!     ClientConfig::new("phone.example.com")
//!         .with_endpoints(vec!["wss://edge0.example.com/ws".to_string()]),
//! )
//! .transport_factory(transports)
//! .session_factory(sessions)
//! .telemetry(telemetry)
//! .build()
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::client::config::ClientConfig;
use crate::client::manager::ConnectionManager;
use crate::error::{ClientError, ClientResult};
use crate::hooks::{AudioHooks, DefaultAudioHooks, DefaultPlatformHooks, PlatformHooks};
use crate::session::SessionFactory;
use crate::telemetry::TelemetryApi;
use crate::transport::TransportFactory;

pub struct ConnectionManagerBuilder {
    config: ClientConfig,
    transports: Option<Arc<dyn TransportFactory>>,
    sessions: Option<Arc<dyn SessionFactory>>,
    telemetry: Option<Arc<dyn TelemetryApi>>,
    audio: Arc<dyn AudioHooks>,
    platform: Arc<dyn PlatformHooks>,
}

impl ConnectionManagerBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transports: None,
            sessions: None,
            telemetry: None,
            audio: Arc::new(DefaultAudioHooks),
            platform: Arc::new(DefaultPlatformHooks),
        }
    }

    pub fn transport_factory(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = Some(transports);
        self
    }

    pub fn session_factory(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetryApi>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn audio_hooks(mut self, audio: Arc<dyn AudioHooks>) -> Self {
        self.audio = audio;
        self
    }

    pub fn platform_hooks(mut self, platform: Arc<dyn PlatformHooks>) -> Self {
        self.platform = platform;
        self
    }

    /// Build the manager and spawn its dispatch pump
    pub async fn build(self) -> ClientResult<Arc<ConnectionManager>> {
        let transports = self.transports.ok_or(ClientError::MissingConfiguration {
            field: "transport_factory".into(),
        })?;
        let sessions = self.sessions.ok_or(ClientError::MissingConfiguration {
            field: "session_factory".into(),
        })?;
        let telemetry = self.telemetry.ok_or(ClientError::MissingConfiguration {
            field: "telemetry".into(),
        })?;
        ConnectionManager::new(
            self.config,
            transports,
            sessions,
            telemetry,
            self.audio,
            self.platform,
        )
        .await
    }
}
