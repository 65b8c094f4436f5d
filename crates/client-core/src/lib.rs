//! # ringwave-client-core
//!
//! Connection and session lifecycle coordination for the Ringwave voice
//! client. This crate owns the state machine that reconciles three
//! independently failing subsystems - the signaling transport, SIP
//! registration, and RTC session negotiation - under retry and failover,
//! while the protocol stack, media engine, audio pipeline and HTTP services
//! stay behind narrow trait interfaces.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use ringwave_client_core::{ClientConfig, ClientEvent, ConnectionManagerBuilder, Credentials};
//! # async fn example(
//! #     transports: Arc<dyn ringwave_client_core::transport::TransportFactory>,
//! #     sessions: Arc<dyn ringwave_client_core::session::SessionFactory>,
//! #     telemetry: Arc<dyn ringwave_client_core::telemetry::TelemetryApi>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConnectionManagerBuilder::new(
//!     ClientConfig::new("phone.example.com").with_endpoints(vec![
//!         "wss://edge0.example.com/ws".to_string(),
//!         "wss://edge1.example.com/ws".to_string(),
//!     ]),
//! )
//! .transport_factory(transports)
//! .session_factory(sessions)
//! .telemetry(telemetry)
//! .build()
//! .await?;
//!
//! let mut events = manager.subscribe_events();
//! manager
//!     .login(
//!         Credentials::Password {
//!             username: "alice".into(),
//!             password: "s3cret".into(),
//!         },
//!         None,
//!     )
//!     .await;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ClientEvent::LoggedIn => println!("ready for calls"),
//!         ClientEvent::LoginFailed { reason } => println!("login failed: {reason}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod hooks;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use client::{
    ClientConfig, ConnectionManager, ConnectionManagerBuilder, ConnectionState, ConnectionStatus,
    Credentials,
};
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, ClientEventHandler};
pub use session::{CallDirection, CallId, CallRegistry, SessionOffer, SignalingState};
pub use telemetry::InsightsGrant;
pub use transport::{TransportConfig, TransportEvent};
