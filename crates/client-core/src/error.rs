//! Error types and handling for the client-core library
//!
//! Errors are categorized to match how they are recovered from:
//!
//! - **Validation errors** - a login/logout precondition failed; reported to
//!   the host synchronously, never retried internally
//! - **Transport errors** - signaling socket construction or I/O failed;
//!   creation failures require the caller to re-invoke login
//! - **Registration errors** - split into user-correctable (bad credentials
//!   or token, surfaced verbatim) and transient (network/server)
//! - **Telemetry errors** - insights-key fetch and address resolution are
//!   best effort; these degrade silently and never reach the host
//! - **Session errors** - admission rejections and stale-state self-heals

use thiserror::Error;

/// Result type alias for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Error types for connection and session lifecycle operations
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// A login precondition failed (missing credentials, call in progress,
    /// platform offline). Reported via a login-failed notification.
    #[error("login rejected: {reason}")]
    LoginRejected { reason: String },

    /// The signaling transport could not be constructed from its
    /// configuration. The caller must re-invoke login; there is no
    /// automatic retry.
    #[error("transport creation failed: {reason}")]
    TransportCreationFailed { reason: String },

    /// The signaling transport failed while running
    #[error("transport failed: {reason}")]
    TransportFailed { reason: String },

    /// Registration with the telephony backend failed
    #[error("registration failed: {cause}")]
    RegistrationFailed {
        cause: String,
        status_code: Option<u16>,
    },

    /// Fixed message used for invalid-token retries in access-token mode
    #[error("invalid access token")]
    InvalidAccessToken,

    /// Insights-key fetch failed; the cached key is cleared and the
    /// feature degrades silently
    #[error("telemetry fetch failed: {reason}")]
    TelemetryFetchFailed { reason: String },

    /// Public address resolution failed; retried with bounded linear
    /// backoff, then given up on silently
    #[error("address resolution failed: {reason}")]
    AddressResolutionFailed { reason: String },

    /// A session reference pointed at an already-terminated signaling
    /// session. Self-healed by discarding the reference; never surfaced.
    #[error("stale session state: {details}")]
    StaleSessionState { details: String },

    /// A newly offered call was rejected by the admission controller
    #[error("session rejected: {status} {reason}")]
    SessionRejected { status: u16, reason: String },

    /// Session object construction failed downstream
    #[error("session setup failed: {reason}")]
    SessionSetupFailed { reason: String },

    /// Configuration errors
    #[error("invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("missing required configuration: {field}")]
    MissingConfiguration { field: String },

    /// Generic errors
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl ClientError {
    /// Create a login rejected error
    pub fn login_rejected(reason: impl Into<String>) -> Self {
        Self::LoginRejected { reason: reason.into() }
    }

    /// Create a transport creation failure
    pub fn transport_creation_failed(reason: impl Into<String>) -> Self {
        Self::TransportCreationFailed { reason: reason.into() }
    }

    /// Create a transport runtime failure
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        Self::TransportFailed { reason: reason.into() }
    }

    /// Create a registration failure
    pub fn registration_failed(cause: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::RegistrationFailed { cause: cause.into(), status_code }
    }

    /// Create a telemetry fetch failure
    pub fn telemetry_fetch_failed(reason: impl Into<String>) -> Self {
        Self::TelemetryFetchFailed { reason: reason.into() }
    }

    /// Create an address resolution failure
    pub fn address_resolution_failed(reason: impl Into<String>) -> Self {
        Self::AddressResolutionFailed { reason: reason.into() }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if this error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::TransportFailed { .. }
            | ClientError::TelemetryFetchFailed { .. }
            | ClientError::AddressResolutionFailed { .. } => true,

            // Registration failures are transient unless they carry an
            // authentication status code
            ClientError::RegistrationFailed { status_code, .. } => {
                !matches!(status_code, Some(401) | Some(403))
            }

            _ => false,
        }
    }

    /// Check if this error indicates an authentication problem
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidAccessToken
                | ClientError::RegistrationFailed {
                    status_code: Some(401) | Some(403),
                    ..
                }
        )
    }

    /// Check if this error must be surfaced to the host rather than
    /// absorbed internally
    pub fn blocks_user_intent(&self) -> bool {
        matches!(
            self,
            ClientError::LoginRejected { .. }
                | ClientError::TransportCreationFailed { .. }
                | ClientError::RegistrationFailed { .. }
                | ClientError::InvalidAccessToken
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::LoginRejected { .. } => "validation",

            ClientError::TransportCreationFailed { .. }
            | ClientError::TransportFailed { .. } => "transport",

            ClientError::RegistrationFailed { .. }
            | ClientError::InvalidAccessToken => "registration",

            ClientError::TelemetryFetchFailed { .. }
            | ClientError::AddressResolutionFailed { .. } => "telemetry",

            ClientError::StaleSessionState { .. }
            | ClientError::SessionRejected { .. }
            | ClientError::SessionSetupFailed { .. } => "session",

            ClientError::InvalidConfiguration { .. }
            | ClientError::MissingConfiguration { .. } => "configuration",

            ClientError::InternalError { .. } => "system",
        }
    }
}
