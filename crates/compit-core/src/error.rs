// ── Core error types ──
//
// Coordinator-level failures. Consumers never see HTTP status codes or
// JSON parse failures directly: `From<compit_api::Error>` folds transport
// errors into the categories the host cares about (re-auth, not ready,
// transient update failure).

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot connect to the Compit cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Definition errors ────────────────────────────────────────────
    #[error("No definition for device {device_id} (class {class}, type {code})")]
    DefinitionMissing { class: u32, code: u32, device_id: u64 },

    #[error("Definition catalog unavailable: {message}")]
    CatalogUnavailable { message: String },

    // ── Update errors ────────────────────────────────────────────────
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    #[error("Write of {code} on device {device_id} rejected: {message}")]
    WriteRejected {
        device_id: u64,
        code: String,
        message: String,
    },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: u64 },

    #[error("Parameter {code} not found on device {device_id}")]
    ParameterNotFound { device_id: u64, code: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Worth retrying on the next cycle. Authentication and catalog
    /// failures are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::UpdateFailed { .. } => {
                true
            }
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<compit_api::Error> for CoreError {
    fn from(err: compit_api::Error) -> Self {
        match err {
            compit_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            compit_api::Error::NotAuthenticated => CoreError::AuthenticationFailed {
                message: "no session token -- authenticate first".into(),
            },
            compit_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() || e.is_request() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            compit_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            compit_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            compit_api::Error::Status { status, body } => CoreError::Api {
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
                status: Some(status),
            },
            compit_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            compit_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            compit_api::Error::Protocol(message) => CoreError::ConnectionFailed {
                reason: format!("channel error: {message}"),
            },
            compit_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_auth_maps_to_authentication_failed() {
        let err: CoreError = compit_api::Error::Authentication {
            message: "bad password".into(),
        }
        .into();
        assert!(err.is_auth_error());
        assert!(!err.is_retriable());
    }

    #[test]
    fn timeouts_are_retriable() {
        let err: CoreError = compit_api::Error::Timeout { timeout_secs: 10 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 10 }));
        assert!(err.is_retriable());
    }

    #[test]
    fn status_keeps_code() {
        let err: CoreError = compit_api::Error::Status {
            status: 502,
            body: String::new(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(502), .. }));
        assert!(err.is_retriable());
    }

    #[test]
    fn missing_definition_is_fatal_for_the_cycle() {
        let err = CoreError::DefinitionMissing {
            class: 10,
            code: 99,
            device_id: 7,
        };
        assert!(!err.is_retriable());
        assert_eq!(
            err.to_string(),
            "No definition for device 7 (class 10, type 99)"
        );
    }
}
