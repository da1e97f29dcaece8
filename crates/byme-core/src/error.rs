// ── Core error types ──
//
// User-facing errors from byme-core. Callers never see raw payload or
// transport details; the `From<byme_api::Error>` impl folds them into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach controller: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Controller disconnected")]
    ControllerDisconnected,

    #[error("Controller did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Device {object_id} has no status named {status_name:?}")]
    StatusNotFound {
        object_id: String,
        status_name: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// `true` for failures the next poll cycle is expected to get past.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::UpdateFailed { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<byme_api::Error> for CoreError {
    fn from(err: byme_api::Error) -> Self {
        match err {
            byme_api::Error::Connection { message } => CoreError::ConnectionFailed { reason: message },
            byme_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            byme_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            byme_api::Error::Config { message } => CoreError::AuthenticationFailed { message },
            byme_api::Error::Api { message } => CoreError::Api { message },
            byme_api::Error::Payload { message } => CoreError::UpdateFailed {
                message: format!("unreadable controller response, session reset ({message})"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_credentials_become_authentication_failure() {
        let err = CoreError::from(byme_api::Error::Config {
            message: "bad password".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn payload_errors_are_retryable() {
        let err = CoreError::from(byme_api::Error::Payload {
            message: "no ':'".into(),
        });
        assert!(err.is_retryable());
    }
}
