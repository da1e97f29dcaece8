use thiserror::Error;

/// Top-level error type for the `byme-api` crate.
///
/// Mirrors the controller's failure taxonomy: transport problems are
/// retryable, rejected credentials are not, and anything the server sends
/// that we cannot make sense of is an API or payload error.
/// `byme-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP error, timeout, DNS or TLS handshake failure.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error (bad CA file, client builder failure).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Authentication ──────────────────────────────────────────────
    /// The web server rejected the configured credentials.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Server responses ────────────────────────────────────────────
    /// Malformed or unexpected server response, or a local save failure.
    #[error("API error: {message}")]
    Api { message: String },

    /// The response envelope or its row payload could not be decoded.
    /// The session is assumed stale whenever this is raised.
    #[error("Payload decode error: {message}")]
    Payload { message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Payload { .. })
    }

    /// Returns `true` if this error means the session token can no longer
    /// be trusted and a fresh login is needed.
    pub fn is_session_stale(&self) -> bool {
        matches!(self, Self::Payload { .. })
    }

    /// Returns `true` if the user has to fix the configuration before
    /// anything can succeed.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
