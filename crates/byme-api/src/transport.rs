// Shared transport configuration for building reqwest::Client instances.
//
// The session client rebuilds its HTTP client when the CA certificate
// changes on disk, and the certificate download itself needs a throwaway
// unverified client, so the builder logic lives here once.

use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use reqwest::tls::Version;
use tracing::{debug, warn};

use crate::error::Error;

const USER_AGENT: &str = concat!("byme-api/", env!("CARGO_PKG_VERSION"));

static INSECURE_WARNING: Once = Once::new();

/// TLS verification mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Verify the server against the CA certificate stored at this path.
    ///
    /// If the file does not exist yet (nothing installed so far) the
    /// client falls back to unverified TLS until it is rebuilt.
    CustomCa(PathBuf),
    /// Accept any certificate. The controller ships a self-signed one.
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Read timeout. The connect timeout is half of it.
    pub timeout: Duration,
    /// Negotiate TLS 1.0 to 1.2 through the platform TLS library, for
    /// controllers whose firmware cannot speak modern TLS.
    pub legacy_tls: bool,
}

/// TLS backend and protocol range a client is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsProfile {
    /// Use the platform library (OpenSSL, `SChannel`, Secure Transport)
    /// instead of rustls, which has no TLS 1.0/1.1 or legacy ciphers.
    pub native_backend: bool,
    pub min_version: Option<Version>,
    pub max_version: Option<Version>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(6),
            legacy_tls: false,
        }
    }
}

impl TransportConfig {
    /// The TLS backend and version range this config asks for.
    pub fn tls_profile(&self) -> TlsProfile {
        if self.legacy_tls {
            TlsProfile {
                native_backend: true,
                min_version: Some(Version::TLS_1_0),
                max_version: Some(Version::TLS_1_2),
            }
        } else {
            TlsProfile {
                native_backend: false,
                min_version: None,
                max_version: None,
            }
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.timeout / 2)
            .read_timeout(self.timeout)
            .user_agent(USER_AGENT);

        let profile = self.tls_profile();
        if profile.native_backend {
            debug!("legacy TLS mode: native backend, TLS 1.0 to 1.2");
            builder = builder.use_native_tls();
        } else {
            builder = builder.use_rustls_tls();
        }
        if let Some(min) = profile.min_version {
            builder = builder.min_tls_version(min);
        }
        if let Some(max) = profile.max_version {
            builder = builder.max_tls_version(max);
        }

        match &self.tls {
            TlsMode::CustomCa(path) if path.exists() => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::CustomCa(path) => {
                warn_insecure_once(&format!(
                    "CA certificate {} not installed yet, TLS verification disabled",
                    path.display()
                ));
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsMode::DangerAcceptInvalid => {
                warn_insecure_once("no CA certificate configured, TLS verification disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Same settings with certificate verification turned off.
    ///
    /// Used to fetch the CA certificate itself, which cannot be verified
    /// against a file that has not been downloaded yet.
    pub fn unverified(&self) -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            ..self.clone()
        }
    }

    /// The configured CA certificate path, if any.
    pub fn certificate_path(&self) -> Option<&PathBuf> {
        match &self.tls {
            TlsMode::CustomCa(path) => Some(path),
            TlsMode::DangerAcceptInvalid => None,
        }
    }
}

fn warn_insecure_once(message: &str) {
    INSECURE_WARNING.call_once(|| warn!("{message}"));
}
