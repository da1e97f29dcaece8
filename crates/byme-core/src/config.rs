// ── Runtime connection configuration ──
//
// These types describe how to reach one By-me web server and how to
// present its devices. They carry credentials and tuning but never touch
// disk: byme-config (or any other caller) builds a `ControllerConfig`.

use std::path::PathBuf;
use std::time::Duration;

use byme_api::{TlsMode, TransportConfig, WebClient};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::error::CoreError;
use crate::model::Platform;
use crate::rules::RuleSet;

/// URL scheme of the web server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

/// How long to wait between poll cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    Fixed(Duration),
    /// 120 ms per device, never below 3 s.
    ScaledByDeviceCount,
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(8))
    }
}

impl PollInterval {
    const SCALED_FLOOR: Duration = Duration::from_secs(3);
    const SCALED_PER_DEVICE_MS: u64 = 120;

    /// Delay before the next cycle given the current table size.
    pub fn for_device_count(&self, device_count: usize) -> Duration {
        match self {
            Self::Fixed(interval) => *interval,
            Self::ScaledByDeviceCount => {
                let count = u64::try_from(device_count).unwrap_or(u64::MAX);
                Duration::from_millis(count.saturating_mul(Self::SCALED_PER_DEVICE_MS))
                    .max(Self::SCALED_FLOOR)
            }
        }
    }
}

/// Configuration for one web server connection.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub username: String,
    pub password: SecretString,
    /// Where the web server's root CA is (or will be) stored. `None`
    /// disables certificate verification.
    pub certificate: Option<PathBuf>,
    /// Per-request timeout; connects get half of it.
    pub timeout: Duration,
    /// Upper bound for one whole table update.
    pub update_timeout: Duration,
    pub legacy_tls: bool,
    /// Opaque channel id adapters can use for global actions.
    pub global_channel_id: Option<String>,
    /// Platforms hidden from `get_by_type` / `type_exists`.
    pub ignore: Vec<Platform>,
    pub overrides: RuleSet,
    pub poll_interval: PollInterval,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.20".into(),
            port: 443,
            scheme: Scheme::Https,
            username: "admin".into(),
            password: SecretString::from(String::new()),
            certificate: None,
            timeout: Duration::from_secs(6),
            update_timeout: Duration::from_secs(60),
            legacy_tls: false,
            global_channel_id: None,
            ignore: Vec::new(),
            overrides: RuleSet::default(),
            poll_interval: PollInterval::default(),
        }
    }
}

impl ControllerConfig {
    /// Web server root URL.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        Ok(WebClient::base_url_for(
            &self.scheme.to_string(),
            &self.host,
            self.port,
        )?)
    }

    /// Transport settings for the HTTP client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self
                .certificate
                .clone()
                .map_or(TlsMode::DangerAcceptInvalid, TlsMode::CustomCa),
            timeout: self.timeout,
            legacy_tls: self.legacy_tls,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_interval_is_eight_seconds() {
        assert_eq!(
            PollInterval::default().for_device_count(5000),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn scaled_interval_has_a_floor() {
        let scaled = PollInterval::ScaledByDeviceCount;
        assert_eq!(scaled.for_device_count(0), Duration::from_secs(3));
        assert_eq!(scaled.for_device_count(10), Duration::from_secs(3));
        assert_eq!(scaled.for_device_count(100), Duration::from_secs(12));
        assert_eq!(scaled.for_device_count(500), Duration::from_secs(60));
    }

    #[test]
    fn base_url_and_transport_follow_config() {
        let config = ControllerConfig {
            host: "byme.local".into(),
            port: 8443,
            certificate: Some(PathBuf::from("/tmp/ca.crt")),
            legacy_tls: true,
            ..ControllerConfig::default()
        };
        assert_eq!(config.base_url().unwrap().as_str(), "https://byme.local:8443/");

        let transport = config.transport();
        assert_eq!(transport.tls, TlsMode::CustomCa(PathBuf::from("/tmp/ca.crt")));
        assert!(transport.legacy_tls);
        assert_eq!(transport.timeout, Duration::from_secs(6));
    }
}
