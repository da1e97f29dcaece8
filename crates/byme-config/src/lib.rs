//! Shared configuration for the By-me tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `byme_core::ControllerConfig`. The core never reads
//! files; this crate is the only place that does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use byme_core::{ControllerConfig, OverrideRule, Platform, PollInterval, RuleSet, Scheme};

const KEYRING_SERVICE: &str = "byme";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named web server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Upper bound for one poll cycle in seconds.
    #[serde(default = "default_update_timeout")]
    pub update_timeout: u64,

    #[serde(default)]
    pub poll_interval: PollIntervalSetting,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            update_timeout: default_update_timeout(),
            poll_interval: PollIntervalSetting::default(),
        }
    }
}

fn default_timeout() -> u64 {
    6
}
fn default_update_timeout() -> u64 {
    60
}
fn default_port() -> u16 {
    443
}

/// Poll interval as written in TOML: seconds, or `"scaled"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PollIntervalSetting {
    Seconds(u64),
    Named(String),
}

impl Default for PollIntervalSetting {
    fn default() -> Self {
        Self::Seconds(8)
    }
}

impl PollIntervalSetting {
    pub fn to_poll_interval(&self) -> Result<PollInterval, ConfigError> {
        match self {
            Self::Seconds(0) => Err(ConfigError::Validation {
                field: "poll_interval".into(),
                reason: "must be at least 1 second".into(),
            }),
            Self::Seconds(secs) => Ok(PollInterval::Fixed(Duration::from_secs(*secs))),
            Self::Named(name) if name.eq_ignore_ascii_case("scaled") => {
                Ok(PollInterval::ScaledByDeviceCount)
            }
            Self::Named(other) => Err(ConfigError::Validation {
                field: "poll_interval".into(),
                reason: format!("expected seconds or 'scaled', got '{other}'"),
            }),
        }
    }
}

/// A named web server profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Host name or IP address of the web server.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub scheme: Scheme,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Where to keep the web server's root CA certificate.
    pub certificate: Option<PathBuf>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override poll interval.
    pub poll_interval: Option<PollIntervalSetting>,

    /// Allow TLS 1.0 to 1.2 through the platform TLS library for old firmware.
    #[serde(default)]
    pub legacy_tls: bool,

    pub global_channel_id: Option<String>,

    /// Platforms not to expose.
    #[serde(default)]
    pub ignore: Vec<Platform>,

    #[serde(default)]
    pub device_overrides: Vec<OverrideRule>,
}

impl Profile {
    /// A profile with defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            scheme: Scheme::default(),
            username: None,
            password: None,
            password_env: None,
            certificate: None,
            timeout: None,
            poll_interval: None,
            legacy_tls: false,
            global_channel_id: None,
            ignore: Vec::new(),
            device_overrides: Vec::new(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "byme", "byme").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("byme");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + environment.
///
/// Environment variables use the `BYME_` prefix with `__` between keys,
/// e.g. `BYME_PROFILES__HOME__HOST`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BYME_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

/// Pick the named profile, else the configured default.
pub fn select_profile<'a>(
    cfg: &'a Config,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = name
        .or(cfg.default_profile.as_deref())
        .unwrap_or("default");
    cfg.profiles
        .get(name)
        .map(|profile| (name, profile))
        .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the login name for a profile.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var("BYME_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: `password_env`, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to core config ──────────────────────────────────────

/// Build a `ControllerConfig` from a profile and the global defaults.
///
/// Override rules are compiled here, so a bad regex fails at load time.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;

    let overrides =
        RuleSet::compile(&profile.device_overrides).map_err(|e| ConfigError::Validation {
            field: "device_overrides".into(),
            reason: e.to_string(),
        })?;

    let poll_interval = profile
        .poll_interval
        .as_ref()
        .unwrap_or(&defaults.poll_interval)
        .to_poll_interval()?;

    Ok(ControllerConfig {
        host: profile.host.trim().to_owned(),
        port: profile.port,
        scheme: profile.scheme,
        username,
        password,
        certificate: profile.certificate.clone(),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        update_timeout: Duration::from_secs(defaults.update_timeout),
        legacy_tls: profile.legacy_tls,
        global_channel_id: profile.global_channel_id.clone(),
        ignore: profile.ignore.clone(),
        overrides,
        poll_interval,
    })
}
