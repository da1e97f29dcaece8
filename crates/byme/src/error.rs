//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use byme_config::ConfigError;
use byme_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the By-me web server")]
    #[diagnostic(
        code(byme::connection_failed),
        help(
            "Check that the web server is powered and reachable.\n\
             Detail: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(byme::auth_failed),
        help(
            "Verify username and password for profile '{profile}'.\n\
             The web server only accepts users enabled for remote access."
        )
    )]
    AuthFailed { message: String, profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(byme::no_credentials),
        help(
            "Set username/password in the profile, point password_env at a\n\
             variable, or store the password in the system keyring."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(byme::not_found),
        help("Run: byme {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Web server error: {message}")]
    #[diagnostic(code(byme::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(byme::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(byme::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(byme::no_config),
        help("Create a profile in the config file.\nExpected at: {path}")
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(byme::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Web server did not answer within {seconds}s")]
    #[diagnostic(
        code(byme::timeout),
        help("Raise timeout or update_timeout in the config, or check the web server load.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(byme::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to authentication failures.
    pub fn with_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                message,
                profile: profile.to_owned(),
            },
            other => other,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::ControllerDisconnected => CliError::ConnectionFailed {
                reason: "connection to the web server was lost".into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                message,
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },

            CoreError::StatusNotFound {
                object_id,
                status_name,
            } => CliError::NotFound {
                resource_type: "status".into(),
                identifier: status_name,
                list_command: format!("status {object_id}"),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::UpdateFailed { message } | CoreError::Api { message } => {
                CliError::ApiError { message }
            }
        }
    }
}
