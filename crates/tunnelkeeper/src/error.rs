//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tunnelkeeper_api::ErrorKind;
use tunnelkeeper_config::ConfigError;
use tunnelkeeper_core::{CoreError, IpcError};

/// Process exit codes.
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
    // ── Account ──────────────────────────────────────────────────────
    #[error("Not logged in")]
    #[diagnostic(
        code(tunnelkeeper::not_logged_in),
        help("Log in with: tunnelkeeper account login\nOr create an account with: tunnelkeeper account create")
    )]
    NotLoggedIn,

    #[error("This device has been revoked")]
    #[diagnostic(
        code(tunnelkeeper::revoked),
        help("The device was removed from the account. Log in again with: tunnelkeeper account login")
    )]
    DeviceRevoked,

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Could not reach the backend: {message}")]
    #[diagnostic(
        code(tunnelkeeper::backend_unreachable),
        help("Check your network connection and the api_url setting.\nSee: tunnelkeeper config show")
    )]
    BackendUnreachable { message: String },

    #[error("Backend error ({code}): {message}")]
    #[diagnostic(code(tunnelkeeper::api_error))]
    Api { code: String, message: String },

    // ── Relays ───────────────────────────────────────────────────────
    #[error("No relay list available")]
    #[diagnostic(
        code(tunnelkeeper::no_relays),
        help("Expected a relay list at: {path}")
    )]
    NoRelays { path: String },

    #[error("No relay matches the current constraints")]
    #[diagnostic(
        code(tunnelkeeper::no_matching_relay),
        help("List relays with: tunnelkeeper relays\nThen adjust with: tunnelkeeper constraints set")
    )]
    NoMatchingRelay,

    // ── Tunnel ───────────────────────────────────────────────────────
    #[error("The tunnel is not running")]
    #[diagnostic(
        code(tunnelkeeper::tunnel_down),
        help("Start it with: tunnelkeeper connect")
    )]
    TunnelDown,

    #[error("Tunnel runner error: {message}")]
    #[diagnostic(
        code(tunnelkeeper::runner),
        help("Check the runner.command setting and run with -vv for details.")
    )]
    Runner { message: String },

    #[error("Tunnel runner failed to answer: {message}")]
    #[diagnostic(code(tunnelkeeper::ipc))]
    Ipc { message: String },

    #[error("Tunnel failed: {cause}")]
    #[diagnostic(code(tunnelkeeper::tunnel_failed))]
    TunnelFailed { cause: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(code(tunnelkeeper::timeout))]
    Timeout { what: String, seconds: u64 },

    #[error("Operation cancelled")]
    #[diagnostic(code(tunnelkeeper::cancelled))]
    Cancelled,

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Settings store error: {message}")]
    #[diagnostic(
        code(tunnelkeeper::store),
        help("Settings are kept in the system keyring; make sure it is unlocked.")
    )]
    Store { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tunnelkeeper::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(tunnelkeeper::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(tunnelkeeper::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(tunnelkeeper::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotLoggedIn | Self::DeviceRevoked => exit_code::AUTH,
            Self::NoRelays { .. } | Self::NoMatchingRelay => exit_code::NOT_FOUND,
            Self::BackendUnreachable { .. } | Self::TunnelDown => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDeviceState => Self::NotLoggedIn,
            CoreError::DeviceRevoked => Self::DeviceRevoked,
            CoreError::UnsetTunnel | CoreError::Ipc(IpcError::TunnelDown) => Self::TunnelDown,

            CoreError::RelayListUnavailable => Self::NoRelays {
                path: "(relay cache)".into(),
            },
            CoreError::CannotSatisfyRelayConstraints => Self::NoMatchingRelay,

            CoreError::SystemVpn(e) => Self::Runner {
                message: e.to_string(),
            },
            CoreError::SettingsStore(e) => Self::Store {
                message: e.to_string(),
            },

            CoreError::Ipc(IpcError::Timeout(after)) => Self::Timeout {
                what: "the tunnel runner".into(),
                seconds: after.as_secs(),
            },
            CoreError::Ipc(e) => Self::Ipc {
                message: e.to_string(),
            },

            CoreError::Rest(e) => match (e.kind(), e.as_ref()) {
                (ErrorKind::Network, _) => Self::BackendUnreachable {
                    message: e.to_string(),
                },
                (
                    _,
                    tunnelkeeper_api::Error::Server {
                        code: Some(code),
                        message,
                        ..
                    },
                ) => Self::Api {
                    code: code.clone(),
                    message: message.clone(),
                },
                (_, other) => Self::Api {
                    code: "unknown".into(),
                    message: other.to_string(),
                },
            },

            CoreError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<tunnelkeeper_api::Error> for CliError {
    fn from(err: tunnelkeeper_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
