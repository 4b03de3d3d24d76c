// ── Core error types ──
//
// Every operation maps collaborator failures into exactly one of these
// kinds before completing; raw collaborator errors never escape the core.
// Sources are held in `Arc` so a completion can be cloned to every waiter.

use std::sync::Arc;

use thiserror::Error;

use crate::ipc::IpcError;
use crate::runner::RunnerError;
use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Precondition errors ──────────────────────────────────────────
    #[error("Tunnel is not set")]
    UnsetTunnel,

    #[error("Invalid device state")]
    InvalidDeviceState,

    #[error("Device has been revoked")]
    DeviceRevoked,

    // ── Relay errors ─────────────────────────────────────────────────
    #[error("Relay list is unavailable")]
    RelayListUnavailable,

    #[error("No relay satisfies the current constraints")]
    CannotSatisfyRelayConstraints,

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("System VPN error: {0}")]
    SystemVpn(#[source] Arc<RunnerError>),

    #[error("Settings store error: {0}")]
    SettingsStore(#[source] Arc<StoreError>),

    #[error("REST error: {0}")]
    Rest(#[source] Arc<tunnelkeeper_api::Error>),

    #[error("IPC error: {0}")]
    Ipc(#[source] IpcError),

    // ── Completion ───────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Sub-kind of a REST failure, if this is one.
    pub fn rest_kind(&self) -> Option<tunnelkeeper_api::ErrorKind> {
        match self {
            Self::Rest(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ── Conversion from collaborator errors ──────────────────────────────

impl From<tunnelkeeper_api::Error> for CoreError {
    fn from(err: tunnelkeeper_api::Error) -> Self {
        Self::Rest(Arc::new(err))
    }
}

impl From<RunnerError> for CoreError {
    fn from(err: RunnerError) -> Self {
        Self::SystemVpn(Arc::new(err))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        Self::SettingsStore(Arc::new(err))
    }
}

impl From<IpcError> for CoreError {
    fn from(err: IpcError) -> Self {
        Self::Ipc(err)
    }
}
