// ── Runner IPC ──
//
// Request/response exchange with the tunnel runner. Messages are JSON
// objects tagged by `"type"`; the transport is whatever the runner handle
// provides. Each request runs as an operation on the tunnel's own IPC queue
// so at most one round-trip per runner is in flight.

mod messages;
mod session;

use std::time::Duration;

use thiserror::Error;

pub use messages::{TunnelIpcRequest, TunnelIpcResponse};
pub use session::TunnelIpcSession;

/// Default time to wait for the runner to answer.
pub const DEFAULT_IPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Runner communication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("Failed to encode IPC message: {0}")]
    Encode(String),

    #[error("Failed to decode IPC message: {0}")]
    Decode(String),

    #[error("Failed to deliver IPC message: {0}")]
    Send(String),

    #[error("IPC request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tunnel is down")]
    TunnelDown,

    #[error("Unexpected response")]
    UnexpectedResponse,
}
