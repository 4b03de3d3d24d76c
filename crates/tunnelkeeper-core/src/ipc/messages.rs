use serde::{Deserialize, Serialize};

use super::IpcError;
use crate::model::{PacketTunnelStatus, RelaySelectorResult};

/// Requests the controller sends to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TunnelIpcRequest {
    GetTunnelStatus,
    /// Reconnect, optionally to a relay chosen by the controller. Without
    /// one the runner selects from its own cache and settings.
    ReconnectTunnel {
        #[serde(default)]
        relay: Option<RelaySelectorResult>,
    },
    ReloadTunnelSettings,
}

impl TunnelIpcRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetTunnelStatus => "get-tunnel-status",
            Self::ReconnectTunnel { .. } => "reconnect-tunnel",
            Self::ReloadTunnelSettings => "reload-tunnel-settings",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        serde_json::to_vec(self).map_err(|e| IpcError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, IpcError> {
        serde_json::from_slice(data).map_err(|e| IpcError::Decode(e.to_string()))
    }
}

/// Replies from the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TunnelIpcResponse {
    TunnelStatus(PacketTunnelStatus),
    Ack,
}

impl TunnelIpcResponse {
    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        serde_json::to_vec(self).map_err(|e| IpcError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, IpcError> {
        serde_json::from_slice(data).map_err(|e| IpcError::Decode(e.to_string()))
    }
}
