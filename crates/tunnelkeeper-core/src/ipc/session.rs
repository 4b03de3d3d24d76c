use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{IpcError, TunnelIpcRequest, TunnelIpcResponse};
use crate::error::CoreError;
use crate::model::{PacketTunnelStatus, RelaySelectorResult};
use crate::operation::{Operation, OperationContext, OperationOptions};
use crate::runner::{Tunnel, TunnelHandle};

/// IPC session bound to one runner.
///
/// Every request takes the caller's cancellation token as parent, so
/// cancelling the calling operation cancels the outstanding request.
#[derive(Debug, Clone)]
pub struct TunnelIpcSession {
    tunnel: Arc<Tunnel>,
}

impl TunnelIpcSession {
    pub fn new(tunnel: Arc<Tunnel>) -> Self {
        Self { tunnel }
    }

    pub async fn get_tunnel_status(
        &self,
        parent: &CancellationToken,
    ) -> Result<PacketTunnelStatus, CoreError> {
        match self.send(TunnelIpcRequest::GetTunnelStatus, parent).await? {
            TunnelIpcResponse::TunnelStatus(status) => Ok(status),
            TunnelIpcResponse::Ack => Err(IpcError::UnexpectedResponse.into()),
        }
    }

    pub async fn reconnect_tunnel(
        &self,
        relay: Option<RelaySelectorResult>,
        parent: &CancellationToken,
    ) -> Result<(), CoreError> {
        self.expect_ack(TunnelIpcRequest::ReconnectTunnel { relay }, parent)
            .await
    }

    pub async fn reload_tunnel_settings(&self, parent: &CancellationToken) -> Result<(), CoreError> {
        self.expect_ack(TunnelIpcRequest::ReloadTunnelSettings, parent)
            .await
    }

    async fn expect_ack(
        &self,
        request: TunnelIpcRequest,
        parent: &CancellationToken,
    ) -> Result<(), CoreError> {
        match self.send(request, parent).await? {
            TunnelIpcResponse::Ack => Ok(()),
            TunnelIpcResponse::TunnelStatus(_) => Err(IpcError::UnexpectedResponse.into()),
        }
    }

    async fn send(
        &self,
        request: TunnelIpcRequest,
        parent: &CancellationToken,
    ) -> Result<TunnelIpcResponse, CoreError> {
        let operation = SendIpcRequest {
            handle: Arc::clone(self.tunnel.handle()),
            timeout: self.tunnel.ipc_timeout(),
            request,
        };
        self.tunnel
            .ipc_queue()
            .add_with(operation, OperationOptions::new().child_of(parent))
            .result()
            .await
    }
}

struct SendIpcRequest {
    handle: Arc<dyn TunnelHandle>,
    timeout: Duration,
    request: TunnelIpcRequest,
}

#[async_trait]
impl Operation for SendIpcRequest {
    type Output = TunnelIpcResponse;

    fn name(&self) -> &'static str {
        self.request.name()
    }

    async fn run(self, _ctx: OperationContext) -> Result<TunnelIpcResponse, CoreError> {
        let status = self.handle.status();
        if !status.accepts_ipc() {
            debug!(request = self.request.name(), %status, "runner is not accepting IPC");
            return Err(IpcError::TunnelDown.into());
        }

        let message = self.request.encode()?;
        let reply = tokio::time::timeout(self.timeout, self.handle.send_message(message))
            .await
            .map_err(|_| IpcError::Timeout(self.timeout))?
            .map_err(|e| IpcError::Send(e.to_string()))?;

        TunnelIpcResponse::decode(&reply).map_err(|e| {
            warn!(request = self.request.name(), error = %e, "undecodable IPC reply");
            e.into()
        })
    }
}
