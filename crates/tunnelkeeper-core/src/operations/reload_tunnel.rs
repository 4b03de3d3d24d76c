use async_trait::async_trait;

use super::Services;
use crate::error::CoreError;
use crate::ipc::TunnelIpcSession;
use crate::operation::{Operation, OperationContext};

/// Ask the runner to re-read persisted settings.
pub(crate) struct ReloadTunnel {
    services: Services,
}

impl ReloadTunnel {
    pub(crate) fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Operation for ReloadTunnel {
    type Output = ();

    fn name(&self) -> &'static str {
        "reload-tunnel"
    }

    async fn run(self, ctx: OperationContext) -> Result<(), CoreError> {
        let tunnel = self.services.tunnel()?;
        TunnelIpcSession::new(tunnel)
            .reload_tunnel_settings(ctx.token())
            .await
    }
}
