use async_trait::async_trait;
use tracing::info;

use super::Services;
use crate::error::CoreError;
use crate::ipc::TunnelIpcSession;
use crate::operation::{Operation, OperationContext};

/// Ask the runner to reconnect, optionally to a freshly selected relay.
pub(crate) struct ReconnectTunnel {
    services: Services,
    select_new_relay: bool,
}

impl ReconnectTunnel {
    pub(crate) fn new(services: Services, select_new_relay: bool) -> Self {
        Self {
            services,
            select_new_relay,
        }
    }
}

#[async_trait]
impl Operation for ReconnectTunnel {
    type Output = ();

    fn name(&self) -> &'static str {
        "reconnect-tunnel"
    }

    async fn run(self, ctx: OperationContext) -> Result<(), CoreError> {
        let tunnel = self.services.tunnel()?;
        let relay = if self.select_new_relay {
            Some(self.services.select_relay()?)
        } else {
            None
        };

        if let Some(relay) = &relay {
            info!(relay = %relay.relay.hostname, "reconnecting to new relay");
        }
        TunnelIpcSession::new(tunnel)
            .reconnect_tunnel(relay, ctx.token())
            .await
    }
}
