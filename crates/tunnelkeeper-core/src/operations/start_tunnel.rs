use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::Services;
use crate::error::CoreError;
use crate::model::{ActionAfterDisconnect, TunnelState};
use crate::operation::{Operation, OperationContext};
use crate::runner::PacketTunnelOptions;

/// Bring the tunnel up, or queue a restart behind an in-flight disconnect.
pub(crate) struct StartTunnel {
    services: Services,
}

impl StartTunnel {
    pub(crate) fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Operation for StartTunnel {
    type Output = ();

    fn name(&self) -> &'static str {
        "start-tunnel"
    }

    async fn run(self, _ctx: OperationContext) -> Result<(), CoreError> {
        self.services.logged_in()?;

        match self.services.interactor.tunnel_status().state {
            TunnelState::Disconnecting(ActionAfterDisconnect::Nothing) => {
                info!("start requested while disconnecting, reconnecting afterwards");
                self.services
                    .interactor
                    .update_tunnel_state(TunnelState::Disconnecting(ActionAfterDisconnect::Reconnect));
                Ok(())
            }
            TunnelState::Disconnected | TunnelState::PendingReconnect | TunnelState::Error(_) => {
                self.start().await
            }
            state => {
                debug!(%state, "tunnel already starting or running");
                Ok(())
            }
        }
    }
}

impl StartTunnel {
    async fn start(self) -> Result<(), CoreError> {
        let Self { services } = self;
        let interactor = &services.interactor;
        let selector_result = services.select_relay()?;

        let (tunnel, is_new) = match interactor.tunnel() {
            Some(tunnel) => (tunnel, false),
            None => {
                let handle = services
                    .provider
                    .load_all()
                    .await?
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| services.provider.make_handle());
                (services.wrap(handle), true)
            }
        };

        let mut configuration = tunnel.configuration();
        configuration.is_enabled = true;
        configuration.is_on_demand_enabled = true;
        tunnel.save_configuration(configuration).await.map_err(|e| {
            error!(error = %e, "failed to save tunnel configuration");
            CoreError::from(e)
        })?;

        if is_new {
            interactor.set_tunnel(Some(Arc::clone(&tunnel)), false);
        }
        interactor.reset_tunnel_state(TunnelState::Connecting(Some(selector_result.clone())));

        let mut options = PacketTunnelOptions::new();
        if let Err(e) = options.set_selector_result(&selector_result) {
            warn!(error = %e, "failed to encode relay selector result");
        }

        if let Err(e) = tunnel.start(options).await {
            error!(error = %e, "failed to start tunnel");
            interactor.reset_tunnel_state(TunnelState::Error(e.to_string()));
            return Err(e.into());
        }

        info!(relay = %selector_result.relay.hostname, "tunnel starting");
        Ok(())
    }
}
