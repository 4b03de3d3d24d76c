use async_trait::async_trait;
use tracing::{debug, error, info};

use super::Services;
use crate::error::CoreError;
use crate::model::{ActionAfterDisconnect, TunnelState};
use crate::operation::{Operation, OperationContext};

/// Disarm the connect rule and stop the runner.
pub(crate) struct StopTunnel {
    services: Services,
}

impl StopTunnel {
    pub(crate) fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Operation for StopTunnel {
    type Output = ();

    fn name(&self) -> &'static str {
        "stop-tunnel"
    }

    async fn run(self, _ctx: OperationContext) -> Result<(), CoreError> {
        let interactor = &self.services.interactor;

        match interactor.tunnel_status().state {
            TunnelState::Disconnecting(ActionAfterDisconnect::Reconnect) => {
                info!("cancelling pending restart");
                interactor
                    .update_tunnel_state(TunnelState::Disconnecting(ActionAfterDisconnect::Nothing));
                Ok(())
            }
            state if state.is_active() => {
                let Some(tunnel) = interactor.tunnel() else {
                    debug!(%state, "no tunnel to stop");
                    return Ok(());
                };

                let mut configuration = tunnel.configuration();
                configuration.is_on_demand_enabled = false;
                tunnel.save_configuration(configuration).await.map_err(|e| {
                    error!(error = %e, "failed to save tunnel configuration");
                    CoreError::from(e)
                })?;

                tunnel.stop().await;
                info!("tunnel stopping");
                Ok(())
            }
            state => {
                debug!(%state, "tunnel is not running");
                Ok(())
            }
        }
    }
}
