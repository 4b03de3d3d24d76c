use async_trait::async_trait;
use tracing::{debug, warn};

use super::Services;
use crate::error::CoreError;
use crate::ipc::{IpcError, TunnelIpcSession};
use crate::model::{DnsSettings, RelayConstraints, Settings};
use crate::operation::{Operation, OperationContext};

/// A replacement for one field of [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    RelayConstraints(RelayConstraints),
    DnsSettings(DnsSettings),
}

impl SettingsChange {
    fn apply(self, settings: &mut Settings) {
        match self {
            Self::RelayConstraints(constraints) => settings.relay_constraints = constraints,
            Self::DnsSettings(dns) => settings.dns_settings = dns,
        }
    }
}

/// Persist a settings change and tell the runner to pick it up.
pub(crate) struct UpdateSettings {
    services: Services,
    change: SettingsChange,
}

impl UpdateSettings {
    pub(crate) fn new(services: Services, change: SettingsChange) -> Self {
        Self { services, change }
    }
}

#[async_trait]
impl Operation for UpdateSettings {
    type Output = ();

    fn name(&self) -> &'static str {
        "update-settings"
    }

    async fn run(self, ctx: OperationContext) -> Result<(), CoreError> {
        let interactor = &self.services.interactor;
        let mut settings = (*interactor.settings()).clone();
        self.change.apply(&mut settings);
        interactor.set_settings(settings, true);

        let Some(tunnel) = interactor.tunnel() else {
            return Ok(());
        };
        match TunnelIpcSession::new(tunnel)
            .reload_tunnel_settings(ctx.token())
            .await
        {
            Ok(()) => Ok(()),
            Err(CoreError::Cancelled) => Err(CoreError::Cancelled),
            Err(CoreError::Ipc(IpcError::TunnelDown)) => {
                debug!("tunnel is down, settings apply on next start");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to reload tunnel settings");
                Ok(())
            }
        }
    }
}
