// ── Tunnel operations ──
//
// One type per state-machine action. Every operation re-reads interactor
// state when it runs and again after each suspension point; nothing is
// captured at construction time besides the request arguments.

mod load_configuration;
mod reconnect_tunnel;
mod reload_tunnel;
mod rotate_key;
mod set_account;
mod start_tunnel;
mod stop_tunnel;
mod update_account_data;
mod update_device_data;
mod update_settings;

use std::sync::Arc;

pub(crate) use load_configuration::LoadConfiguration;
pub(crate) use reconnect_tunnel::ReconnectTunnel;
pub(crate) use reload_tunnel::ReloadTunnel;
pub(crate) use rotate_key::RotateKey;
pub(crate) use set_account::SetAccount;
pub use set_account::SetAccountAction;
pub(crate) use start_tunnel::StartTunnel;
pub(crate) use stop_tunnel::StopTunnel;
pub(crate) use update_account_data::UpdateAccountData;
pub(crate) use update_device_data::UpdateDeviceData;
pub(crate) use update_settings::UpdateSettings;
pub use update_settings::SettingsChange;

use crate::config::TunnelManagerConfig;
use crate::error::CoreError;
use crate::interactor::TunnelInteractor;
use crate::model::{AccountData, DeviceData, DeviceState, RelaySelectorResult};
use crate::proxy::{AccountsProxy, DevicesProxy};
use crate::relay::{RelayCache, select_relay};
use crate::runner::{Tunnel, TunnelProvider};

/// Everything an operation may touch.
#[derive(Clone)]
pub(crate) struct Services {
    pub interactor: Arc<TunnelInteractor>,
    pub provider: Arc<dyn TunnelProvider>,
    pub relay_cache: Arc<dyn RelayCache>,
    pub accounts: Arc<dyn AccountsProxy>,
    pub devices: Arc<dyn DevicesProxy>,
    pub config: TunnelManagerConfig,
}

impl Services {
    /// Current account and device, or `InvalidDeviceState`.
    fn logged_in(&self) -> Result<(AccountData, DeviceData), CoreError> {
        match &*self.interactor.device_state() {
            DeviceState::LoggedIn(account, device) => Ok((account.clone(), device.clone())),
            DeviceState::LoggedOut | DeviceState::Revoked => Err(CoreError::InvalidDeviceState),
        }
    }

    fn tunnel(&self) -> Result<Arc<Tunnel>, CoreError> {
        self.interactor.tunnel().ok_or(CoreError::UnsetTunnel)
    }

    /// Apply the current relay constraints to the cached relay list.
    fn select_relay(&self) -> Result<RelaySelectorResult, CoreError> {
        let cached = self
            .relay_cache
            .read()
            .ok_or(CoreError::RelayListUnavailable)?;
        let settings = self.interactor.settings();
        select_relay(&cached.relays, &settings.relay_constraints)
            .ok_or(CoreError::CannotSatisfyRelayConstraints)
    }

    fn wrap(&self, handle: Arc<dyn crate::runner::TunnelHandle>) -> Arc<Tunnel> {
        Arc::new(Tunnel::new(handle, self.config.ipc_timeout))
    }
}
