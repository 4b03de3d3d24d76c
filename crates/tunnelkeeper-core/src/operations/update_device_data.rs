use async_trait::async_trait;
use tracing::{debug, warn};

use super::Services;
use crate::error::CoreError;
use crate::model::{DeviceData, DeviceState};
use crate::operation::{Operation, OperationContext};

/// Refresh the stored device from the backend.
pub(crate) struct UpdateDeviceData {
    services: Services,
}

impl UpdateDeviceData {
    pub(crate) fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Operation for UpdateDeviceData {
    type Output = DeviceData;

    fn name(&self) -> &'static str {
        "update-device-data"
    }

    async fn run(self, _ctx: OperationContext) -> Result<DeviceData, CoreError> {
        let (account, device) = self.services.logged_in()?;
        let Some(remote) = self
            .services
            .devices
            .get_device(&account.number, &device.identifier, self.services.config.retry)
            .await?
        else {
            warn!(device = %device.identifier, "device no longer exists on the backend");
            return Err(CoreError::DeviceRevoked);
        };

        let interactor = &self.services.interactor;
        let DeviceState::LoggedIn(account, mut device) = (*interactor.device_state()).clone() else {
            warn!("device logged out while fetching device data");
            return Err(CoreError::InvalidDeviceState);
        };
        device.update_from(&remote);
        interactor.set_device_state(DeviceState::LoggedIn(account, device.clone()), true);

        debug!(device = %device.name, "device data updated");
        Ok(device)
    }
}
