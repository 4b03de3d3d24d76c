use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use super::Services;
use crate::error::CoreError;
use crate::model::{DeviceState, KeyData, PrivateKey};
use crate::operation::{Operation, OperationContext};

/// Replace the device key. Yields `false` when throttled by the interval.
pub(crate) struct RotateKey {
    services: Services,
    rotation_interval: Option<Duration>,
}

impl RotateKey {
    pub(crate) fn new(services: Services, rotation_interval: Option<Duration>) -> Self {
        Self {
            services,
            rotation_interval,
        }
    }
}

#[async_trait]
impl Operation for RotateKey {
    type Output = bool;

    fn name(&self) -> &'static str {
        "rotate-key"
    }

    async fn run(self, _ctx: OperationContext) -> Result<bool, CoreError> {
        let Self {
            services,
            rotation_interval,
        } = self;
        let (account, device) = services.logged_in()?;

        if let Some(interval) = rotation_interval {
            let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
            let due = device.key_data.creation_date.checked_add_signed(interval);
            if due.is_none_or(|due| Utc::now() < due) {
                debug!(created = %device.key_data.creation_date, "key rotation not due yet");
                return Ok(false);
            }
        }

        let private_key = PrivateKey::generate();
        let public_key = private_key.public_key();
        let remote = services
            .devices
            .rotate_device_key(
                &account.number,
                &device.identifier,
                &public_key,
                services.config.retry,
            )
            .await?;

        let interactor = &services.interactor;
        let DeviceState::LoggedIn(account, mut device) = (*interactor.device_state()).clone() else {
            warn!("device logged out during key rotation");
            return Err(CoreError::InvalidDeviceState);
        };
        device.update_from(&remote);
        device.key_data = KeyData::new(private_key);
        interactor.set_device_state(DeviceState::LoggedIn(account, device), true);

        info!(%public_key, "rotated device key");
        Ok(true)
    }
}
