use async_trait::async_trait;
use tracing::{debug, warn};

use super::Services;
use crate::error::CoreError;
use crate::model::{AccountData, DeviceState};
use crate::operation::{Operation, OperationContext};

/// Refresh the account expiry from the backend.
pub(crate) struct UpdateAccountData {
    services: Services,
}

impl UpdateAccountData {
    pub(crate) fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Operation for UpdateAccountData {
    type Output = AccountData;

    fn name(&self) -> &'static str {
        "update-account-data"
    }

    async fn run(self, _ctx: OperationContext) -> Result<AccountData, CoreError> {
        let (account, _) = self.services.logged_in()?;
        let response = self
            .services
            .accounts
            .get_account_data(&account.number, self.services.config.retry)
            .await?;

        let interactor = &self.services.interactor;
        let DeviceState::LoggedIn(mut account, device) = (*interactor.device_state()).clone() else {
            warn!("device logged out while fetching account data");
            return Err(CoreError::InvalidDeviceState);
        };
        account.expiry = response.expiry;
        interactor.set_device_state(DeviceState::LoggedIn(account.clone(), device), true);

        debug!(expiry = %account.expiry, "account data updated");
        Ok(account)
    }
}
