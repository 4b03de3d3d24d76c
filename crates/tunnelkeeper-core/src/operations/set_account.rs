// Set-Account runs as a small task graph on a private queue:
//
//   delete-device? -> delete-settings -> create/fetch-account
//                                     -> create-device -> save-settings
//
// Device deletion is best effort. Settings are always cleared. The login
// half only runs if everything before it succeeded. Nothing already done
// is undone when a later step fails.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::Services;
use crate::error::CoreError;
use crate::model::{AccountData, DeviceData, DeviceState, KeyData, PrivateKey, Settings, TunnelState};
use crate::operation::{
    Completion, Condition, Operation, OperationContext, OperationHandle, OperationOptions,
    OperationQueue,
};

/// What Set-Account should leave the device logged into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetAccountAction {
    /// Create a fresh account and log into it.
    New,
    /// Log into the account with this number.
    Existing(String),
    /// Log out.
    Unset,
}

pub(crate) struct SetAccount {
    services: Services,
    action: SetAccountAction,
}

impl SetAccount {
    pub(crate) fn new(services: Services, action: SetAccountAction) -> Self {
        Self { services, action }
    }
}

const LOGIN_GUARD: Condition = Condition::NoFailedDependencies {
    ignore_cancellations: false,
};

#[async_trait]
impl Operation for SetAccount {
    type Output = Option<AccountData>;

    fn name(&self) -> &'static str {
        "set-account"
    }

    async fn run(self, ctx: OperationContext) -> Result<Option<AccountData>, CoreError> {
        let Self { services, action } = self;
        let queue = OperationQueue::new("set-account");
        let child = || OperationOptions::new().child_of(ctx.token());

        let delete_device = match &*services.interactor.device_state() {
            DeviceState::LoggedIn(account, device) => Some(queue.add_with(
                DeleteDevice {
                    services: services.clone(),
                    account_number: account.number.clone(),
                    device_id: device.identifier.clone(),
                },
                child(),
            )),
            DeviceState::LoggedOut | DeviceState::Revoked => None,
        };

        let delete_settings = queue.add_with(
            DeleteSettings {
                services: services.clone(),
            },
            child().depends_on_all(delete_device.as_ref().map(OperationHandle::dependency)),
        );

        let after_delete = || {
            child()
                .depends_on(delete_settings.dependency())
                .condition(LOGIN_GUARD)
        };
        let account = match action {
            SetAccountAction::Unset => None,
            SetAccountAction::New => Some(queue.add_with(
                CreateAccount {
                    services: services.clone(),
                },
                after_delete(),
            )),
            SetAccountAction::Existing(number) => Some(queue.add_with(
                FetchAccount {
                    services: services.clone(),
                    number,
                },
                after_delete(),
            )),
        };

        let login = account.map(|account| {
            let device = queue.add_with(
                CreateDevice {
                    services: services.clone(),
                    account: account.clone(),
                },
                child()
                    .depends_on(account.dependency())
                    .condition(LOGIN_GUARD),
            );
            let save = queue.add_with(
                SaveSettings {
                    services: services.clone(),
                    account: account.clone(),
                    device: device.clone(),
                },
                child().depends_on(device.dependency()).condition(LOGIN_GUARD),
            );
            (account, device, save)
        });

        if let Some(delete_device) = delete_device {
            if let Completion::Failure(e) = delete_device.completion().await {
                warn!(error = %e, "failed to delete device, continuing");
            }
        }

        // First failure in enqueue order wins.
        delete_settings.result().await?;
        let Some((account, device, save)) = login else {
            info!("logged out");
            return Ok(None);
        };
        account.result().await?;
        device.result().await?;
        let account = save.result().await?;

        info!(account = %account.identifier, "logged in");
        Ok(Some(account))
    }
}

// ── Child operations ─────────────────────────────────────────────────

struct DeleteDevice {
    services: Services,
    account_number: String,
    device_id: String,
}

#[async_trait]
impl Operation for DeleteDevice {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete-device"
    }

    async fn run(self, _ctx: OperationContext) -> Result<(), CoreError> {
        let deleted = self
            .services
            .devices
            .delete_device(&self.account_number, &self.device_id, self.services.config.retry)
            .await?;
        if !deleted {
            debug!(device = %self.device_id, "device was already gone");
        }
        Ok(())
    }
}

struct DeleteSettings {
    services: Services,
}

#[async_trait]
impl Operation for DeleteSettings {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete-settings"
    }

    async fn run(self, _ctx: OperationContext) -> Result<(), CoreError> {
        let interactor = &self.services.interactor;

        interactor.prepare_for_vpn_configuration_deletion();
        interactor.reset_tunnel_state(TunnelState::Disconnected);
        interactor.set_device_state(DeviceState::LoggedOut, true);
        interactor.set_settings(Settings::default(), true);

        if let Some(tunnel) = interactor.tunnel() {
            if let Err(e) = tunnel.remove_from_preferences().await {
                warn!(error = %e, "failed to remove tunnel configuration");
            }
        }
        interactor.set_tunnel(None, false);
        Ok(())
    }
}

struct CreateAccount {
    services: Services,
}

#[async_trait]
impl Operation for CreateAccount {
    type Output = AccountData;

    fn name(&self) -> &'static str {
        "create-account"
    }

    async fn run(self, _ctx: OperationContext) -> Result<AccountData, CoreError> {
        let account = self
            .services
            .accounts
            .create_account(self.services.config.retry)
            .await?;
        info!(account = %account.id, "created account");
        Ok(account.into())
    }
}

struct FetchAccount {
    services: Services,
    number: String,
}

#[async_trait]
impl Operation for FetchAccount {
    type Output = AccountData;

    fn name(&self) -> &'static str {
        "fetch-account"
    }

    async fn run(self, _ctx: OperationContext) -> Result<AccountData, CoreError> {
        let response = self
            .services
            .accounts
            .get_account_data(&self.number, self.services.config.retry)
            .await?;
        Ok(AccountData {
            identifier: response.id,
            number: self.number,
            expiry: response.expiry,
        })
    }
}

struct CreateDevice {
    services: Services,
    account: OperationHandle<AccountData>,
}

#[async_trait]
impl Operation for CreateDevice {
    type Output = (PrivateKey, tunnelkeeper_api::Device);

    fn name(&self) -> &'static str {
        "create-device"
    }

    async fn run(self, _ctx: OperationContext) -> Result<Self::Output, CoreError> {
        let account = self.account.result().await?;
        if let Err(e) = self
            .services
            .interactor
            .set_last_used_account(Some(&account.number))
        {
            warn!(error = %e, "failed to remember last used account");
        }

        let private_key = PrivateKey::generate();
        let device = self
            .services
            .devices
            .create_device(
                &account.number,
                &private_key.public_key(),
                false,
                self.services.config.retry,
            )
            .await?;
        info!(device = %device.name, "created device");
        Ok((private_key, device))
    }
}

struct SaveSettings {
    services: Services,
    account: OperationHandle<AccountData>,
    device: OperationHandle<(PrivateKey, tunnelkeeper_api::Device)>,
}

#[async_trait]
impl Operation for SaveSettings {
    type Output = AccountData;

    fn name(&self) -> &'static str {
        "save-settings"
    }

    async fn run(self, _ctx: OperationContext) -> Result<AccountData, CoreError> {
        let account = self.account.result().await?;
        let (private_key, device) = self.device.result().await?;

        let interactor = &self.services.interactor;
        interactor.set_settings(Settings::default(), true);
        interactor.set_device_state(
            DeviceState::LoggedIn(
                account.clone(),
                DeviceData::new(&device, KeyData::new(private_key)),
            ),
            true,
        );
        Ok(account)
    }
}
