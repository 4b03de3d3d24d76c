use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::Services;
use crate::error::CoreError;
use crate::operation::{Operation, OperationContext};
use crate::store::{SettingsKey, SettingsStore, StoreError};

/// Load the runner registration and persisted state into the interactor.
pub(crate) struct LoadConfiguration {
    services: Services,
}

impl LoadConfiguration {
    pub(crate) fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Operation for LoadConfiguration {
    type Output = ();

    fn name(&self) -> &'static str {
        "load-configuration"
    }

    async fn run(self, _ctx: OperationContext) -> Result<(), CoreError> {
        let Self { services } = self;
        let interactor = &services.interactor;

        let handles = services.provider.load_all().await.map_err(|e| {
            error!(error = %e, "failed to load tunnel configurations");
            CoreError::from(e)
        })?;

        let store = interactor.store().as_ref();
        let settings = recover(store, SettingsKey::Settings, store.read_settings());
        let device_state = recover(store, SettingsKey::DeviceState, store.read_device_state());
        let has_device_state = device_state.is_some();

        interactor.set_settings(settings.unwrap_or_default(), false);
        interactor.set_device_state(device_state.unwrap_or_default(), false);

        match handles.into_iter().next() {
            Some(handle) if !has_device_state => {
                info!("removing tunnel configuration without device state");
                if let Err(e) = handle.remove().await {
                    error!(error = %e, "failed to remove orphaned tunnel configuration");
                }
                interactor.set_tunnel(None, true);
            }
            Some(handle) => interactor.set_tunnel(Some(services.wrap(handle)), true),
            None => interactor.set_tunnel(None, true),
        }

        Ok(())
    }
}

/// Missing records are normal. Corrupt ones are deleted. Either way the
/// caller falls back to defaults.
fn recover<T>(store: &dyn SettingsStore, key: SettingsKey, read: Result<T, StoreError>) -> Option<T> {
    match read {
        Ok(value) => Some(value),
        Err(StoreError::NotFound(_)) => {
            debug!(record = %key, "no stored record");
            None
        }
        Err(e) if e.is_decode() => {
            warn!(record = %key, error = %e, "deleting undecodable record");
            if let Err(e) = store.delete(key) {
                error!(record = %key, error = %e, "failed to delete record");
            }
            None
        }
        Err(e) => {
            error!(record = %key, error = %e, "failed to read record");
            None
        }
    }
}
