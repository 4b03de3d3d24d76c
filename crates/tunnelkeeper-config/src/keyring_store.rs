// ── Keyring settings store ──
//
// Each record is one keyring entry under the service name, keyed by the
// record name. Values are the JSON produced by the core's store methods.

use tracing::{debug, warn};

use tunnelkeeper_core::{SettingsKey, SettingsStore, StoreError};

/// Settings store backed by the platform keyring.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new("tunnelkeeper")
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: SettingsKey) -> Result<keyring::Entry, StoreError> {
        keyring::Entry::new(&self.service, key.as_ref()).map_err(backend)
    }
}

fn backend(err: keyring::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Raw record bytes from a keyring lookup. A value that is not UTF-8 is
/// handed on as-is so it fails decoding like any other corrupt record.
fn record_bytes(
    key: SettingsKey,
    lookup: Result<String, keyring::Error>,
) -> Result<Vec<u8>, StoreError> {
    match lookup {
        Ok(value) => Ok(value.into_bytes()),
        Err(keyring::Error::NoEntry) => Err(StoreError::NotFound(key)),
        Err(keyring::Error::BadEncoding(raw)) => {
            warn!(record = %key, "keyring value is not UTF-8");
            Ok(raw)
        }
        Err(e) => Err(backend(e)),
    }
}

fn deletion(key: SettingsKey, result: Result<(), keyring::Error>) -> Result<(), StoreError> {
    match result {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => {
            debug!(record = %key, "nothing to delete");
            Ok(())
        }
        Err(e) => Err(backend(e)),
    }
}

impl SettingsStore for KeyringStore {
    fn read(&self, key: SettingsKey) -> Result<Vec<u8>, StoreError> {
        record_bytes(key, self.entry(key)?.get_password())
    }

    fn write(&self, key: SettingsKey, data: &[u8]) -> Result<(), StoreError> {
        let value = std::str::from_utf8(data)
            .map_err(|e| StoreError::Backend(format!("{key} is not UTF-8: {e}")))?;
        self.entry(key)?.set_password(value).map_err(backend)
    }

    fn delete(&self, key: SettingsKey) -> Result<(), StoreError> {
        deletion(key, self.entry(key)?.delete_credential())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tunnelkeeper_core::MemoryStore;

    use super::*;

    #[test]
    fn missing_entry_is_not_found() {
        let err = record_bytes(SettingsKey::Settings, Err(keyring::Error::NoEntry)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn non_utf8_value_is_a_decode_error() {
        let raw = vec![0xff, 0xfe, 0x7b];
        let bytes = record_bytes(
            SettingsKey::DeviceState,
            Err(keyring::Error::BadEncoding(raw.clone())),
        )
        .unwrap();
        assert_eq!(bytes, raw);

        let store = MemoryStore::new();
        store.write(SettingsKey::DeviceState, &bytes).unwrap();
        assert!(store.read_device_state().unwrap_err().is_decode());
    }

    #[test]
    fn other_keyring_failures_are_backend_errors() {
        let err = record_bytes(
            SettingsKey::Settings,
            Err(keyring::Error::Invalid("service".into(), "empty".into())),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn deleting_a_missing_entry_succeeds() {
        deletion(SettingsKey::LastUsedAccount, Err(keyring::Error::NoEntry)).unwrap();
        assert!(deletion(
            SettingsKey::LastUsedAccount,
            Err(keyring::Error::Invalid("user".into(), "empty".into())),
        )
        .is_err());
    }

    #[test]
    fn default_service_name() {
        assert_eq!(KeyringStore::default().service(), "tunnelkeeper");
        assert_eq!(KeyringStore::new("other").service(), "other");
    }
}
