// ── Settings store contract ──
//
// Durable key-value persistence for settings and device state. Backends
// implement raw byte access; JSON encoding is shared by the provided
// methods so every backend reports decode failures the same way.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::model::{DeviceState, Settings};

/// Records held by the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SettingsKey {
    Settings,
    DeviceState,
    LastUsedAccount,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(SettingsKey),

    #[error("Failed to decode {key}: {source}")]
    Decode {
        key: SettingsKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {key}: {source}")]
    Encode {
        key: SettingsKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("Settings backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Durable storage for settings, device state and the last used account.
pub trait SettingsStore: Send + Sync {
    /// Read a record. Missing records are `StoreError::NotFound`.
    fn read(&self, key: SettingsKey) -> Result<Vec<u8>, StoreError>;

    fn write(&self, key: SettingsKey, data: &[u8]) -> Result<(), StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    fn delete(&self, key: SettingsKey) -> Result<(), StoreError>;

    fn read_settings(&self) -> Result<Settings, StoreError> {
        read_json(self, SettingsKey::Settings)
    }

    fn write_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        write_json(self, SettingsKey::Settings, settings)
    }

    fn delete_settings(&self) -> Result<(), StoreError> {
        self.delete(SettingsKey::Settings)
    }

    fn read_device_state(&self) -> Result<DeviceState, StoreError> {
        read_json(self, SettingsKey::DeviceState)
    }

    fn write_device_state(&self, state: &DeviceState) -> Result<(), StoreError> {
        write_json(self, SettingsKey::DeviceState, state)
    }

    fn delete_device_state(&self) -> Result<(), StoreError> {
        self.delete(SettingsKey::DeviceState)
    }

    fn set_last_used_account(&self, number: Option<&str>) -> Result<(), StoreError> {
        match number {
            Some(number) => self.write(SettingsKey::LastUsedAccount, number.as_bytes()),
            None => self.delete(SettingsKey::LastUsedAccount),
        }
    }

    fn last_used_account(&self) -> Result<Option<String>, StoreError> {
        match self.read(SettingsKey::LastUsedAccount) {
            Ok(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn read_json<S, T>(store: &S, key: SettingsKey) -> Result<T, StoreError>
where
    S: SettingsStore + ?Sized,
    T: DeserializeOwned,
{
    let data = store.read(key)?;
    serde_json::from_slice(&data).map_err(|source| StoreError::Decode { key, source })
}

fn write_json<S, T>(store: &S, key: SettingsKey, value: &T) -> Result<(), StoreError>
where
    S: SettingsStore + ?Sized,
    T: Serialize,
{
    let data = serde_json::to_vec(value).map_err(|source| StoreError::Encode { key, source })?;
    store.write(key, &data)
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<SettingsKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: SettingsKey) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }
}

impl SettingsStore for MemoryStore {
    fn read(&self, key: SettingsKey) -> Result<Vec<u8>, StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(StoreError::NotFound(key))
    }

    fn write(&self, key: SettingsKey, data: &[u8]) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, data.to_vec());
        Ok(())
    }

    fn delete(&self, key: SettingsKey) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        Ok(())
    }
}
