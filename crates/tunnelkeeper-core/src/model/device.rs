// ── Device state ──
//
// `DeviceState` is the closed set of login states. Anything that needs an
// account must match `LoggedIn` and fail with `InvalidDeviceState` otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountData;
use super::keys::PrivateKey;

/// The device's private key and when it was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyData {
    pub creation_date: DateTime<Utc>,
    pub private_key: PrivateKey,
}

impl KeyData {
    /// Fresh key data stamped with the current time.
    pub fn new(private_key: PrivateKey) -> Self {
        Self {
            creation_date: Utc::now(),
            private_key,
        }
    }
}

/// Locally stored view of the device registered on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub creation_date: DateTime<Utc>,
    pub identifier: String,
    pub name: String,
    pub hijack_dns: bool,
    pub ipv4_address: String,
    pub ipv6_address: String,
    pub key_data: KeyData,
}

impl DeviceData {
    /// Build from a backend device record and the locally generated key.
    pub fn new(device: &tunnelkeeper_api::Device, key_data: KeyData) -> Self {
        Self {
            creation_date: device.created,
            identifier: device.id.clone(),
            name: device.name.clone(),
            hijack_dns: device.hijack_dns,
            ipv4_address: device.ipv4_address.clone(),
            ipv6_address: device.ipv6_address.clone(),
            key_data,
        }
    }

    /// Refresh every backend-owned field. Key data is left alone.
    pub fn update_from(&mut self, device: &tunnelkeeper_api::Device) {
        self.creation_date = device.created;
        self.identifier.clone_from(&device.id);
        self.name.clone_from(&device.name);
        self.hijack_dns = device.hijack_dns;
        self.ipv4_address.clone_from(&device.ipv4_address);
        self.ipv6_address.clone_from(&device.ipv6_address);
    }

    /// Device name with each word capitalized, e.g. "Tidy Otter".
    pub fn display_name(&self) -> String {
        self.name
            .split(' ')
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Login state of this device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    LoggedIn(AccountData, DeviceData),
    #[default]
    LoggedOut,
    Revoked,
}

impl DeviceState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(..))
    }

    pub fn account_data(&self) -> Option<&AccountData> {
        match self {
            Self::LoggedIn(account, _) => Some(account),
            Self::LoggedOut | Self::Revoked => None,
        }
    }

    pub fn device_data(&self) -> Option<&DeviceData> {
        match self {
            Self::LoggedIn(_, device) => Some(device),
            Self::LoggedOut | Self::Revoked => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn api_device(name: &str) -> tunnelkeeper_api::Device {
        tunnelkeeper_api::Device {
            id: "dev-1".into(),
            name: name.into(),
            pubkey: String::new(),
            hijack_dns: true,
            created: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ipv4_address: "10.64.0.2/32".into(),
            ipv6_address: "fc00::2/128".into(),
        }
    }

    #[test]
    fn update_keeps_key_data() {
        let key_data = KeyData::new(PrivateKey::generate());
        let mut device = DeviceData::new(&api_device("tidy otter"), key_data.clone());

        device.update_from(&api_device("brave fox"));

        assert_eq!(device.name, "brave fox");
        assert_eq!(device.key_data, key_data);
    }

    #[test]
    fn display_name_capitalizes_words() {
        let device = DeviceData::new(&api_device("tidy otter"), KeyData::new(PrivateKey::generate()));
        assert_eq!(device.display_name(), "Tidy Otter");
    }

    #[test]
    fn device_state_round_trips_through_json() {
        let state = DeviceState::LoggedIn(
            AccountData {
                identifier: "acc-1".into(),
                number: "1234".into(),
                expiry: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            },
            DeviceData::new(&api_device("tidy otter"), KeyData::new(PrivateKey::generate())),
        );

        let json = serde_json::to_string(&state).unwrap();
        let restored: DeviceState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, state);
        assert_eq!(
            serde_json::to_string(&DeviceState::LoggedOut).unwrap(),
            "\"logged_out\""
        );
    }
}
