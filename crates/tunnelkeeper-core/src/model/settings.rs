// ── Tunnel settings ──
//
// Settings are replaced wholesale; nothing merges individual fields across
// logins.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// `Any` or a specific value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint<T> {
    #[default]
    Any,
    Only(T),
}

impl<T> Constraint<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Any => None,
            Self::Only(v) => Some(v),
        }
    }
}

/// Location filter, narrowing from country to a single host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationConstraint {
    Country(String),
    City(String, String),
    Hostname(String, String, String),
}

impl fmt::Display for LocationConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Country(country) => write!(f, "{country}"),
            Self::City(country, city) => write!(f, "{country}-{city}"),
            Self::Hostname(_, _, hostname) => write!(f, "{hostname}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConstraints {
    pub location: Constraint<LocationConstraint>,
    #[serde(default)]
    pub port: Constraint<u16>,
}

impl Default for RelayConstraints {
    fn default() -> Self {
        Self {
            location: Constraint::Only(LocationConstraint::Country("se".into())),
            port: Constraint::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DnsSettings {
    #[serde(default)]
    pub block_ads: bool,
    #[serde(default)]
    pub block_trackers: bool,
    #[serde(default)]
    pub enable_custom_dns: bool,
    #[serde(default)]
    pub custom_dns_domains: Vec<IpAddr>,
}

impl DnsSettings {
    /// Custom DNS only applies when enabled and at least one server is set.
    pub fn effective_custom_dns(&self) -> bool {
        self.enable_custom_dns && !self.custom_dns_domains.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub relay_constraints: RelayConstraints,
    #[serde(default)]
    pub dns_settings: DnsSettings,
}
