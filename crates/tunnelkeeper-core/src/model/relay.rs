// ── Relay list model ──

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic placement of a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayLocation {
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub city_code: String,
}

/// A selectable VPN server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub hostname: String,
    pub location: RelayLocation,
    pub active: bool,
    #[serde(default = "default_true")]
    pub include_in_country: bool,
    pub weight: u64,
    pub ipv4_addr_in: Ipv4Addr,
    #[serde(default)]
    pub ipv6_addr_in: Option<Ipv6Addr>,
    /// Relay WireGuard public key, base64.
    pub public_key: String,
}

fn default_true() -> bool {
    true
}

/// Inclusive range of WireGuard ports accepted by every relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayList {
    pub relays: Vec<Relay>,
    #[serde(default)]
    pub port_ranges: Vec<PortRange>,
}

/// Relay list as persisted by the relay cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRelays {
    pub relays: RelayList,
    pub updated_at: DateTime<Utc>,
}

/// Where to send WireGuard traffic for a chosen relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEndpoint {
    pub ipv4_relay: SocketAddrV4,
    pub ipv6_relay: Option<SocketAddrV6>,
    pub public_key: String,
}

/// Outcome of applying relay constraints to a relay list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySelectorResult {
    pub endpoint: RelayEndpoint,
    pub relay: Relay,
    pub location: RelayLocation,
}
