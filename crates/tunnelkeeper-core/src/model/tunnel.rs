// ── Tunnel state machine ──
//
// `TunnelState` is the controller-side view. The runner keeps its own copy
// and reports `RunnerStatus` changes; `TunnelState::next` folds those
// observations into the local state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::relay::RelaySelectorResult;

/// What to do once the runner reports it has disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionAfterDisconnect {
    Nothing,
    Reconnect,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    #[default]
    Disconnected,
    Connecting(Option<RelaySelectorResult>),
    Connected(RelaySelectorResult),
    Disconnecting(ActionAfterDisconnect),
    Reconnecting(RelaySelectorResult),
    /// Disconnected and waiting for a queued Start to bring it back up.
    PendingReconnect,
    Error(String),
}

impl TunnelState {
    /// Compute the next state after the runner reports `status`.
    ///
    /// `relay` is the relay the runner currently reports, if any.
    pub fn next(&self, status: RunnerStatus, relay: Option<RelaySelectorResult>) -> Self {
        match status {
            RunnerStatus::Connecting => Self::Connecting(relay),
            RunnerStatus::Connected => relay.map_or(Self::Connecting(None), Self::Connected),
            RunnerStatus::Reasserting => relay.map_or(Self::Connecting(None), Self::Reconnecting),
            RunnerStatus::Disconnecting => match self {
                Self::Disconnecting(ActionAfterDisconnect::Reconnect) => self.clone(),
                _ => Self::Disconnecting(ActionAfterDisconnect::Nothing),
            },
            RunnerStatus::Disconnected => match self {
                Self::Disconnecting(ActionAfterDisconnect::Reconnect) => Self::PendingReconnect,
                _ => Self::Disconnected,
            },
            RunnerStatus::Invalid => Self::Disconnected,
        }
    }

    pub fn relay(&self) -> Option<&RelaySelectorResult> {
        match self {
            Self::Connecting(relay) => relay.as_ref(),
            Self::Connected(relay) | Self::Reconnecting(relay) => Some(relay),
            _ => None,
        }
    }

    /// Whether a Stop request has anything to tear down.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting(_) | Self::Connected(_) | Self::Reconnecting(_) | Self::PendingReconnect
        )
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting(_) => f.write_str("connecting"),
            Self::Connected(_) => f.write_str("connected"),
            Self::Disconnecting(ActionAfterDisconnect::Nothing) => f.write_str("disconnecting"),
            Self::Disconnecting(ActionAfterDisconnect::Reconnect) => {
                f.write_str("disconnecting (reconnect)")
            }
            Self::Reconnecting(_) => f.write_str("reconnecting"),
            Self::PendingReconnect => f.write_str("pending reconnect"),
            Self::Error(cause) => write!(f, "error: {cause}"),
        }
    }
}

/// Status reported by the runner platform for a tunnel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    #[default]
    Invalid,
    Disconnected,
    Connecting,
    Connected,
    Reasserting,
    Disconnecting,
}

impl RunnerStatus {
    /// The runner only answers IPC while the tunnel is up or coming up.
    pub fn accepts_ipc(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reasserting)
    }
}

/// Tunnel status as observed by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketTunnelStatus {
    #[serde(default)]
    pub last_error: Option<String>,
    pub is_network_reachable: bool,
    #[serde(default)]
    pub connecting_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tunnel_relay: Option<RelaySelectorResult>,
}

/// Controller-side tunnel status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TunnelStatus {
    pub state: TunnelState,
    pub tunnel_relay: Option<RelaySelectorResult>,
    pub connecting_date: Option<DateTime<Utc>>,
    pub is_network_reachable: bool,
}

impl TunnelStatus {
    /// A fresh status in `state` with every other field reset.
    pub fn with_state(state: TunnelState) -> Self {
        let tunnel_relay = state.relay().cloned();
        Self {
            state,
            tunnel_relay,
            ..Self::default()
        }
    }

    /// Merge the runner's own view of the tunnel.
    pub fn apply_packet_status(&mut self, status: PacketTunnelStatus) {
        self.is_network_reachable = status.is_network_reachable;
        self.connecting_date = status.connecting_date;
        self.tunnel_relay = status.tunnel_relay;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::relay::{Relay, RelayEndpoint, RelayLocation};

    fn relay() -> RelaySelectorResult {
        let location = RelayLocation {
            country: "Sweden".into(),
            country_code: "se".into(),
            city: "Gothenburg".into(),
            city_code: "got".into(),
        };
        RelaySelectorResult {
            endpoint: RelayEndpoint {
                ipv4_relay: SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 51820),
                ipv6_relay: None,
                public_key: "pk".into(),
            },
            relay: Relay {
                hostname: "se-got-wg-001".into(),
                location: location.clone(),
                active: true,
                include_in_country: true,
                weight: 100,
                ipv4_addr_in: Ipv4Addr::new(10, 0, 0, 1),
                ipv6_addr_in: None,
                public_key: "pk".into(),
            },
            location,
        }
    }

    #[test]
    fn connected_without_relay_falls_back_to_connecting() {
        let state = TunnelState::Disconnected;
        assert_eq!(
            state.next(RunnerStatus::Connected, None),
            TunnelState::Connecting(None)
        );
        assert_eq!(
            state.next(RunnerStatus::Connected, Some(relay())),
            TunnelState::Connected(relay())
        );
    }

    #[test]
    fn reasserting_maps_to_reconnecting() {
        let state = TunnelState::Connected(relay());
        assert_eq!(
            state.next(RunnerStatus::Reasserting, Some(relay())),
            TunnelState::Reconnecting(relay())
        );
    }

    #[test]
    fn pending_restart_survives_disconnecting() {
        let state = TunnelState::Disconnecting(ActionAfterDisconnect::Reconnect);
        assert_eq!(state.next(RunnerStatus::Disconnecting, None), state);
        assert_eq!(
            state.next(RunnerStatus::Disconnected, None),
            TunnelState::PendingReconnect
        );
    }

    #[test]
    fn plain_disconnect_ends_disconnected() {
        let state = TunnelState::Connected(relay());
        let state = state.next(RunnerStatus::Disconnecting, None);
        assert_eq!(
            state,
            TunnelState::Disconnecting(ActionAfterDisconnect::Nothing)
        );
        assert_eq!(
            state.next(RunnerStatus::Disconnected, None),
            TunnelState::Disconnected
        );
        assert_eq!(
            TunnelState::PendingReconnect.next(RunnerStatus::Invalid, None),
            TunnelState::Disconnected
        );
    }

    #[test]
    fn with_state_resets_everything_else() {
        let mut status = TunnelStatus::default();
        status.is_network_reachable = true;
        status.apply_packet_status(PacketTunnelStatus {
            is_network_reachable: true,
            connecting_date: Some(Utc::now()),
            ..PacketTunnelStatus::default()
        });

        let reset = TunnelStatus::with_state(TunnelState::Connecting(Some(relay())));
        assert!(!reset.is_network_reachable);
        assert_eq!(reset.connecting_date, None);
        assert_eq!(reset.tunnel_relay, Some(relay()));
    }

    #[test]
    fn runner_status_parses_from_snake_case() {
        assert_eq!(
            "reasserting".parse::<RunnerStatus>().ok(),
            Some(RunnerStatus::Reasserting)
        );
        assert_eq!(RunnerStatus::Disconnecting.to_string(), "disconnecting");
    }
}
