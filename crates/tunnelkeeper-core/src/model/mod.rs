// ── Domain model ──
//
// Plain data types shared by the interactor, the operations and the IPC
// layer. Everything here is `Clone` and serde-encodable so it can be
// persisted or sent to the runner unchanged.

pub mod account;
pub mod device;
pub mod keys;
pub mod relay;
pub mod settings;
pub mod tunnel;

pub use account::AccountData;
pub use device::{DeviceData, DeviceState, KeyData};
pub use keys::{KeyError, PrivateKey, PublicKey};
pub use relay::{
    CachedRelays, PortRange, Relay, RelayEndpoint, RelayList, RelayLocation, RelaySelectorResult,
};
pub use settings::{Constraint, DnsSettings, LocationConstraint, RelayConstraints, Settings};
pub use tunnel::{
    ActionAfterDisconnect, PacketTunnelStatus, RunnerStatus, TunnelState, TunnelStatus,
};
