// tunnelkeeper-core: Tunnel lifecycle coordination between the settings store, the backend and the tunnel runner.

pub mod config;
pub mod error;
pub mod interactor;
pub mod ipc;
pub mod manager;
pub mod model;
pub mod operation;
pub(crate) mod operations;
pub mod proxy;
pub mod relay;
pub mod runner;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::TunnelManagerConfig;
pub use error::CoreError;
pub use interactor::{InteractorEvent, TunnelInteractor};
pub use ipc::{IpcError, TunnelIpcRequest, TunnelIpcResponse, TunnelIpcSession};
pub use manager::{Collaborators, TunnelManager};
pub use operation::{Completion, OperationHandle, OperationQueue};
pub use operations::{SetAccountAction, SettingsChange};
pub use proxy::{AccountsProxy, DevicesProxy};
pub use relay::{FileRelayCache, RelayCache};
pub use runner::{
    PacketTunnelOptions, RunnerError, Tunnel, TunnelConfiguration, TunnelHandle, TunnelProvider,
};
pub use store::{MemoryStore, SettingsKey, SettingsStore, StoreError};
pub use stream::TunnelStatusStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AccountData, ActionAfterDisconnect, Constraint, DeviceData, DeviceState, DnsSettings, KeyData,
    LocationConstraint, PacketTunnelStatus, PrivateKey, PublicKey, Relay, RelayConstraints,
    RelayList, RelaySelectorResult, RunnerStatus, Settings, TunnelState, TunnelStatus,
};
