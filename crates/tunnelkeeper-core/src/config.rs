// ── Manager configuration ──

use std::time::Duration;

use tunnelkeeper_api::RetryStrategy;

use crate::ipc::DEFAULT_IPC_TIMEOUT;

/// Default minimum age of a device key before it is rotated.
pub const DEFAULT_KEY_ROTATION_INTERVAL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Runtime knobs for [`TunnelManager`](crate::TunnelManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelManagerConfig {
    /// How long to wait for the runner to answer an IPC request.
    pub ipc_timeout: Duration,
    pub key_rotation_interval: Duration,
    /// Retry strategy for every backend call the manager issues.
    pub retry: RetryStrategy,
}

impl Default for TunnelManagerConfig {
    fn default() -> Self {
        Self {
            ipc_timeout: DEFAULT_IPC_TIMEOUT,
            key_rotation_interval: DEFAULT_KEY_ROTATION_INTERVAL,
            retry: RetryStrategy::Default,
        }
    }
}
