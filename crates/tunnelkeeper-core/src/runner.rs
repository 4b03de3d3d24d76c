// ── Tunnel runner control ──
//
// The runner is the isolated process that owns the live tunnel. The core
// only sees it through `TunnelProvider` (enumerate and create registrations)
// and `TunnelHandle` (one registration: save, start, stop, status, raw
// message exchange). `Tunnel` wraps a handle with its private IPC queue.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::model::{RelaySelectorResult, RunnerStatus};
use crate::operation::OperationQueue;

/// Start-option key carrying the JSON-encoded relay selector result.
pub const RELAY_SELECTOR_RESULT_KEY: &str = "relay-selector-result";

/// Failures reported by the runner platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("Failed to load tunnel configurations: {0}")]
    Load(String),

    #[error("Failed to save tunnel configuration: {0}")]
    Save(String),

    #[error("Failed to remove tunnel configuration: {0}")]
    Remove(String),

    #[error("Failed to start tunnel: {0}")]
    Start(String),

    #[error("Failed to stop tunnel: {0}")]
    Stop(String),

    #[error("Failed to deliver message to tunnel: {0}")]
    Message(String),
}

/// Persisted registration of a tunnel with the runner platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfiguration {
    pub is_enabled: bool,
    /// Always-on connect rule.
    pub is_on_demand_enabled: bool,
    pub description: String,
}

impl Default for TunnelConfiguration {
    fn default() -> Self {
        Self {
            is_enabled: false,
            is_on_demand_enabled: false,
            description: "tunnelkeeper".into(),
        }
    }
}

/// Options passed to the runner when starting the tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketTunnelOptions(BTreeMap<String, String>);

impl PacketTunnelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `result` under [`RELAY_SELECTOR_RESULT_KEY`].
    pub fn set_selector_result(&mut self, result: &RelaySelectorResult) -> serde_json::Result<()> {
        let json = serde_json::to_string(result)?;
        self.0.insert(RELAY_SELECTOR_RESULT_KEY.to_owned(), json);
        Ok(())
    }

    /// Decode the pre-selected relay, if one was supplied.
    pub fn selector_result(&self) -> serde_json::Result<Option<RelaySelectorResult>> {
        self.0
            .get(RELAY_SELECTOR_RESULT_KEY)
            .map(|json| serde_json::from_str(json))
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Enumerates and creates tunnel registrations.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// All registrations known to the platform.
    async fn load_all(&self) -> Result<Vec<Arc<dyn TunnelHandle>>, RunnerError>;

    /// A new, not yet saved registration.
    fn make_handle(&self) -> Arc<dyn TunnelHandle>;
}

/// One tunnel registration with the runner platform.
#[async_trait]
pub trait TunnelHandle: Send + Sync + fmt::Debug {
    fn configuration(&self) -> TunnelConfiguration;

    /// Persist `configuration` with the platform.
    async fn save(&self, configuration: TunnelConfiguration) -> Result<(), RunnerError>;

    /// Reload the persisted configuration after a save.
    async fn load(&self) -> Result<(), RunnerError>;

    async fn remove(&self) -> Result<(), RunnerError>;

    async fn start(&self, options: PacketTunnelOptions) -> Result<(), RunnerError>;

    async fn stop(&self) -> Result<(), RunnerError>;

    fn status(&self) -> RunnerStatus;

    fn subscribe_status(&self) -> watch::Receiver<RunnerStatus>;

    /// Deliver an encoded IPC request and return the encoded reply.
    async fn send_message(&self, message: Vec<u8>) -> Result<Vec<u8>, RunnerError>;
}

/// A runner handle plus the serial queue its IPC requests go through.
pub struct Tunnel {
    handle: Arc<dyn TunnelHandle>,
    ipc_queue: OperationQueue,
    ipc_timeout: Duration,
}

impl Tunnel {
    /// Wrap `handle`. Spawns the IPC queue worker, so this must be called
    /// from within a Tokio runtime.
    pub fn new(handle: Arc<dyn TunnelHandle>, ipc_timeout: Duration) -> Self {
        Self {
            handle,
            ipc_queue: OperationQueue::new("tunnel-ipc"),
            ipc_timeout,
        }
    }

    pub fn handle(&self) -> &Arc<dyn TunnelHandle> {
        &self.handle
    }

    pub fn status(&self) -> RunnerStatus {
        self.handle.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RunnerStatus> {
        self.handle.subscribe_status()
    }

    pub fn configuration(&self) -> TunnelConfiguration {
        self.handle.configuration()
    }

    /// Save and reload the configuration.
    pub async fn save_configuration(
        &self,
        configuration: TunnelConfiguration,
    ) -> Result<(), RunnerError> {
        self.handle.save(configuration).await?;
        self.handle.load().await
    }

    pub async fn remove_from_preferences(&self) -> Result<(), RunnerError> {
        self.handle.remove().await
    }

    pub async fn start(&self, options: PacketTunnelOptions) -> Result<(), RunnerError> {
        self.handle.start(options).await
    }

    pub async fn stop(&self) {
        if let Err(e) = self.handle.stop().await {
            warn!(error = %e, "failed to stop tunnel");
        }
    }

    pub(crate) fn ipc_queue(&self) -> &OperationQueue {
        &self.ipc_queue
    }

    pub(crate) fn ipc_timeout(&self) -> Duration {
        self.ipc_timeout
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("handle", &self.handle)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
