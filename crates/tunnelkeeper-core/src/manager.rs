// ── Tunnel manager ──
//
// Owns the interactor, the operation queue and the runner observer. All
// mutating requests go through the queue and come back as operation
// handles; reads go straight to the interactor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TunnelManagerConfig;
use crate::interactor::{InteractorEvent, TunnelInteractor};
use crate::ipc::TunnelIpcSession;
use crate::model::{
    AccountData, DeviceData, DeviceState, DnsSettings, PacketTunnelStatus, RelayConstraints,
    RunnerStatus, Settings, TunnelState, TunnelStatus,
};
use crate::operation::{OperationHandle, OperationQueue};
use crate::operations::{
    LoadConfiguration, ReconnectTunnel, ReloadTunnel, RotateKey, Services, SetAccount,
    SetAccountAction, SettingsChange, StartTunnel, StopTunnel, UpdateAccountData,
    UpdateDeviceData, UpdateSettings,
};
use crate::proxy::{AccountsProxy, DevicesProxy};
use crate::relay::RelayCache;
use crate::runner::{Tunnel, TunnelProvider};
use crate::store::{SettingsStore, StoreError};
use crate::stream::TunnelStatusStream;

/// External collaborators the manager drives.
pub struct Collaborators {
    pub store: Arc<dyn SettingsStore>,
    pub provider: Arc<dyn TunnelProvider>,
    pub relay_cache: Arc<dyn RelayCache>,
    pub accounts: Arc<dyn AccountsProxy>,
    pub devices: Arc<dyn DevicesProxy>,
}

/// Entry point for tunnel lifecycle requests.
///
/// Cheaply cloneable. The background observer stops when the last clone
/// is dropped or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct TunnelManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    services: Services,
    queue: OperationQueue,
    cancel: CancellationToken,
    observer: JoinHandle<()>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TunnelManager {
    /// Create the manager and spawn its runner observer. Must be called
    /// from within a Tokio runtime. Call
    /// [`load_configuration`](Self::load_configuration) before anything else.
    pub fn new(config: TunnelManagerConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            provider,
            relay_cache,
            accounts,
            devices,
        } = collaborators;
        let (interactor, events) = TunnelInteractor::new(store);
        let services = Services {
            interactor: Arc::new(interactor),
            provider,
            relay_cache,
            accounts,
            devices,
            config,
        };

        let queue = OperationQueue::new("tunnel-manager");
        let cancel = CancellationToken::new();
        let observer = tokio::spawn(observe_runner(
            services.clone(),
            queue.clone(),
            events,
            cancel.child_token(),
        ));

        Self {
            inner: Arc::new(ManagerInner {
                services,
                queue,
                cancel,
                observer,
            }),
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    pub fn load_configuration(&self) -> OperationHandle<()> {
        self.inner.queue.add(LoadConfiguration::new(self.services()))
    }

    pub fn start_tunnel(&self) -> OperationHandle<()> {
        self.inner.queue.add(StartTunnel::new(self.services()))
    }

    pub fn stop_tunnel(&self) -> OperationHandle<()> {
        self.inner.queue.add(StopTunnel::new(self.services()))
    }

    pub fn reconnect_tunnel(&self, select_new_relay: bool) -> OperationHandle<()> {
        self.inner
            .queue
            .add(ReconnectTunnel::new(self.services(), select_new_relay))
    }

    pub fn reload_tunnel(&self) -> OperationHandle<()> {
        self.inner.queue.add(ReloadTunnel::new(self.services()))
    }

    /// Rotate the device key. With an interval, the key is only replaced
    /// once it is at least that old; the result says whether it was.
    pub fn rotate_key(&self, rotation_interval: Option<Duration>) -> OperationHandle<bool> {
        self.inner
            .queue
            .add(RotateKey::new(self.services(), rotation_interval))
    }

    /// Rotate the device key if the configured rotation interval has passed.
    pub fn rotate_key_if_due(&self) -> OperationHandle<bool> {
        self.rotate_key(Some(self.inner.services.config.key_rotation_interval))
    }

    pub fn set_account(&self, action: SetAccountAction) -> OperationHandle<Option<AccountData>> {
        self.inner
            .queue
            .add(SetAccount::new(self.services(), action))
    }

    pub fn update_account_data(&self) -> OperationHandle<AccountData> {
        self.inner.queue.add(UpdateAccountData::new(self.services()))
    }

    pub fn update_device_data(&self) -> OperationHandle<DeviceData> {
        self.inner.queue.add(UpdateDeviceData::new(self.services()))
    }

    pub fn set_relay_constraints(&self, constraints: RelayConstraints) -> OperationHandle<()> {
        self.update_settings(SettingsChange::RelayConstraints(constraints))
    }

    pub fn set_dns_settings(&self, dns_settings: DnsSettings) -> OperationHandle<()> {
        self.update_settings(SettingsChange::DnsSettings(dns_settings))
    }

    fn update_settings(&self, change: SettingsChange) -> OperationHandle<()> {
        self.inner
            .queue
            .add(UpdateSettings::new(self.services(), change))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn config(&self) -> &TunnelManagerConfig {
        &self.inner.services.config
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.inner.services.interactor.settings()
    }

    pub fn device_state(&self) -> Arc<DeviceState> {
        self.inner.services.interactor.device_state()
    }

    pub fn tunnel_status(&self) -> TunnelStatus {
        self.inner.services.interactor.tunnel_status()
    }

    pub fn subscribe_tunnel_status(&self) -> watch::Receiver<TunnelStatus> {
        self.inner.services.interactor.subscribe_tunnel_status()
    }

    pub fn tunnel_status_stream(&self) -> TunnelStatusStream {
        TunnelStatusStream::new(self.subscribe_tunnel_status())
    }

    pub fn last_used_account(&self) -> Result<Option<String>, StoreError> {
        self.inner.services.interactor.last_used_account()
    }

    /// The runner handle currently in use, if any.
    pub fn tunnel(&self) -> Option<Arc<Tunnel>> {
        self.inner.services.interactor.tunnel()
    }

    /// Cancel every queued operation and stop observing the runner.
    pub fn shutdown(&self) {
        info!("shutting down tunnel manager");
        self.inner.queue.cancel_all();
        self.inner.cancel.cancel();
        self.inner.observer.abort();
    }

    fn services(&self) -> Services {
        self.inner.services.clone()
    }
}

// ── Runner observation ───────────────────────────────────────────────

type Watched = Option<(Arc<Tunnel>, watch::Receiver<RunnerStatus>)>;

async fn observe_runner(
    services: Services,
    queue: OperationQueue,
    mut events: mpsc::UnboundedReceiver<InteractorEvent>,
    cancel: CancellationToken,
) {
    let mut watched: Watched = None;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(InteractorEvent::TunnelChanged { refresh_status }) => {
                    watched = services.interactor.tunnel().map(|tunnel| {
                        let rx = tunnel.subscribe_status();
                        (tunnel, rx)
                    });
                    if let Some((tunnel, rx)) = &mut watched {
                        let status = *rx.borrow_and_update();
                        if refresh_status {
                            refresh_status_from_runner(&services, &queue, tunnel, status, &cancel).await;
                        }
                    }
                }
                Some(InteractorEvent::WillDeleteVpnConfiguration) => {
                    debug!("stopped observing tunnel");
                    watched = None;
                }
                None => break,
            },
            status = next_status(&mut watched) => match status {
                Some(status) => {
                    if let Some((tunnel, _)) = &watched {
                        let tunnel = Arc::clone(tunnel);
                        refresh_status_from_runner(&services, &queue, &tunnel, status, &cancel).await;
                    }
                }
                None => watched = None,
            },
        }
    }
    debug!("runner observer stopped");
}

/// Next status change of the watched runner. Pends forever when nothing is
/// watched; `None` once the runner dropped its status channel.
async fn next_status(watched: &mut Watched) -> Option<RunnerStatus> {
    match watched {
        Some((_, rx)) => {
            rx.changed().await.ok()?;
            Some(*rx.borrow_and_update())
        }
        None => std::future::pending().await,
    }
}

async fn refresh_status_from_runner(
    services: &Services,
    queue: &OperationQueue,
    tunnel: &Arc<Tunnel>,
    status: RunnerStatus,
    cancel: &CancellationToken,
) {
    debug!(%status, "runner status changed");

    let packet_status = if status.accepts_ipc() {
        match TunnelIpcSession::new(Arc::clone(tunnel))
            .get_tunnel_status(cancel)
            .await
        {
            Ok(packet_status) => Some(packet_status),
            Err(e) => {
                debug!(error = %e, "failed to fetch tunnel status");
                None
            }
        }
    } else {
        Some(PacketTunnelStatus::default())
    };

    let interactor = &services.interactor;
    let is_current = interactor
        .tunnel()
        .is_some_and(|current| Arc::ptr_eq(&current, tunnel));
    if !is_current {
        debug!("tunnel was replaced, dropping stale status");
        return;
    }

    let mut pending_reconnect = false;
    interactor.update_tunnel_status(|tunnel_status| {
        if let Some(packet_status) = packet_status {
            tunnel_status.apply_packet_status(packet_status);
        }
        let relay = tunnel_status.tunnel_relay.clone();
        tunnel_status.state = tunnel_status.state.next(status, relay);
        pending_reconnect = tunnel_status.state == TunnelState::PendingReconnect;
    });

    if pending_reconnect {
        info!("runner disconnected, restarting tunnel");
        queue.add(StartTunnel::new(services.clone()));
    }
}
