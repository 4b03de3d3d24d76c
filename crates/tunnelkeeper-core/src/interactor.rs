// ── Tunnel interactor ──
//
// Single owner of the in-memory settings, device state and tunnel status.
// Reads are lock-free snapshots. Every mutation takes the write lock, so
// writers never interleave, and persists before returning when asked to.
// Persistence failures are logged and the in-memory value is kept.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use crate::model::{DeviceState, Settings, TunnelState, TunnelStatus};
use crate::runner::Tunnel;
use crate::store::{SettingsStore, StoreError};

/// Notifications for whoever observes the runner on the interactor's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractorEvent {
    /// The runner handle was replaced or cleared.
    TunnelChanged { refresh_status: bool },
    /// The runner registration is about to be removed; stop observing it.
    WillDeleteVpnConfiguration,
}

pub struct TunnelInteractor {
    settings: ArcSwap<Settings>,
    device_state: ArcSwap<DeviceState>,
    tunnel: ArcSwapOption<Tunnel>,
    tunnel_status: watch::Sender<TunnelStatus>,
    write_lock: Mutex<()>,
    store: Arc<dyn SettingsStore>,
    events: mpsc::UnboundedSender<InteractorEvent>,
}

impl TunnelInteractor {
    /// Create an interactor with default state. The receiver yields
    /// [`InteractorEvent`]s.
    pub fn new(store: Arc<dyn SettingsStore>) -> (Self, mpsc::UnboundedReceiver<InteractorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (tunnel_status, _) = watch::channel(TunnelStatus::default());
        let interactor = Self {
            settings: ArcSwap::from_pointee(Settings::default()),
            device_state: ArcSwap::from_pointee(DeviceState::default()),
            tunnel: ArcSwapOption::empty(),
            tunnel_status,
            write_lock: Mutex::new(()),
            store,
            events,
        };
        (interactor, rx)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    pub fn device_state(&self) -> Arc<DeviceState> {
        self.device_state.load_full()
    }

    pub fn tunnel(&self) -> Option<Arc<Tunnel>> {
        self.tunnel.load_full()
    }

    pub fn tunnel_status(&self) -> TunnelStatus {
        self.tunnel_status.borrow().clone()
    }

    pub fn subscribe_tunnel_status(&self) -> watch::Receiver<TunnelStatus> {
        self.tunnel_status.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub fn last_used_account(&self) -> Result<Option<String>, StoreError> {
        self.store.last_used_account()
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub fn set_settings(&self, settings: Settings, persist: bool) {
        let _guard = self.lock();
        if persist {
            if let Err(e) = self.store.write_settings(&settings) {
                error!(error = %e, "failed to persist settings");
            }
        }
        self.settings.store(Arc::new(settings));
    }

    pub fn set_device_state(&self, device_state: DeviceState, persist: bool) {
        let _guard = self.lock();
        if persist {
            if let Err(e) = self.store.write_device_state(&device_state) {
                error!(error = %e, "failed to persist device state");
            }
        }
        self.device_state.store(Arc::new(device_state));
    }

    pub fn set_last_used_account(&self, number: Option<&str>) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.store.set_last_used_account(number)
    }

    /// Replace the runner handle. Clearing it also resets the tunnel status.
    pub fn set_tunnel(&self, tunnel: Option<Arc<Tunnel>>, refresh_status: bool) {
        let _guard = self.lock();
        let cleared = tunnel.is_none();
        self.tunnel.store(tunnel);
        if cleared {
            self.tunnel_status.send_replace(TunnelStatus::default());
        }
        debug!(cleared, refresh_status, "tunnel handle changed");
        let _ = self
            .events
            .send(InteractorEvent::TunnelChanged { refresh_status });
    }

    /// Replace the whole status with a fresh one in `state`.
    pub fn reset_tunnel_state(&self, state: TunnelState) {
        let _guard = self.lock();
        self.tunnel_status.send_replace(TunnelStatus::with_state(state));
    }

    /// Change only the state field of the status.
    pub fn update_tunnel_state(&self, state: TunnelState) {
        self.update_tunnel_status(|status| status.state = state);
    }

    /// Modify the status in place; subscribers are only woken on change.
    pub fn update_tunnel_status(&self, modify: impl FnOnce(&mut TunnelStatus)) {
        let _guard = self.lock();
        self.tunnel_status.send_if_modified(|status| {
            let before = status.clone();
            modify(status);
            *status != before
        });
    }

    pub fn prepare_for_vpn_configuration_deletion(&self) {
        let _ = self.events.send(InteractorEvent::WillDeleteVpnConfiguration);
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TunnelInteractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelInteractor")
            .field("device_state", &self.device_state())
            .field("tunnel_status", &self.tunnel_status())
            .finish_non_exhaustive()
    }
}
