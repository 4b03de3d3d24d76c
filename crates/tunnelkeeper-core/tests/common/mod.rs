// In-memory fakes for every collaborator of the tunnel manager.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use tunnelkeeper_api::{AccountResponse, Device, Error, NewAccount, RetryStrategy};
use tunnelkeeper_core::model::{CachedRelays, PortRange, RelayLocation};
use tunnelkeeper_core::{
    AccountData, AccountsProxy, Collaborators, DeviceData, DeviceState, DevicesProxy, KeyData,
    MemoryStore, PacketTunnelOptions, PacketTunnelStatus, PrivateKey, PublicKey, Relay,
    RelayCache, RelayList, RunnerError, RunnerStatus, SettingsStore, TunnelConfiguration,
    TunnelHandle, TunnelIpcRequest, TunnelIpcResponse, TunnelManager, TunnelManagerConfig,
    TunnelProvider,
};

pub const ACCOUNT: &str = "1234123412341234";
pub const DEVICE_ID: &str = "dev-existing";

pub fn date(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
}

// ── Runner ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FakeHandle {
    configuration: Mutex<TunnelConfiguration>,
    saved: AtomicBool,
    removed: AtomicBool,
    status: watch::Sender<RunnerStatus>,
    starts: Mutex<Vec<PacketTunnelOptions>>,
    stops: AtomicUsize,
    requests: Mutex<Vec<TunnelIpcRequest>>,
    packet_status: Mutex<PacketTunnelStatus>,
    reconnect_delay: Mutex<Option<Duration>>,
    reply_delay: Mutex<Option<Duration>>,
    raw_reply: Mutex<Option<Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    start_error: Mutex<Option<RunnerError>>,
}

impl FakeHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            configuration: Mutex::new(TunnelConfiguration::default()),
            saved: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            status: watch::channel(RunnerStatus::Disconnected).0,
            starts: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            packet_status: Mutex::new(PacketTunnelStatus::default()),
            reconnect_delay: Mutex::new(None),
            reply_delay: Mutex::new(None),
            raw_reply: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            start_error: Mutex::new(None),
        })
    }

    /// A handle that was saved by an earlier run.
    pub fn saved() -> Arc<Self> {
        let handle = Self::new();
        handle.saved.store(true, Ordering::SeqCst);
        handle
    }

    pub fn set_status(&self, status: RunnerStatus) {
        self.status.send_replace(status);
    }

    pub fn set_packet_status(&self, status: PacketTunnelStatus) {
        *self.packet_status.lock().unwrap() = status;
    }

    pub fn delay_reconnect(&self, delay: Duration) {
        *self.reconnect_delay.lock().unwrap() = Some(delay);
    }

    /// Delay every reply, whatever the request.
    pub fn delay_replies(&self, delay: Duration) {
        *self.reply_delay.lock().unwrap() = Some(delay);
    }

    /// Answer every later request with these bytes instead of the
    /// matching response.
    pub fn reply_with(&self, raw: Vec<u8>) {
        *self.raw_reply.lock().unwrap() = Some(raw);
    }

    /// Most requests that were ever being answered at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_start(&self, error: RunnerError) {
        *self.start_error.lock().unwrap() = Some(error);
    }

    pub fn clear_start_failure(&self) {
        *self.start_error.lock().unwrap() = None;
    }

    pub fn starts(&self) -> Vec<PacketTunnelOptions> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TunnelIpcRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn is_saved(&self) -> bool {
        self.saved.load(Ordering::SeqCst)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelHandle for FakeHandle {
    fn configuration(&self) -> TunnelConfiguration {
        self.configuration.lock().unwrap().clone()
    }

    async fn save(&self, configuration: TunnelConfiguration) -> Result<(), RunnerError> {
        *self.configuration.lock().unwrap() = configuration;
        self.saved.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<(), RunnerError> {
        Ok(())
    }

    async fn remove(&self) -> Result<(), RunnerError> {
        self.removed.store(true, Ordering::SeqCst);
        self.saved.store(false, Ordering::SeqCst);
        self.status.send_replace(RunnerStatus::Invalid);
        Ok(())
    }

    async fn start(&self, options: PacketTunnelOptions) -> Result<(), RunnerError> {
        self.starts.lock().unwrap().push(options);
        if let Some(e) = self.start_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.status.send_replace(RunnerStatus::Connecting);
        Ok(())
    }

    async fn stop(&self) -> Result<(), RunnerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(RunnerStatus::Disconnecting);
        Ok(())
    }

    fn status(&self) -> RunnerStatus {
        *self.status.borrow()
    }

    fn subscribe_status(&self) -> watch::Receiver<RunnerStatus> {
        self.status.subscribe()
    }

    async fn send_message(&self, message: Vec<u8>) -> Result<Vec<u8>, RunnerError> {
        let request = TunnelIpcRequest::decode(&message).unwrap();
        self.requests.lock().unwrap().push(request.clone());

        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let delay = *self.reply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let raw = self.raw_reply.lock().unwrap().clone();
        if let Some(raw) = raw {
            return Ok(raw);
        }

        let response = match request {
            TunnelIpcRequest::GetTunnelStatus => {
                TunnelIpcResponse::TunnelStatus(self.packet_status.lock().unwrap().clone())
            }
            TunnelIpcRequest::ReconnectTunnel { .. } => {
                let delay = *self.reconnect_delay.lock().unwrap();
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                TunnelIpcResponse::Ack
            }
            TunnelIpcRequest::ReloadTunnelSettings => TunnelIpcResponse::Ack,
        };
        Ok(response.encode().unwrap())
    }
}

/// Decrements the in-flight count when a reply finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeProvider {
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    load_error: Mutex<Option<RunnerError>>,
}

impl FakeProvider {
    pub fn with_handle(handle: Arc<FakeHandle>) -> Self {
        let provider = Self::default();
        provider.handles.lock().unwrap().push(handle);
        provider
    }

    pub fn fail_load(&self, error: RunnerError) {
        *self.load_error.lock().unwrap() = Some(error);
    }

    /// Every handle the provider knows about, saved or not.
    pub fn handles(&self) -> Vec<Arc<FakeHandle>> {
        self.handles.lock().unwrap().clone()
    }

    pub fn only_handle(&self) -> Arc<FakeHandle> {
        let handles = self.handles();
        assert_eq!(handles.len(), 1, "expected exactly one runner handle");
        Arc::clone(&handles[0])
    }
}

#[async_trait]
impl TunnelProvider for FakeProvider {
    async fn load_all(&self) -> Result<Vec<Arc<dyn TunnelHandle>>, RunnerError> {
        if let Some(e) = self.load_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self
            .handles
            .lock()
            .unwrap()
            .iter()
            .filter(|handle| handle.is_saved())
            .map(|handle| Arc::clone(handle) as Arc<dyn TunnelHandle>)
            .collect())
    }

    fn make_handle(&self) -> Arc<dyn TunnelHandle> {
        let handle = FakeHandle::new();
        self.handles.lock().unwrap().push(Arc::clone(&handle));
        handle
    }
}

// ── Relays ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRelayCache {
    relays: Mutex<Option<CachedRelays>>,
}

impl FakeRelayCache {
    pub fn with_relays(relays: Vec<Relay>) -> Self {
        let cache = Self::default();
        cache.set(relays);
        cache
    }

    pub fn clear(&self) {
        *self.relays.lock().unwrap() = None;
    }

    pub fn set(&self, relays: Vec<Relay>) {
        *self.relays.lock().unwrap() = Some(CachedRelays {
            relays: RelayList {
                relays,
                port_ranges: vec![PortRange {
                    start: 51820,
                    end: 51820,
                }],
            },
            updated_at: date(2024),
        });
    }
}

impl RelayCache for FakeRelayCache {
    fn read(&self) -> Option<CachedRelays> {
        self.relays.lock().unwrap().clone()
    }
}

pub fn relay(hostname: &str, country_code: &str, city_code: &str, last_octet: u8) -> Relay {
    let location = RelayLocation {
        country: country_code.to_uppercase(),
        country_code: country_code.into(),
        city: city_code.to_uppercase(),
        city_code: city_code.into(),
    };
    Relay {
        hostname: hostname.into(),
        location,
        active: true,
        include_in_country: true,
        weight: 100,
        ipv4_addr_in: Ipv4Addr::new(185, 213, 154, last_octet),
        ipv6_addr_in: None,
        public_key: format!("{hostname}-key"),
    }
}

// ── Backend ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    devices: Mutex<HashMap<String, Device>>,
    next_device: AtomicUsize,
}

impl FakeBackend {
    /// Make every later call named `call` fail with a server error.
    pub fn fail(&self, call: &'static str) {
        self.failing.lock().unwrap().insert(call);
    }

    /// Make every later call named `call` take `delay` to answer.
    pub fn delay(&self, call: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(call, delay);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn insert_device(&self, device: Device) {
        self.devices.lock().unwrap().insert(device.id.clone(), device);
    }

    pub fn remove_device(&self, id: &str) {
        self.devices.lock().unwrap().remove(id);
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.lock().unwrap().get(id).cloned()
    }

    fn call(&self, call: &'static str) -> Result<(), Error> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(call) {
            return Err(Error::Server {
                status: 500,
                code: Some("INTERNAL_ERROR".into()),
                message: format!("{call} failed"),
            });
        }
        Ok(())
    }

    async fn pause(&self, call: &'static str) {
        let delay = self.delays.lock().unwrap().get(call).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn backend_device(id: &str, public_key: &PublicKey) -> Device {
    Device {
        id: id.into(),
        name: "tidy otter".into(),
        pubkey: public_key.to_base64(),
        hijack_dns: false,
        created: date(2024),
        ipv4_address: "10.64.0.2/32".into(),
        ipv6_address: "fc00:bbbb:bbbb:bb01::2/128".into(),
    }
}

#[async_trait]
impl AccountsProxy for FakeBackend {
    async fn create_account(&self, _retry: RetryStrategy) -> Result<NewAccount, Error> {
        self.call("create_account")?;
        self.pause("create_account").await;
        Ok(NewAccount {
            id: "acc-new".into(),
            number: "5555666677778888".into(),
            expiry: date(2031),
        })
    }

    async fn get_account_data(
        &self,
        account_number: &str,
        _retry: RetryStrategy,
    ) -> Result<AccountResponse, Error> {
        self.call("get_account_data")?;
        Ok(AccountResponse {
            id: format!("acc-{account_number}"),
            expiry: date(2030),
        })
    }
}

#[async_trait]
impl DevicesProxy for FakeBackend {
    async fn create_device(
        &self,
        _account_number: &str,
        public_key: &PublicKey,
        _hijack_dns: bool,
        _retry: RetryStrategy,
    ) -> Result<Device, Error> {
        self.call("create_device")?;
        self.pause("create_device").await;
        let n = self.next_device.fetch_add(1, Ordering::SeqCst);
        let device = backend_device(&format!("dev-{n}"), public_key);
        self.insert_device(device.clone());
        Ok(device)
    }

    async fn get_device(
        &self,
        _account_number: &str,
        device_id: &str,
        _retry: RetryStrategy,
    ) -> Result<Option<Device>, Error> {
        self.call("get_device")?;
        Ok(self.device(device_id))
    }

    async fn delete_device(
        &self,
        _account_number: &str,
        device_id: &str,
        _retry: RetryStrategy,
    ) -> Result<bool, Error> {
        self.call("delete_device")?;
        Ok(self.devices.lock().unwrap().remove(device_id).is_some())
    }

    async fn rotate_device_key(
        &self,
        _account_number: &str,
        device_id: &str,
        public_key: &PublicKey,
        _retry: RetryStrategy,
    ) -> Result<Device, Error> {
        self.call("rotate_device_key")?;
        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(device_id).ok_or_else(|| Error::Server {
            status: 404,
            code: Some("DEVICE_NOT_FOUND".into()),
            message: "no such device".into(),
        })?;
        device.pubkey = public_key.to_base64();
        Ok(device.clone())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub fn logged_in_state(key_created: DateTime<Utc>) -> DeviceState {
    let private_key = PrivateKey::from_bytes([42; 32]);
    let device = backend_device(DEVICE_ID, &private_key.public_key());
    let key_data = KeyData {
        creation_date: key_created,
        private_key,
    };
    DeviceState::LoggedIn(
        AccountData {
            identifier: "acc-1".into(),
            number: ACCOUNT.into(),
            expiry: date(2029),
        },
        DeviceData::new(&device, key_data),
    )
}

pub struct Harness {
    pub manager: TunnelManager,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub relays: Arc<FakeRelayCache>,
    pub backend: Arc<FakeBackend>,
}

impl Harness {
    pub fn build(provider: FakeProvider, store: MemoryStore) -> Self {
        Self::build_with(
            provider,
            store,
            TunnelManagerConfig {
                ipc_timeout: Duration::from_secs(30),
                ..TunnelManagerConfig::default()
            },
        )
    }

    pub fn build_with(
        provider: FakeProvider,
        store: MemoryStore,
        config: TunnelManagerConfig,
    ) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(provider);
        let relays = Arc::new(FakeRelayCache::with_relays(vec![
            relay("se-got-wg-001", "se", "got", 1),
            relay("se-sto-wg-002", "se", "sto", 2),
        ]));
        let backend = Arc::new(FakeBackend::default());

        let manager = TunnelManager::new(
            config,
            Collaborators {
                store: store.clone(),
                provider: provider.clone(),
                relay_cache: relays.clone(),
                accounts: backend.clone(),
                devices: backend.clone(),
            },
        );

        Self {
            manager,
            store,
            provider,
            relays,
            backend,
        }
    }

    /// Fresh install: nothing stored, no runner registration.
    pub async fn logged_out() -> Self {
        let harness = Self::build(FakeProvider::default(), MemoryStore::new());
        harness.manager.load_configuration().result().await.unwrap();
        harness
    }

    /// Logged in with a key created at `key_created`; the backend knows the
    /// device.
    pub async fn logged_in_with_key_from(key_created: DateTime<Utc>) -> Self {
        Self::logged_in_with(key_created, |store| Self::build(FakeProvider::default(), store)).await
    }

    /// Logged in, with the manager built from `config`.
    pub async fn logged_in_with_config(config: TunnelManagerConfig) -> Self {
        Self::logged_in_with(Utc::now(), |store| {
            Self::build_with(FakeProvider::default(), store, config)
        })
        .await
    }

    async fn logged_in_with(
        key_created: DateTime<Utc>,
        build: impl FnOnce(MemoryStore) -> Self,
    ) -> Self {
        let store = MemoryStore::new();
        let state = logged_in_state(key_created);
        store.write_device_state(&state).unwrap();

        let harness = build(store);
        if let DeviceState::LoggedIn(_, device) = &state {
            harness
                .backend
                .insert_device(backend_device(DEVICE_ID, &device.key_data.private_key.public_key()));
        }
        harness.manager.load_configuration().result().await.unwrap();
        harness
    }

    pub async fn logged_in() -> Self {
        Self::logged_in_with_key_from(Utc::now()).await
    }
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
