// ── Process tunnel runner ──
//
// Runs the tunnel as a child process. The registration lives in
// `tunnel.toml`, the child's pid in `runner.pid`, and IPC frames travel over
// a length-delimited Unix socket the child listens on. Runner status is
// derived from the child's liveness and whether the socket accepts
// connections, polled by a background task per handle.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use tunnelkeeper_core::{
    PacketTunnelOptions, RunnerError, RunnerStatus, TunnelConfiguration, TunnelHandle,
    TunnelProvider,
};

/// Environment variable carrying the JSON-encoded start options.
pub const START_OPTIONS_ENV: &str = "TUNNELKEEPER_START_OPTIONS";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where the runner keeps its files and how to launch it.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub command: String,
    pub args: Vec<String>,
    pub socket_path: PathBuf,
    /// Directory holding `tunnel.toml` and `runner.pid`.
    pub state_dir: PathBuf,
}

impl RunnerSettings {
    fn registration_path(&self) -> PathBuf {
        self.state_dir.join("tunnel.toml")
    }

    fn pid_path(&self) -> PathBuf {
        self.state_dir.join("runner.pid")
    }
}

// ── Provider ─────────────────────────────────────────────────────────

/// Tunnel provider backed by a single on-disk registration.
#[derive(Debug, Clone)]
pub struct ProcessProvider {
    settings: Arc<RunnerSettings>,
}

impl ProcessProvider {
    pub fn new(settings: RunnerSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl TunnelProvider for ProcessProvider {
    async fn load_all(&self) -> Result<Vec<Arc<dyn TunnelHandle>>, RunnerError> {
        let Some(configuration) = read_registration(&self.settings.registration_path()).await?
        else {
            return Ok(Vec::new());
        };
        let reachable = socket_reachable(&self.settings.socket_path).await;
        let status = if reachable {
            RunnerStatus::Connected
        } else {
            RunnerStatus::Disconnected
        };
        debug!(?status, "loaded tunnel registration");
        let handle: Arc<dyn TunnelHandle> =
            ProcessHandle::spawn(Arc::clone(&self.settings), configuration, status);
        Ok(vec![handle])
    }

    fn make_handle(&self) -> Arc<dyn TunnelHandle> {
        ProcessHandle::spawn(
            Arc::clone(&self.settings),
            TunnelConfiguration::default(),
            RunnerStatus::Invalid,
        )
    }
}

async fn read_registration(path: &Path) -> Result<Option<TunnelConfiguration>, RunnerError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RunnerError::Load(format!("{}: {e}", path.display()))),
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|e| RunnerError::Load(format!("{}: {e}", path.display())))
}

// ── Handle ───────────────────────────────────────────────────────────

/// One tunnel registration and, once started, its child process.
#[derive(Debug)]
pub struct ProcessHandle {
    settings: Arc<RunnerSettings>,
    configuration: Mutex<TunnelConfiguration>,
    status: watch::Sender<RunnerStatus>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl ProcessHandle {
    /// Create the handle and its status poller.
    fn spawn(
        settings: Arc<RunnerSettings>,
        configuration: TunnelConfiguration,
        status: RunnerStatus,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(status);
        let handle = Arc::new(Self {
            settings,
            configuration: Mutex::new(configuration),
            status,
            child: tokio::sync::Mutex::new(None),
        });
        tokio::spawn(poll_status(Arc::downgrade(&handle)));
        handle
    }

    fn set_status(&self, status: RunnerStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!(from = %current, to = %status, "runner status changed");
            *current = status;
            true
        });
    }

    /// Fold one liveness sample into the status.
    async fn refresh(&self) {
        let current = *self.status.borrow();
        if current == RunnerStatus::Invalid {
            return;
        }
        let child_alive = self.child_alive().await;
        let reachable = socket_reachable(&self.settings.socket_path).await;
        self.set_status(next_status(current, child_alive, reachable));
    }

    /// `None` when no child was started by this process.
    async fn child_alive(&self) -> Option<bool> {
        let mut guard = self.child.lock().await;
        let child = guard.as_mut()?;
        match child.try_wait() {
            Ok(None) => Some(true),
            Ok(Some(exit)) => {
                info!(%exit, "tunnel runner exited");
                *guard = None;
                Some(false)
            }
            Err(e) => {
                warn!(error = %e, "failed to poll tunnel runner");
                *guard = None;
                Some(false)
            }
        }
    }

    async fn write_pid(&self, pid: Option<u32>) {
        let path = self.settings.pid_path();
        let result = match pid {
            Some(pid) => tokio::fs::write(&path, pid.to_string()).await,
            None => match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to update runner pid file");
        }
    }

    /// Terminate a runner started by an earlier process, via its pid file.
    async fn stop_detached(&self) -> Result<(), RunnerError> {
        let path = self.settings.pid_path();
        let pid = match tokio::fs::read_to_string(&path).await {
            Ok(pid) => pid.trim().to_owned(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no runner pid recorded");
                return Ok(());
            }
            Err(e) => return Err(RunnerError::Stop(e.to_string())),
        };
        if pid.parse::<u32>().is_err() {
            self.write_pid(None).await;
            return Err(RunnerError::Stop(format!("corrupt pid file: {pid:?}")));
        }

        let status = Command::new("kill")
            .arg("-TERM")
            .arg(&pid)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| RunnerError::Stop(e.to_string()))?;
        if !status.success() {
            debug!(%pid, "runner was no longer running");
        }
        self.write_pid(None).await;
        Ok(())
    }
}

/// Next runner status from the previous one and a liveness sample.
fn next_status(current: RunnerStatus, child_alive: Option<bool>, reachable: bool) -> RunnerStatus {
    match (current, child_alive, reachable) {
        (RunnerStatus::Invalid, ..) => RunnerStatus::Invalid,
        (_, Some(false), _) => RunnerStatus::Disconnected,
        (RunnerStatus::Disconnecting, Some(true), _) | (RunnerStatus::Disconnecting, None, true) => {
            RunnerStatus::Disconnecting
        }
        (_, _, true) => RunnerStatus::Connected,
        (RunnerStatus::Connected | RunnerStatus::Reasserting, Some(true), false) => {
            RunnerStatus::Reasserting
        }
        (_, Some(true), false) => RunnerStatus::Connecting,
        (_, None, false) => RunnerStatus::Disconnected,
    }
}

async fn poll_status(handle: Weak<ProcessHandle>) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(handle) = handle.upgrade() else {
            break;
        };
        handle.refresh().await;
    }
}

async fn socket_reachable(path: &Path) -> bool {
    UnixStream::connect(path).await.is_ok()
}

#[async_trait]
impl TunnelHandle for ProcessHandle {
    fn configuration(&self) -> TunnelConfiguration {
        self.configuration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn save(&self, configuration: TunnelConfiguration) -> Result<(), RunnerError> {
        let path = self.settings.registration_path();
        let text =
            toml::to_string_pretty(&configuration).map_err(|e| RunnerError::Save(e.to_string()))?;
        tokio::fs::create_dir_all(&self.settings.state_dir)
            .await
            .map_err(|e| RunnerError::Save(e.to_string()))?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| RunnerError::Save(format!("{}: {e}", path.display())))?;

        *self
            .configuration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = configuration;
        let registered = *self.status.borrow() != RunnerStatus::Invalid;
        if !registered {
            self.set_status(RunnerStatus::Disconnected);
        }
        Ok(())
    }

    async fn load(&self) -> Result<(), RunnerError> {
        let path = self.settings.registration_path();
        let configuration = read_registration(&path)
            .await?
            .ok_or_else(|| RunnerError::Load(format!("{} is missing", path.display())))?;
        *self
            .configuration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = configuration;
        Ok(())
    }

    async fn remove(&self) -> Result<(), RunnerError> {
        let path = self.settings.registration_path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RunnerError::Remove(format!("{}: {e}", path.display()))),
        }
        self.set_status(RunnerStatus::Invalid);
        Ok(())
    }

    async fn start(&self, options: PacketTunnelOptions) -> Result<(), RunnerError> {
        let encoded =
            serde_json::to_string(&options).map_err(|e| RunnerError::Start(e.to_string()))?;

        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Err(RunnerError::Start("tunnel runner is already running".into()));
        }

        let child = Command::new(&self.settings.command)
            .args(&self.settings.args)
            .arg("--socket")
            .arg(&self.settings.socket_path)
            .env(START_OPTIONS_ENV, encoded)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| RunnerError::Start(format!("{}: {e}", self.settings.command)))?;
        let pid = child.id();
        info!(command = %self.settings.command, ?pid, "tunnel runner started");
        *guard = Some(child);
        drop(guard);

        self.write_pid(pid).await;
        self.set_status(RunnerStatus::Connecting);
        Ok(())
    }

    async fn stop(&self) -> Result<(), RunnerError> {
        self.set_status(RunnerStatus::Disconnecting);

        let child = self.child.lock().await.take();
        let result = match child {
            Some(mut child) => {
                let killed = child
                    .kill()
                    .await
                    .map_err(|e| RunnerError::Stop(e.to_string()));
                self.write_pid(None).await;
                killed
            }
            None => self.stop_detached().await,
        };

        self.set_status(RunnerStatus::Disconnected);
        result
    }

    fn status(&self) -> RunnerStatus {
        *self.status.borrow()
    }

    fn subscribe_status(&self) -> watch::Receiver<RunnerStatus> {
        self.status.subscribe()
    }

    async fn send_message(&self, message: Vec<u8>) -> Result<Vec<u8>, RunnerError> {
        exchange(&self.settings.socket_path, message).await
    }
}

/// Send one frame and read one frame back.
async fn exchange(socket_path: &Path, message: Vec<u8>) -> Result<Vec<u8>, RunnerError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| RunnerError::Message(format!("{}: {e}", socket_path.display())))?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    framed
        .send(Bytes::from(message))
        .await
        .map_err(|e| RunnerError::Message(e.to_string()))?;

    match framed.next().await {
        Some(Ok(frame)) => Ok(frame.to_vec()),
        Some(Err(e)) => Err(RunnerError::Message(e.to_string())),
        None => Err(RunnerError::Message(
            "runner closed the connection without replying".into(),
        )),
    }
}
