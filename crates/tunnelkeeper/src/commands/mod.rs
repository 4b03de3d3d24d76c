//! Command dispatch: bridges CLI args -> tunnel manager operations -> output formatting.

pub mod account;
pub mod config_cmd;
pub mod constraints;
pub mod device;
pub mod relays;
pub mod tunnel;
pub mod util;

use std::sync::Arc;
use std::time::Duration;

use tunnelkeeper_api::RestClient;
use tunnelkeeper_config::{Config, KeyringStore};
use tunnelkeeper_core::{
    Collaborators, CoreError, FileRelayCache, OperationHandle, RunnerStatus, TunnelManager,
    TunnelState,
};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::runner::ProcessProvider;

/// Extra time allowed for the first runner status to be folded in.
const SETTLE_GRACE: Duration = Duration::from_secs(1);

/// A loaded tunnel manager plus the config it was built from.
pub struct Context {
    pub config: Config,
    pub manager: TunnelManager,
    pub color: bool,
}

impl Context {
    /// Build the manager from config and load the stored state.
    pub async fn connect(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = config::load(global)?;
        let client = Arc::new(RestClient::new(
            config.api_url()?,
            &config.transport_config(),
        )?);

        let manager = TunnelManager::new(
            config.manager_config()?,
            Collaborators {
                store: Arc::new(KeyringStore::default()),
                provider: Arc::new(ProcessProvider::new(config::runner_settings(&config))),
                relay_cache: Arc::new(FileRelayCache::new(config.relay_cache_path())),
                accounts: client.clone(),
                devices: client,
            },
        );

        let ctx = Self {
            color: output::should_color(global.color),
            config,
            manager,
        };
        ctx.run(ctx.manager.load_configuration()).await?;
        ctx.settle().await;
        Ok(ctx)
    }

    /// Await an operation, mapping its failure for display.
    pub async fn run<T>(&self, handle: OperationHandle<T>) -> Result<T, CliError>
    where
        T: Clone + Send + Sync + 'static,
    {
        handle.result().await.map_err(|e| self.error(e))
    }

    pub fn error(&self, err: CoreError) -> CliError {
        match err {
            CoreError::RelayListUnavailable => CliError::NoRelays {
                path: self.config.relay_cache_path().display().to_string(),
            },
            other => other.into(),
        }
    }

    /// Wait until a live runner's status has been reflected in the tunnel
    /// state, so state-dependent operations see it.
    async fn settle(&self) {
        let Some(tunnel) = self.manager.tunnel() else {
            return;
        };
        if matches!(
            tunnel.status(),
            RunnerStatus::Invalid | RunnerStatus::Disconnected
        ) {
            return;
        }

        let limit = self.manager.config().ipc_timeout + SETTLE_GRACE;
        let mut stream = self.manager.tunnel_status_stream();
        let settled = tokio::time::timeout(limit, async {
            while stream.latest().state == TunnelState::Disconnected {
                if stream.changed().await.is_none() {
                    break;
                }
            }
        })
        .await;
        if settled.is_err() {
            tracing::debug!("runner status not reflected yet");
        }
    }
}

/// Dispatch a manager-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Account(args) => account::handle(ctx, args, global).await,
        Command::Device(args) => device::handle(ctx, args, global).await,
        Command::Connect(args) => tunnel::connect(ctx, &args, global).await,
        Command::Disconnect => tunnel::disconnect(ctx, global).await,
        Command::Reconnect(args) => tunnel::reconnect(ctx, &args, global).await,
        Command::Status => tunnel::status(ctx, global),
        Command::Constraints(args) => constraints::handle(ctx, args, global).await,
        // Local commands are handled before the manager is built
        Command::Config(_) | Command::Relays(_) | Command::Completions(_) => {
            Err(CliError::Validation {
                field: "command".into(),
                reason: "does not need a tunnel manager".into(),
            })
        }
    }
}
