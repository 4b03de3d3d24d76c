//! Shared configuration for the tunnelkeeper CLI and runner.
//!
//! TOML file plus `TUNNELKEEPER_*` environment overrides, platform paths,
//! and translation to the runtime configs of `tunnelkeeper-api` and
//! `tunnelkeeper-core`. The keyring-backed settings store lives in
//! [`keyring_store`].

pub mod keyring_store;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tunnelkeeper_api::{RetryStrategy, TlsMode, TransportConfig};
use tunnelkeeper_core::TunnelManagerConfig;

pub use keyring_store::KeyringStore;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the account/device backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Backend request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// How long to wait for the runner to answer an IPC request.
    #[serde(default = "default_ipc_timeout")]
    pub ipc_timeout_secs: u64,

    /// Minimum key age before automatic rotation, e.g. "14d".
    #[serde(default = "default_key_rotation_interval")]
    pub key_rotation_interval: String,

    /// Relay list JSON. Defaults to `relays.json` in the data directory.
    pub relay_cache_path: Option<PathBuf>,

    /// Path to a custom CA certificate for the backend.
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetryStrategy,

    /// Default output format.
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout(),
            ipc_timeout_secs: default_ipc_timeout(),
            key_rotation_interval: default_key_rotation_interval(),
            relay_cache_path: None,
            ca_cert: None,
            retry: RetryStrategy::default(),
            output: default_output(),
            runner: RunnerConfig::default(),
        }
    }
}

/// How to launch the tunnel runner process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunnerConfig {
    #[serde(default = "default_runner_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// IPC socket. Defaults to `runner.sock` in the data directory.
    pub socket_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: default_runner_command(),
            args: Vec::new(),
            socket_path: None,
        }
    }
}

fn default_api_url() -> String {
    "https://api.tunnelkeeper.net/".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_ipc_timeout() -> u64 {
    5
}
fn default_key_rotation_interval() -> String {
    "14d".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_runner_command() -> String {
    "tunnelkeeper-runner".into()
}

// ── Derived runtime settings ────────────────────────────────────────

impl Config {
    pub fn api_url(&self) -> Result<url::Url, ConfigError> {
        self.api_url.parse().map_err(|e| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("{e}: {}", self.api_url),
        })
    }

    pub fn key_rotation_interval(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.key_rotation_interval).map_err(|e| {
            ConfigError::Validation {
                field: "key_rotation_interval".into(),
                reason: e.to_string(),
            }
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        let tls = self
            .ca_cert
            .clone()
            .map_or(TlsMode::System, TlsMode::CustomCa);
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn manager_config(&self) -> Result<TunnelManagerConfig, ConfigError> {
        Ok(TunnelManagerConfig {
            ipc_timeout: Duration::from_secs(self.ipc_timeout_secs),
            key_rotation_interval: self.key_rotation_interval()?,
            retry: self.retry,
        })
    }

    pub fn relay_cache_path(&self) -> PathBuf {
        self.relay_cache_path
            .clone()
            .unwrap_or_else(|| data_dir().join("relays.json"))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runner
            .socket_path
            .clone()
            .unwrap_or_else(|| data_dir().join("runner.sock"))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "tunnelkeeper", "tunnelkeeper")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for the relay cache, runner registration and socket.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("tunnelkeeper");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TUNNELKEEPER_").split("__"))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    config.key_rotation_interval()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.key_rotation_interval().unwrap(),
            Duration::from_secs(14 * 24 * 60 * 60)
        );
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_url = "http://127.0.0.1:8080/"
ipc_timeout_secs = 2
key_rotation_interval = "3days"
retry = "none"

[runner]
command = "/usr/local/bin/wg-runner"
args = ["--verbose"]
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        let manager = config.manager_config().unwrap();

        assert_eq!(config.api_url().unwrap().as_str(), "http://127.0.0.1:8080/");
        assert_eq!(manager.ipc_timeout, Duration::from_secs(2));
        assert_eq!(manager.key_rotation_interval, Duration::from_secs(3 * 86_400));
        assert_eq!(manager.retry, RetryStrategy::NoRetry);
        assert_eq!(config.runner.command, "/usr/local/bin/wg-runner");
        assert_eq!(config.runner.args, vec!["--verbose".to_owned()]);
        assert_eq!(config.runner.socket_path, None);
    }

    #[test]
    fn bad_rotation_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "key_rotation_interval = \"fortnightly\"\n").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Validation { ref field, .. }) if field == "key_rotation_interval"
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            relay_cache_path: Some(dir.path().join("relays.json")),
            ..Config::default()
        };

        save_config_to(&config, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn custom_ca_selects_custom_tls() {
        let config = Config {
            ca_cert: Some(PathBuf::from("/etc/ssl/backend.pem")),
            ..Config::default()
        };
        assert!(matches!(
            config.transport_config().tls,
            TlsMode::CustomCa(ref p) if p == Path::new("/etc/ssl/backend.pem")
        ));
    }
}
