//! Config subcommand handlers.

use std::path::PathBuf;

use tunnelkeeper_api::RetryStrategy;
use tunnelkeeper_config::Config;

use super::util;
use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

fn parse_secs(field: &str, value: &str) -> Result<u64, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected a number of seconds, got {value:?}"),
    })
}

/// Apply `key = value` to `cfg`.
fn set_value(cfg: &mut Config, key: &str, value: String) -> Result<(), CliError> {
    match key.replace('-', "_").as_str() {
        "api_url" => {
            value.parse::<url::Url>().map_err(|e| CliError::Validation {
                field: "api_url".into(),
                reason: e.to_string(),
            })?;
            cfg.api_url = value;
        }
        "timeout_secs" => cfg.timeout_secs = parse_secs(key, &value)?,
        "ipc_timeout_secs" => cfg.ipc_timeout_secs = parse_secs(key, &value)?,
        "key_rotation_interval" => {
            util::parse_duration(key, &value)?;
            cfg.key_rotation_interval = value;
        }
        "retry" => {
            cfg.retry = match value.as_str() {
                "none" => RetryStrategy::NoRetry,
                "default" => RetryStrategy::Default,
                other => {
                    return Err(CliError::Validation {
                        field: "retry".into(),
                        reason: format!("expected 'none' or 'default', got '{other}'"),
                    });
                }
            };
        }
        "relay_cache_path" => cfg.relay_cache_path = Some(PathBuf::from(value)),
        "ca_cert" => cfg.ca_cert = Some(PathBuf::from(value)),
        "output" => cfg.output = value,
        "runner.command" => cfg.runner.command = value,
        "runner.socket_path" => cfg.runner.socket_path = Some(PathBuf::from(value)),
        _ => {
            return Err(CliError::Validation {
                field: "key".into(),
                reason: format!("unknown config key '{key}'"),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |_| "config".into(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let path = config::config_path(global);
            let mut cfg = config::load(global)?;
            set_value(&mut cfg, &key, value)?;
            tunnelkeeper_config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Updated {key} in {}", path.display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_are_applied() {
        let mut cfg = Config::default();
        set_value(&mut cfg, "runner.command", "/opt/runner".into()).unwrap();
        set_value(&mut cfg, "ipc-timeout-secs", "9".into()).unwrap();
        set_value(&mut cfg, "retry", "none".into()).unwrap();
        assert_eq!(cfg.runner.command, "/opt/runner");
        assert_eq!(cfg.ipc_timeout_secs, 9);
        assert_eq!(cfg.retry, RetryStrategy::NoRetry);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = Config::default();
        assert!(set_value(&mut cfg, "key_rotation_interval", "often".into()).is_err());
        assert!(set_value(&mut cfg, "timeout_secs", "-1".into()).is_err());
        assert!(set_value(&mut cfg, "colour", "red".into()).is_err());
        assert_eq!(cfg, Config::default());
    }
}
