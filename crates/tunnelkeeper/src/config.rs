//! CLI-side configuration: resolve the config file from flags, then
//! translate it into the collaborators the core needs.

use std::path::PathBuf;

use tunnelkeeper_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::runner::RunnerSettings;

/// Config file path: `--config` / `TUNNELKEEPER_CONFIG`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(tunnelkeeper_config::config_path)
}

/// Load the config file merged with `TUNNELKEEPER_*` overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(tunnelkeeper_config::load_config_from(&config_path(global))?)
}

/// Runner launch settings, with files kept next to the socket's default home.
pub fn runner_settings(config: &Config) -> RunnerSettings {
    RunnerSettings {
        command: config.runner.command.clone(),
        args: config.runner.args.clone(),
        socket_path: config.socket_path(),
        state_dir: tunnelkeeper_config::data_dir(),
    }
}
