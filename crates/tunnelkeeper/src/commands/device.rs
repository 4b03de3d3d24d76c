//! Device command handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tunnelkeeper_core::{DeviceData, DeviceState};

use super::Context;
use super::util;
use crate::cli::{DeviceArgs, DeviceCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Device details without the private key.
#[derive(Serialize)]
struct DeviceView {
    identifier: String,
    name: String,
    created: DateTime<Utc>,
    ipv4_address: String,
    ipv6_address: String,
    hijack_dns: bool,
    public_key: String,
    key_created: DateTime<Utc>,
}

impl From<&DeviceData> for DeviceView {
    fn from(device: &DeviceData) -> Self {
        Self {
            identifier: device.identifier.clone(),
            name: device.display_name(),
            created: device.creation_date,
            ipv4_address: device.ipv4_address.clone(),
            ipv6_address: device.ipv6_address.clone(),
            hijack_dns: device.hijack_dns,
            public_key: device.key_data.private_key.public_key().to_base64(),
            key_created: device.key_data.creation_date,
        }
    }
}

#[derive(Serialize)]
struct RotationView {
    rotated: bool,
    public_key: Option<String>,
}

fn print_device(device: &DeviceData, global: &GlobalOpts) -> Result<(), CliError> {
    let view = DeviceView::from(device);
    let now = Utc::now();
    let out = output::render_single(
        global.output,
        &view,
        |v| {
            output::detail_lines(&[
                ("Name", v.name.clone()),
                ("ID", v.identifier.clone()),
                ("Created", util::describe_time(v.created, now)),
                ("IPv4", v.ipv4_address.clone()),
                ("IPv6", v.ipv6_address.clone()),
                ("Public key", v.public_key.clone()),
                ("Key created", util::describe_time(v.key_created, now)),
            ])
        },
        |v| v.identifier.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DeviceCommand::Info => match ctx.manager.device_state().as_ref() {
            DeviceState::LoggedIn(_, device) => print_device(device, global),
            DeviceState::Revoked => Err(CliError::DeviceRevoked),
            DeviceState::LoggedOut => Err(CliError::NotLoggedIn),
        },

        DeviceCommand::Refresh => {
            let device = ctx.run(ctx.manager.update_device_data()).await?;
            print_device(&device, global)
        }

        DeviceCommand::RotateKey { interval } => {
            let interval: Option<Duration> = interval
                .as_deref()
                .map(|value| util::parse_duration("interval", value))
                .transpose()?;

            let bar = util::spinner("Rotating device key", global.quiet);
            let rotated = ctx.run(ctx.manager.rotate_key(interval)).await;
            bar.finish_and_clear();

            let view = RotationView {
                rotated: rotated?,
                public_key: ctx
                    .manager
                    .device_state()
                    .device_data()
                    .map(|d| d.key_data.private_key.public_key().to_base64()),
            };
            let out = output::render_single(
                global.output,
                &view,
                |v| {
                    if v.rotated {
                        format!("Key rotated; new public key {}", v.public_key.as_deref().unwrap_or("-"))
                    } else {
                        "Key is not due for rotation yet".into()
                    }
                },
                |v| v.rotated.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
