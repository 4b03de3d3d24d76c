//! Tunnel command handlers: connect, disconnect, reconnect, status.

use std::time::Duration;

use chrono::Utc;

use tunnelkeeper_core::{TunnelState, TunnelStatus, TunnelStatusStream};

use super::Context;
use super::util;
use crate::cli::{ConnectArgs, GlobalOpts, ReconnectArgs};
use crate::error::CliError;
use crate::output;

const DISCONNECT_WAIT: Duration = Duration::from_secs(10);

/// Wait until `done` holds for the current tunnel status.
async fn wait_for(
    stream: &mut TunnelStatusStream,
    limit: Duration,
    what: &str,
    done: impl Fn(&TunnelStatus) -> bool,
) -> Result<TunnelStatus, CliError> {
    let wait = async {
        let mut status = stream.latest();
        while !done(&status) {
            status = stream.changed().await.ok_or(CliError::Cancelled)?;
        }
        Ok::<_, CliError>(status)
    };
    tokio::time::timeout(limit, wait)
        .await
        .map_err(|_| CliError::Timeout {
            what: what.into(),
            seconds: limit.as_secs(),
        })?
}

fn status_line(status: &TunnelStatus, color: bool) -> String {
    let state = output::state_label(&status.state, color);
    match &status.tunnel_relay {
        Some(relay) => format!(
            "{state} via {} ({}, {})",
            relay.relay.hostname, relay.location.city, relay.location.country
        ),
        None => state,
    }
}

fn print_status(ctx: &Context, status: &TunnelStatus, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        global.output,
        status,
        |s| {
            let mut lines = vec![("State", output::state_label(&s.state, ctx.color))];
            if let Some(relay) = &s.tunnel_relay {
                lines.push(("Relay", relay.relay.hostname.clone()));
                lines.push((
                    "Location",
                    format!("{}, {}", relay.location.city, relay.location.country),
                ));
                lines.push(("Endpoint", relay.endpoint.ipv4_relay.to_string()));
            }
            if let Some(since) = s.connecting_date {
                lines.push(("Since", util::describe_time(since, Utc::now())));
            }
            if s.state.is_active() {
                let reachable = if s.is_network_reachable { "yes" } else { "no" };
                lines.push(("Network reachable", reachable.into()));
            }
            if let TunnelState::Error(cause) = &s.state {
                lines.push(("Error", cause.clone()));
            }
            output::detail_lines(&lines)
        },
        |s| s.state.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn connect(ctx: &Context, args: &ConnectArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if ctx.manager.device_state().is_logged_in() {
        if let Err(e) = ctx.run(ctx.manager.rotate_key_if_due()).await {
            tracing::warn!(error = %e, "key rotation failed; connecting with the current key");
        }
    }

    let mut stream = ctx.manager.tunnel_status_stream();
    let bar = util::spinner("Connecting", global.quiet);
    let started = ctx.run(ctx.manager.start_tunnel()).await;
    let connected = match started {
        Ok(()) => {
            wait_for(
                &mut stream,
                Duration::from_secs(args.wait),
                "the tunnel to connect",
                |s| matches!(s.state, TunnelState::Connected(_) | TunnelState::Error(_)),
            )
            .await
        }
        Err(e) => Err(e),
    };
    bar.finish_and_clear();
    let status = connected?;

    if let TunnelState::Error(cause) = status.state {
        return Err(CliError::TunnelFailed { cause });
    }
    print_status(ctx, &status, global)?;

    if args.foreground {
        follow(ctx, stream, global).await?;
    }
    Ok(())
}

/// Print status changes until Ctrl-C, then disconnect.
async fn follow(
    ctx: &Context,
    mut stream: TunnelStatusStream,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !global.quiet {
        eprintln!("Press Ctrl-C to disconnect");
    }
    loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            next = stream.changed() => {
                let Some(status) = next else { break };
                if !global.quiet {
                    eprintln!("{}", status_line(&status, ctx.color));
                }
                if status.state == TunnelState::Disconnected {
                    return Ok(());
                }
            }
        }
    }
    disconnect(ctx, global).await
}

pub async fn disconnect(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let mut stream = ctx.manager.tunnel_status_stream();
    let bar = util::spinner("Disconnecting", global.quiet);
    let stopped = match ctx.run(ctx.manager.stop_tunnel()).await {
        Ok(()) => {
            wait_for(&mut stream, DISCONNECT_WAIT, "the tunnel to disconnect", |s| {
                !s.state.is_active()
                    && !matches!(s.state, TunnelState::Disconnecting(_))
            })
            .await
        }
        Err(e) => Err(e),
    };
    bar.finish_and_clear();
    let status = stopped?;
    if !global.quiet {
        eprintln!("{}", status_line(&status, ctx.color));
    }
    Ok(())
}

pub async fn reconnect(
    ctx: &Context,
    args: &ReconnectArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    ctx.run(ctx.manager.reconnect_tunnel(args.new_relay)).await?;
    if !global.quiet {
        eprintln!("Reconnect requested");
    }
    Ok(())
}

pub fn status(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    print_status(ctx, &ctx.manager.tunnel_status(), global)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_without_relay_is_just_the_state() {
        let status = TunnelStatus::with_state(TunnelState::Disconnected);
        assert_eq!(status_line(&status, false), "disconnected");
    }
}
