//! Relay list handler. Reads the relay cache directly; no manager needed.

use tabled::Tabled;

use tunnelkeeper_core::{FileRelayCache, Relay, RelayCache};

use crate::cli::{GlobalOpts, RelaysArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RelayRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "City")]
    city: String,
    #[tabled(rename = "IPv4")]
    ipv4: String,
    #[tabled(rename = "Weight")]
    weight: u64,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&Relay> for RelayRow {
    fn from(r: &Relay) -> Self {
        Self {
            hostname: r.hostname.clone(),
            country: format!("{} ({})", r.location.country, r.location.country_code),
            city: format!("{} ({})", r.location.city, r.location.city_code),
            ipv4: r.ipv4_addr_in.to_string(),
            weight: r.weight,
            active: if r.active { "yes" } else { "no" }.into(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &RelaysArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let cache = FileRelayCache::new(cfg.relay_cache_path());
    let cached = cache.read().ok_or_else(|| CliError::NoRelays {
        path: cache.path().display().to_string(),
    })?;

    let relays: Vec<Relay> = cached
        .relays
        .relays
        .into_iter()
        .filter(|r| {
            args.country
                .as_deref()
                .is_none_or(|cc| r.location.country_code.eq_ignore_ascii_case(cc))
        })
        .collect();

    let out = output::render_list(
        global.output,
        &relays,
        |r| RelayRow::from(r),
        |r| r.hostname.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
