//! Relay constraint handlers.

use serde::Serialize;

use tunnelkeeper_core::{Constraint, LocationConstraint, RelayConstraints};

use super::Context;
use crate::cli::{ConstraintsArgs, ConstraintsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ConstraintsView {
    location: String,
    port: String,
}

impl From<&RelayConstraints> for ConstraintsView {
    fn from(constraints: &RelayConstraints) -> Self {
        Self {
            location: constraints
                .location
                .value()
                .map_or_else(|| "any".into(), ToString::to_string),
            port: constraints
                .port
                .value()
                .map_or_else(|| "any".into(), ToString::to_string),
        }
    }
}

/// Build constraints from the `constraints set` flags.
fn build(
    country: &str,
    city: Option<&str>,
    hostname: Option<&str>,
    port: Option<u16>,
) -> Result<RelayConstraints, CliError> {
    let country = country.trim().to_lowercase();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CliError::Validation {
            field: "country".into(),
            reason: format!("expected a two-letter country code, got {country:?}"),
        });
    }

    let location = match (city.map(str::to_lowercase), hostname) {
        (None, None) => LocationConstraint::Country(country),
        (Some(city), None) => LocationConstraint::City(country, city),
        (Some(city), Some(hostname)) => {
            LocationConstraint::Hostname(country, city, hostname.to_lowercase())
        }
        (None, Some(_)) => {
            return Err(CliError::Validation {
                field: "hostname".into(),
                reason: "--hostname requires --city".into(),
            });
        }
    };

    Ok(RelayConstraints {
        location: Constraint::Only(location),
        port: port.map_or(Constraint::Any, Constraint::Only),
    })
}

fn print_constraints(constraints: &RelayConstraints, global: &GlobalOpts) -> Result<(), CliError> {
    let view = ConstraintsView::from(constraints);
    let out = output::render_single(
        global.output,
        &view,
        |v| output::detail_lines(&[("Location", v.location.clone()), ("Port", v.port.clone())]),
        |v| v.location.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    ctx: &Context,
    args: ConstraintsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ConstraintsCommand::Show => print_constraints(&ctx.manager.settings().relay_constraints, global),

        ConstraintsCommand::Set {
            country,
            city,
            hostname,
            port,
        } => {
            let constraints = build(&country, city.as_deref(), hostname.as_deref(), port)?;
            ctx.run(ctx.manager.set_relay_constraints(constraints.clone()))
                .await?;
            print_constraints(&constraints, global)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn narrowest_flag_wins() {
        let constraints = build("SE", Some("GOT"), Some("se-got-wg-001"), Some(53)).unwrap();
        assert_eq!(
            constraints.location,
            Constraint::Only(LocationConstraint::Hostname(
                "se".into(),
                "got".into(),
                "se-got-wg-001".into()
            ))
        );
        assert_eq!(constraints.port, Constraint::Only(53));

        let constraints = build("de", None, None, None).unwrap();
        assert_eq!(
            constraints.location,
            Constraint::Only(LocationConstraint::Country("de".into()))
        );
        assert_eq!(constraints.port, Constraint::Any);
    }

    #[test]
    fn bad_country_codes_are_rejected() {
        assert!(build("sweden", None, None, None).is_err());
        assert!(build("s1", None, None, None).is_err());
        assert!(build("se", None, Some("se-got-wg-001"), None).is_err());
    }

    #[test]
    fn any_renders_as_any() {
        let view = ConstraintsView::from(&RelayConstraints {
            location: Constraint::Any,
            port: Constraint::Any,
        });
        assert_eq!(view.location, "any");
        assert_eq!(view.port, "any");
    }
}
