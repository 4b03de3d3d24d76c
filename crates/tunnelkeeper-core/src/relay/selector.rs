// Relay selection: filter by constraints, then pick by weight.

use std::net::{SocketAddrV4, SocketAddrV6};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::model::{
    Constraint, LocationConstraint, PortRange, Relay, RelayConstraints, RelayEndpoint, RelayList,
    RelaySelectorResult,
};

/// Port used when the relay list carries no port ranges.
pub const DEFAULT_PORT: u16 = 51820;

/// Pick a relay satisfying `constraints`, or `None` if nothing matches.
pub fn select_relay(
    relays: &RelayList,
    constraints: &RelayConstraints,
) -> Option<RelaySelectorResult> {
    select_relay_with_rng(relays, constraints, &mut rand::thread_rng())
}

pub fn select_relay_with_rng<R: Rng + ?Sized>(
    relays: &RelayList,
    constraints: &RelayConstraints,
    rng: &mut R,
) -> Option<RelaySelectorResult> {
    let candidates: Vec<&Relay> = relays
        .relays
        .iter()
        .filter(|relay| relay.active && matches_location(relay, &constraints.location))
        .collect();

    let relay = pick_weighted(&candidates, rng)?;
    let port = match constraints.port {
        Constraint::Only(port) => port,
        Constraint::Any => pick_port(&relays.port_ranges, rng),
    };

    Some(RelaySelectorResult {
        endpoint: RelayEndpoint {
            ipv4_relay: SocketAddrV4::new(relay.ipv4_addr_in, port),
            ipv6_relay: relay
                .ipv6_addr_in
                .map(|addr| SocketAddrV6::new(addr, port, 0, 0)),
            public_key: relay.public_key.clone(),
        },
        relay: relay.clone(),
        location: relay.location.clone(),
    })
}

fn matches_location(relay: &Relay, constraint: &Constraint<LocationConstraint>) -> bool {
    let Constraint::Only(location) = constraint else {
        return true;
    };
    let here = &relay.location;
    match location {
        LocationConstraint::Country(country) => {
            relay.include_in_country && here.country_code == *country
        }
        LocationConstraint::City(country, city) => {
            here.country_code == *country && here.city_code == *city
        }
        LocationConstraint::Hostname(country, city, hostname) => {
            here.country_code == *country && here.city_code == *city && relay.hostname == *hostname
        }
    }
}

fn pick_weighted<'a, R: Rng + ?Sized>(candidates: &[&'a Relay], rng: &mut R) -> Option<&'a Relay> {
    let total: u64 = candidates.iter().map(|relay| relay.weight).sum();
    if total == 0 {
        return candidates.choose(rng).copied();
    }

    let mut remaining = rng.gen_range(0..total);
    for &relay in candidates {
        if remaining < relay.weight {
            return Some(relay);
        }
        remaining -= relay.weight;
    }
    None
}

fn pick_port<R: Rng + ?Sized>(ranges: &[PortRange], rng: &mut R) -> u16 {
    let total: u32 = ranges
        .iter()
        .filter(|range| range.start <= range.end)
        .map(|range| u32::from(range.end - range.start) + 1)
        .sum();
    if total == 0 {
        return DEFAULT_PORT;
    }

    let mut remaining = rng.gen_range(0..total);
    for range in ranges.iter().filter(|range| range.start <= range.end) {
        let size = u32::from(range.end - range.start) + 1;
        if remaining < size {
            return u16::try_from(u32::from(range.start) + remaining).unwrap_or(DEFAULT_PORT);
        }
        remaining -= size;
    }
    DEFAULT_PORT
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::model::RelayLocation;

    fn relay(hostname: &str, country: &str, city: &str, weight: u64) -> Relay {
        Relay {
            hostname: hostname.into(),
            location: RelayLocation {
                country: country.to_uppercase(),
                country_code: country.into(),
                city: city.to_uppercase(),
                city_code: city.into(),
            },
            active: true,
            include_in_country: true,
            weight,
            ipv4_addr_in: Ipv4Addr::new(10, 0, 0, 1),
            ipv6_addr_in: None,
            public_key: format!("{hostname}-key"),
        }
    }

    fn list(relays: Vec<Relay>) -> RelayList {
        RelayList {
            relays,
            port_ranges: vec![PortRange {
                start: 53,
                end: 53,
            }],
        }
    }

    fn only(location: LocationConstraint) -> RelayConstraints {
        RelayConstraints {
            location: Constraint::Only(location),
            port: Constraint::Any,
        }
    }

    #[test]
    fn selects_only_matching_hostname() {
        let relays = list(vec![
            relay("se-got-001", "se", "got", 100),
            relay("se-sto-001", "se", "sto", 100),
        ]);
        let constraints = only(LocationConstraint::Hostname(
            "se".into(),
            "sto".into(),
            "se-sto-001".into(),
        ));

        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = select_relay_with_rng(&relays, &constraints, &mut rng).unwrap();
            assert_eq!(result.relay.hostname, "se-sto-001");
            assert_eq!(result.endpoint.ipv4_relay.port(), 53);
        }
    }

    #[test]
    fn no_match_yields_none() {
        let relays = list(vec![relay("se-got-001", "se", "got", 100)]);
        assert!(select_relay(&relays, &only(LocationConstraint::Country("de".into()))).is_none());
    }

    #[test]
    fn inactive_relays_are_skipped() {
        let mut inactive = relay("se-got-001", "se", "got", 100);
        inactive.active = false;
        let relays = list(vec![inactive]);
        assert!(select_relay(&relays, &RelayConstraints::default()).is_none());
    }

    #[test]
    fn zero_weights_still_select() {
        let relays = list(vec![relay("se-got-001", "se", "got", 0)]);
        let result = select_relay(&relays, &RelayConstraints::default()).unwrap();
        assert_eq!(result.relay.hostname, "se-got-001");
    }

    #[test]
    fn zero_weight_relay_loses_to_weighted_one() {
        let relays = list(vec![
            relay("se-got-001", "se", "got", 0),
            relay("se-got-002", "se", "got", 10),
        ]);
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result =
                select_relay_with_rng(&relays, &RelayConstraints::default(), &mut rng).unwrap();
            assert_eq!(result.relay.hostname, "se-got-002");
        }
    }

    #[test]
    fn port_constraint_wins_and_fallback_port_applies() {
        let mut relays = list(vec![relay("se-got-001", "se", "got", 1)]);
        let mut constraints = RelayConstraints::default();
        constraints.port = Constraint::Only(4000);
        let result = select_relay(&relays, &constraints).unwrap();
        assert_eq!(result.endpoint.ipv4_relay.port(), 4000);

        relays.port_ranges.clear();
        let result = select_relay(&relays, &RelayConstraints::default()).unwrap();
        assert_eq!(result.endpoint.ipv4_relay.port(), DEFAULT_PORT);
    }

    #[test]
    fn country_constraint_respects_include_in_country() {
        let mut excluded = relay("se-got-001", "se", "got", 1);
        excluded.include_in_country = false;
        let relays = list(vec![excluded]);

        assert!(select_relay(&relays, &only(LocationConstraint::Country("se".into()))).is_none());
        assert!(
            select_relay(
                &relays,
                &only(LocationConstraint::City("se".into(), "got".into()))
            )
            .is_some()
        );
    }
}
