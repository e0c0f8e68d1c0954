//! Pure transform stage: raw feed payloads to flat, validated observations.
//!
//! No network or storage access and no hidden state; the observation instant
//! is an explicit argument, so identical input always yields identical
//! output. Rows failing the mandatory identity/geo invariant are excluded
//! and counted per reason rather than silently discarded.

use chrono::{DateTime, Utc};
use ldp_core::{
    AirportStates, BikeNetwork, BikeStationObservation, DropReason, FlightObservation,
    TransformOutput,
};

pub const CRATE_NAME: &str = "ldp-transform";

const UNKNOWN_PLACE: &str = "Unknown";

/// Flatten nested station lists into one observation row per station,
/// inheriting network identity onto every row. Missing bike/slot counts
/// default to 0 before the total is computed, so
/// `total_slots == free_bikes + empty_slots` holds for every emitted row.
pub fn transform_bikes(
    networks: &[BikeNetwork],
    observed_at: DateTime<Utc>,
) -> TransformOutput<BikeStationObservation> {
    let mut out = TransformOutput::default();

    for network in networks {
        let city = network
            .location
            .as_ref()
            .and_then(|loc| loc.city.clone())
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string());
        let country = network
            .location
            .as_ref()
            .and_then(|loc| loc.country.clone())
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string());

        for station in &network.stations {
            let Some(station_id) = station.id.clone() else {
                out.drop_row(DropReason::MissingId);
                continue;
            };
            let (Some(latitude), Some(longitude)) = (station.latitude, station.longitude) else {
                out.drop_row(DropReason::MissingPosition);
                continue;
            };

            let free_bikes = station.free_bikes.unwrap_or(0);
            let empty_slots = station.empty_slots.unwrap_or(0);

            out.records.push(BikeStationObservation {
                network_id: network.id.clone(),
                network_name: network.name.clone(),
                city: city.clone(),
                country: country.clone(),
                station_id,
                station_name: station.name.clone(),
                latitude,
                longitude,
                free_bikes,
                empty_slots,
                total_slots: free_bikes + empty_slots,
                timestamp: observed_at,
                extracted_at: observed_at,
            });
        }
    }

    out
}

/// Map decoded state vectors to flight observations, tagging each row with
/// the airport whose bounding box produced it. Callsigns are trimmed (an
/// all-whitespace callsign becomes null); optional numerics default to 0 and
/// `on_ground` to false; heading passes through nullable.
pub fn transform_flights(
    airports: &[AirportStates],
    observed_at: DateTime<Utc>,
) -> TransformOutput<FlightObservation> {
    let mut out = TransformOutput::default();

    for airport in airports {
        for state in &airport.states {
            let Some(icao24) = state.icao24.clone() else {
                out.drop_row(DropReason::MissingId);
                continue;
            };
            let (Some(latitude), Some(longitude)) = (state.latitude, state.longitude) else {
                out.drop_row(DropReason::MissingPosition);
                continue;
            };

            let callsign = state
                .callsign
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            out.records.push(FlightObservation {
                airport_code: airport.code.clone(),
                icao24,
                callsign,
                origin_country: state.origin_country.clone(),
                longitude,
                latitude,
                altitude: state.altitude.unwrap_or(0.0),
                on_ground: state.on_ground.unwrap_or(false),
                velocity: state.velocity.unwrap_or(0.0),
                heading: state.heading,
                timestamp: observed_at,
                extracted_at: observed_at,
            });
        }
    }

    out
}
