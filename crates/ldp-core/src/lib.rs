//! Core domain model and stage handoff contracts for LDP.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "ldp-core";

/// Geographic bounding box for a flight feed query.
///
/// Accepts the `[lon_min, lat_min, lon_max, lat_max]` array layout used by
/// the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]")]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl From<[f64; 4]> for BoundingBox {
    fn from(raw: [f64; 4]) -> Self {
        Self {
            lon_min: raw[0],
            lat_min: raw[1],
            lon_max: raw[2],
            lat_max: raw[3],
        }
    }
}

/// One configured flight sub-source: an airport code plus its query box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportSource {
    pub code: String,
    pub bbox: BoundingBox,
}

/// Raw CityBikes network payload as returned by the feed, with the station
/// list still nested. All leaf fields are optional; the transform stage
/// decides what is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeNetwork {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<NetworkLocation>,
    #[serde(default)]
    pub stations: Vec<StationStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLocation {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatus {
    pub id: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub free_bikes: Option<i64>,
    pub empty_slots: Option<i64>,
}

/// Named-field decode target for one OpenSky positional state vector.
///
/// The wire format is index-based; decoding into named fields happens once,
/// at the feed boundary, so no positional access survives into later stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub icao24: Option<String>,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub altitude: Option<f64>,
    pub on_ground: Option<bool>,
    pub velocity: Option<f64>,
    pub heading: Option<f64>,
}

/// Batch extraction result for one airport. A failed sub-source keeps its
/// code with an empty state list rather than being dropped, so downstream
/// stages see "present but empty" distinctly from "absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportStates {
    pub code: String,
    pub states: Vec<StateVector>,
}

/// One appended bike-share observation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeStationObservation {
    pub network_id: Option<String>,
    pub network_name: Option<String>,
    pub city: String,
    pub country: String,
    pub station_id: String,
    pub station_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub free_bikes: i64,
    pub empty_slots: i64,
    pub total_slots: i64,
    pub timestamp: DateTime<Utc>,
    pub extracted_at: DateTime<Utc>,
}

/// One appended flight observation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightObservation {
    pub airport_code: String,
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub on_ground: bool,
    pub velocity: f64,
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub extracted_at: DateTime<Utc>,
}

/// Why a row was excluded by the mandatory-field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DropReason {
    MissingId,
    MissingPosition,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingId => write!(f, "missing_id"),
            DropReason::MissingPosition => write!(f, "missing_position"),
        }
    }
}

/// Transform stage output: the surviving records plus a per-reason histogram
/// of rows excluded by the quality filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformOutput<T> {
    pub records: Vec<T>,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl<T> Default for TransformOutput<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: BTreeMap::new(),
        }
    }
}

impl<T> TransformOutput<T> {
    pub fn drop_row(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_default() += 1;
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}
