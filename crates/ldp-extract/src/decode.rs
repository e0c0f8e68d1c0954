//! Positional state-vector decoding for the OpenSky feed.
//!
//! The upstream wire format is a fixed-order array; the index layout below is
//! a contract of the feed, not of this crate. Decoding into `StateVector`
//! happens here, once, with explicit bounds and type checks, so downstream
//! stages never index into raw arrays.

use ldp_core::StateVector;
use serde_json::Value;
use thiserror::Error;

const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_ORIGIN_COUNTRY: usize = 2;
const IDX_LONGITUDE: usize = 5;
const IDX_LATITUDE: usize = 6;
const IDX_ALTITUDE: usize = 7;
const IDX_ON_GROUND: usize = 8;
const IDX_VELOCITY: usize = 9;
const IDX_HEADING: usize = 10;

/// Indices 0..=10 must be present for a vector to be decodable.
const STATE_VECTOR_MIN_LEN: usize = IDX_HEADING + 1;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("state vector is not an array")]
    NotAnArray,
    #[error("state vector too short: {len} entries, need {min}")]
    TooShort { len: usize, min: usize },
    #[error("unexpected type at index {index}: expected {expected}")]
    UnexpectedType { index: usize, expected: &'static str },
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn str_at(slots: &[Value], index: usize) -> Result<Option<String>, DecodeError> {
    match &slots[index] {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(DecodeError::UnexpectedType {
            index,
            expected: "string",
        }),
    }
}

fn f64_at(slots: &[Value], index: usize) -> Result<Option<f64>, DecodeError> {
    match &slots[index] {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        _ => Err(DecodeError::UnexpectedType {
            index,
            expected: "number",
        }),
    }
}

fn bool_at(slots: &[Value], index: usize) -> Result<Option<bool>, DecodeError> {
    match &slots[index] {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        _ => Err(DecodeError::UnexpectedType {
            index,
            expected: "boolean",
        }),
    }
}

/// Decode one positional state vector into named fields. Null slots pass
/// through as `None`; a short vector or a wrong-typed slot is a decode error
/// rather than a panic.
pub fn decode_state_vector(value: &Value) -> Result<StateVector, DecodeError> {
    let slots = value.as_array().ok_or(DecodeError::NotAnArray)?;
    if slots.len() < STATE_VECTOR_MIN_LEN {
        return Err(DecodeError::TooShort {
            len: slots.len(),
            min: STATE_VECTOR_MIN_LEN,
        });
    }

    Ok(StateVector {
        icao24: str_at(slots, IDX_ICAO24)?,
        callsign: str_at(slots, IDX_CALLSIGN)?,
        origin_country: str_at(slots, IDX_ORIGIN_COUNTRY)?,
        longitude: f64_at(slots, IDX_LONGITUDE)?,
        latitude: f64_at(slots, IDX_LATITUDE)?,
        altitude: f64_at(slots, IDX_ALTITUDE)?,
        on_ground: bool_at(slots, IDX_ON_GROUND)?,
        velocity: f64_at(slots, IDX_VELOCITY)?,
        heading: f64_at(slots, IDX_HEADING)?,
    })
}
