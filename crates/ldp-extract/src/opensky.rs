//! OpenSky state-vector extraction per airport bounding box.

use std::sync::Arc;

use ldp_core::{AirportSource, AirportStates, BoundingBox, StateVector};
use serde_json::Value;
use tracing::{info, warn};

use crate::decode::decode_state_vector;
use crate::http::HttpFetcher;
use crate::ExtractError;

#[derive(Debug)]
pub struct OpenSkyExtractor {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl OpenSkyExtractor {
    pub fn new(http: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch all state vectors inside one bounding box. An absent or null
    /// `states` key yields an empty list; malformed vectors are logged and
    /// skipped rather than failing the sub-source.
    pub async fn extract_states(&self, bbox: &BoundingBox) -> Result<Vec<StateVector>, ExtractError> {
        let url = format!("{}/states/all", self.base_url.trim_end_matches('/'));
        let params = [
            ("lamin", bbox.lat_min.to_string()),
            ("lomin", bbox.lon_min.to_string()),
            ("lamax", bbox.lat_max.to_string()),
            ("lomax", bbox.lon_max.to_string()),
        ];

        let value = self.http.fetch_json(&url, &params).await?;
        let mut states = Vec::new();

        if let Some(raw_states) = value.get("states").and_then(Value::as_array) {
            for raw in raw_states {
                match decode_state_vector(raw) {
                    Ok(state) => states.push(state),
                    Err(error) => warn!(%error, "skipping malformed state vector"),
                }
            }
        }

        Ok(states)
    }

    /// Fetch state vectors for every configured airport. The result always
    /// has one entry per airport in input order; a failed sub-source keeps
    /// its code with an empty state list. Never errors.
    pub async fn extract_for_airports(&self, airports: &[AirportSource]) -> Vec<AirportStates> {
        let mut results = Vec::with_capacity(airports.len());

        for airport in airports {
            let states = match self.extract_states(&airport.bbox).await {
                Ok(states) => {
                    info!(airport = %airport.code, flights = states.len(), "extracted state vectors");
                    states
                }
                Err(error) => {
                    warn!(
                        airport = %airport.code,
                        %error,
                        "recording empty result after failed extraction"
                    );
                    Vec::new()
                }
            };
            results.push(AirportStates {
                code: airport.code.clone(),
                states,
            });
        }

        results
    }
}
