//! CityBikes network extraction.

use std::sync::Arc;

use ldp_core::BikeNetwork;
use serde::Deserialize;
use tracing::{info, warn};

use crate::http::HttpFetcher;
use crate::ExtractError;

#[derive(Debug, Deserialize)]
struct NetworkEnvelope {
    network: BikeNetwork,
}

#[derive(Debug)]
pub struct CityBikesExtractor {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl CityBikesExtractor {
    pub fn new(http: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch one network with its nested station list. A payload without the
    /// `network` key is a decode failure for this sub-source.
    pub async fn extract_network(&self, network_id: &str) -> Result<BikeNetwork, ExtractError> {
        let url = format!(
            "{}/networks/{}",
            self.base_url.trim_end_matches('/'),
            network_id
        );
        let value = self.http.fetch_json(&url, &[]).await?;
        let envelope: NetworkEnvelope =
            serde_json::from_value(value).map_err(crate::DecodeError::from)?;
        Ok(envelope.network)
    }

    /// Fetch every configured network, tolerating partial failure: a failed
    /// sub-source is logged and excluded, and successes keep their input
    /// order. Never errors.
    pub async fn extract_all_networks(&self, network_ids: &[String]) -> Vec<BikeNetwork> {
        let mut networks = Vec::with_capacity(network_ids.len());

        for network_id in network_ids {
            match self.extract_network(network_id).await {
                Ok(network) => {
                    info!(
                        network = %network_id,
                        stations = network.stations.len(),
                        "extracted bike network"
                    );
                    networks.push(network);
                }
                Err(error) => {
                    warn!(network = %network_id, %error, "skipping network after failed extraction");
                }
            }
        }

        info!(
            extracted = networks.len(),
            requested = network_ids.len(),
            "bike network extraction finished"
        );
        networks
    }
}
