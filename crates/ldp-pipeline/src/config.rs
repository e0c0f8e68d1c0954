//! Pipeline configuration: a YAML file plus a small set of environment
//! overrides. The loaded value is immutable and handed to each component at
//! construction; nothing reads configuration through ambient state.

use std::path::Path;

use anyhow::{Context, Result};
use ldp_core::AirportSource;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub pipeline: PipelineSettings,
    pub sources: SourceSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub feeds: FeedEndpoints,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default)]
    pub scheduler_enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: f64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub bike_networks: Vec<String>,
    #[serde(default)]
    pub airports: Vec<AirportSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEndpoints {
    #[serde(default = "default_citybikes_base")]
    pub citybikes_base_url: String,
    #[serde(default = "default_opensky_base")]
    pub opensky_base_url: String,
}

impl Default for FeedEndpoints {
    fn default() -> Self {
        Self {
            citybikes_base_url: default_citybikes_base(),
            opensky_base_url: default_opensky_base(),
        }
    }
}

fn default_schedule() -> String {
    "0 * * * *".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_secs() -> f64 {
    2.0
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_citybikes_base() -> String {
    "https://api.citybik.es/v2".to_string()
}

fn default_opensky_base() -> String {
    "https://opensky-network.org/api".to_string()
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LDP_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(enabled) = std::env::var("LDP_SCHEDULER_ENABLED") {
            self.pipeline.scheduler_enabled =
                matches!(enabled.as_str(), "1" | "true" | "TRUE" | "True");
        }
    }
}
