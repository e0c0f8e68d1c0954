//! Two-branch pipeline orchestration.
//!
//! The bike chain and the flight chain run concurrently with no shared
//! mutable state; within a branch, stages run strictly in dependency order
//! and hand off by direct function composition. Cross-branch isolation means
//! a failed branch leaves its sibling's outcome untouched.

mod branch;
mod config;

pub use branch::{BranchOutcome, BranchState, FeedKind};
pub use config::{
    DatabaseSettings, FeedEndpoints, PipelineConfig, PipelineSettings, SourceSettings,
    DEFAULT_CONFIG_PATH,
};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ldp_extract::{CityBikesExtractor, HttpClientConfig, HttpFetcher, OpenSkyExtractor, RetryPolicy};
use ldp_storage::{ObservationStore, TableCounts};
use ldp_transform::{transform_bikes, transform_flights};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use branch::BranchRun;

pub const CRATE_NAME: &str = "ldp-pipeline";

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub bikes: BranchOutcome,
    pub flights: BranchOutcome,
}

pub struct Pipeline {
    config: PipelineConfig,
    citybikes: CityBikesExtractor,
    opensky: OpenSkyExtractor,
    store: ObservationStore,
}

impl Pipeline {
    pub async fn new(config: PipelineConfig) -> Result<Self> {
        let http = Arc::new(
            HttpFetcher::new(HttpClientConfig {
                timeout: Duration::from_secs(config.pipeline.http_timeout_secs),
                user_agent: Some(format!("ldp/{}", env!("CARGO_PKG_VERSION"))),
                retry: RetryPolicy {
                    max_retries: config.pipeline.max_retries,
                    base_secs: config.pipeline.retry_base_secs,
                    ..RetryPolicy::default()
                },
            })
            .context("building http fetcher")?,
        );

        let citybikes =
            CityBikesExtractor::new(http.clone(), config.feeds.citybikes_base_url.clone());
        let opensky = OpenSkyExtractor::new(http, config.feeds.opensky_base_url.clone());
        let store = ObservationStore::connect(&config.database.url)
            .await
            .context("connecting observation store")?;

        Ok(Self {
            config,
            citybikes,
            opensky,
            store,
        })
    }

    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    /// Run both branches to completion, concurrently. Branch failures are
    /// reported in the summary, never propagated as a run-level error.
    pub async fn run_once(&self) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "pipeline run starting");

        let (bikes, flights) = tokio::join!(self.run_bike_branch(), self.run_flight_branch());

        let finished_at = Utc::now();
        info!(
            %run_id,
            bikes = ?bikes.state,
            bike_rows = bikes.loaded,
            flights = ?flights.state,
            flight_rows = flights.loaded,
            "pipeline run finished"
        );

        RunSummary {
            run_id,
            started_at,
            finished_at,
            bikes,
            flights,
        }
    }

    async fn run_bike_branch(&self) -> BranchOutcome {
        let mut run = BranchRun::new(FeedKind::Bikes);

        run.enter(BranchState::Extracting);
        let networks = self
            .citybikes
            .extract_all_networks(&self.config.sources.bike_networks)
            .await;
        run.extracted = networks.len();
        if networks.is_empty() {
            info!("no bike networks extracted, nothing to do");
            return run.succeed(0);
        }

        run.enter(BranchState::Transforming);
        let output = transform_bikes(&networks, Utc::now());
        run.dropped = output.dropped;
        if output.records.is_empty() {
            info!("no bike observations survived transformation, nothing to load");
            return run.succeed(0);
        }

        run.enter(BranchState::Loading);
        match self.store.load_bikes(&output.records).await {
            Ok(loaded) => run.succeed(loaded),
            Err(err) => run.fail(err),
        }
    }

    async fn run_flight_branch(&self) -> BranchOutcome {
        let mut run = BranchRun::new(FeedKind::Flights);

        run.enter(BranchState::Extracting);
        let airports = self
            .opensky
            .extract_for_airports(&self.config.sources.airports)
            .await;
        run.extracted = airports.iter().map(|a| a.states.len()).sum();
        if airports.iter().all(|a| a.states.is_empty()) {
            info!("no flight states extracted, nothing to do");
            return run.succeed(0);
        }

        run.enter(BranchState::Transforming);
        let output = transform_flights(&airports, Utc::now());
        run.dropped = output.dropped;
        if output.records.is_empty() {
            info!("no flight observations survived transformation, nothing to load");
            return run.succeed(0);
        }

        run.enter(BranchState::Loading);
        match self.store.load_flights(&output.records).await {
            Ok(loaded) => run.succeed(loaded),
            Err(err) => run.fail(err),
        }
    }

    pub async fn record_counts(&self) -> Result<TableCounts> {
        Ok(self.store.record_counts().await?)
    }
}

/// Build the cron scheduler for recurring runs, or `None` when scheduling is
/// disabled in config. The caller owns starting and shutting it down.
pub async fn maybe_build_scheduler(pipeline: Arc<Pipeline>) -> Result<Option<JobScheduler>> {
    if !pipeline.config.pipeline.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = pipeline.config.pipeline.schedule.clone();
    let job_pipeline = pipeline.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
        let pipeline = job_pipeline.clone();
        Box::pin(async move {
            let summary = pipeline.run_once().await;
            if summary.bikes.state == BranchState::Failed
                || summary.flights.state == BranchState::Failed
            {
                error!(run_id = %summary.run_id, "scheduled run finished with a failed branch");
            } else {
                info!(
                    run_id = %summary.run_id,
                    bike_rows = summary.bikes.loaded,
                    flight_rows = summary.flights.loaded,
                    "scheduled run finished"
                );
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;

    Ok(Some(sched))
}
