//! End-to-end pipeline runs against a mock HTTP server and a temporary
//! SQLite database.

use ldp_core::{AirportSource, BoundingBox, DropReason};
use ldp_pipeline::{
    BranchState, DatabaseSettings, FeedEndpoints, Pipeline, PipelineConfig, PipelineSettings,
    SourceSettings,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server_uri: &str, db_url: String) -> PipelineConfig {
    PipelineConfig {
        pipeline: PipelineSettings {
            schedule: "0 * * * *".to_string(),
            scheduler_enabled: false,
            max_retries: 1,
            retry_base_secs: 2.0,
            http_timeout_secs: 5,
        },
        sources: SourceSettings {
            bike_networks: Vec::new(),
            airports: Vec::new(),
        },
        database: DatabaseSettings { url: db_url },
        feeds: FeedEndpoints {
            citybikes_base_url: server_uri.to_string(),
            opensky_base_url: server_uri.to_string(),
        },
    }
}

fn temp_db() -> (TempDir, String) {
    let dir = TempDir::new().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("ldp.db").display());
    (dir, url)
}

#[tokio::test]
async fn two_networks_with_one_defective_station_load_two_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/networks/net-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "network": {
                "id": "net-a",
                "name": "Net A",
                "location": {"city": "Milano", "country": "IT"},
                "stations": [
                    {"id": "s1", "name": "Duomo", "latitude": 45.46, "longitude": 9.19,
                     "free_bikes": 3, "empty_slots": 7},
                    {"id": "s2", "name": "Centrale", "latitude": 45.49, "longitude": 9.20,
                     "free_bikes": 1, "empty_slots": 9}
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/networks/net-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "network": {
                "id": "net-b",
                "name": "Net B",
                "location": {"city": "Torino", "country": "IT"},
                "stations": [
                    {"id": "s3", "name": "Porta Nuova", "latitude": null, "longitude": 7.66,
                     "free_bikes": 2, "empty_slots": 4}
                ]
            }
        })))
        .mount(&server)
        .await;

    let (_dir, db_url) = temp_db();
    let mut config = test_config(&server.uri(), db_url);
    config.sources.bike_networks = vec!["net-a".to_string(), "net-b".to_string()];

    let pipeline = Pipeline::new(config).await.expect("pipeline");
    let summary = pipeline.run_once().await;

    assert_eq!(summary.bikes.state, BranchState::Succeeded);
    assert_eq!(summary.bikes.extracted, 2);
    assert_eq!(summary.bikes.loaded, 2);
    assert_eq!(summary.bikes.dropped[&DropReason::MissingPosition], 1);
    assert!(summary.bikes.error.is_none());

    // The flight branch had nothing configured and still succeeds cleanly.
    assert_eq!(summary.flights.state, BranchState::Succeeded);
    assert_eq!(summary.flights.loaded, 0);

    let counts = pipeline.record_counts().await.unwrap();
    assert_eq!(counts.bike_stations, 2);
    assert_eq!(counts.flights, 0);
}

#[tokio::test]
async fn storage_failure_fails_only_its_own_branch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/states/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "states": [
                ["abc123", "UAL123 ", "US", 0, 0, -73.9, 40.7, 1000.0, false, 200.0, 90.0]
            ]
        })))
        .mount(&server)
        .await;

    let (_dir, db_url) = temp_db();
    let mut config = test_config(&server.uri(), db_url);
    config.sources.airports = vec![AirportSource {
        code: "JFK".to_string(),
        bbox: BoundingBox::from([-74.3, 40.4, -73.6, 41.0]),
    }];

    let pipeline = Pipeline::new(config).await.expect("pipeline");
    sqlx::query("DROP TABLE flights")
        .execute(pipeline.store().pool())
        .await
        .unwrap();

    let summary = pipeline.run_once().await;

    assert_eq!(summary.flights.state, BranchState::Failed);
    assert!(summary.flights.error.is_some());
    assert_eq!(summary.flights.loaded, 0);

    assert_eq!(summary.bikes.state, BranchState::Succeeded);
    assert!(summary.bikes.error.is_none());
}

#[tokio::test]
async fn exhausted_feed_retries_leave_the_branch_successful_and_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/states/all"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_dir, db_url) = temp_db();
    let mut config = test_config(&server.uri(), db_url);
    config.sources.airports = vec![AirportSource {
        code: "JFK".to_string(),
        bbox: BoundingBox::from([-74.3, 40.4, -73.6, 41.0]),
    }];

    let pipeline = Pipeline::new(config).await.expect("pipeline");
    let summary = pipeline.run_once().await;

    // Fetch exhaustion is absorbed as an absent result, not a branch failure.
    assert_eq!(summary.flights.state, BranchState::Succeeded);
    assert_eq!(summary.flights.extracted, 0);
    assert_eq!(summary.flights.loaded, 0);
    assert!(summary.flights.error.is_none());

    let counts = pipeline.record_counts().await.unwrap();
    assert_eq!(counts.flights, 0);
}

#[tokio::test]
async fn repeated_runs_append_distinct_snapshots() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/networks/net-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "network": {
                "id": "net-a",
                "name": "Net A",
                "location": {"city": "Milano", "country": "IT"},
                "stations": [
                    {"id": "s1", "name": "Duomo", "latitude": 45.46, "longitude": 9.19,
                     "free_bikes": 3, "empty_slots": 7}
                ]
            }
        })))
        .mount(&server)
        .await;

    let (_dir, db_url) = temp_db();
    let mut config = test_config(&server.uri(), db_url);
    config.sources.bike_networks = vec!["net-a".to_string()];

    let pipeline = Pipeline::new(config).await.expect("pipeline");
    let first = pipeline.run_once().await;
    let second = pipeline.run_once().await;

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(pipeline.record_counts().await.unwrap().bike_stations, 2);
}
