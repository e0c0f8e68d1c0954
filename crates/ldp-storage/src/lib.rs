//! Append-only observation log over SQLite.
//!
//! Two flat, denormalized tables keyed by an autoincrement surrogate. No
//! uniqueness constraints and no update or delete path: every pipeline run
//! appends a fresh snapshot, and "latest state" queries select the maximum
//! `extracted_at` per domain key outside this crate.

use std::str::FromStr;

use ldp_core::{BikeStationObservation, FlightObservation};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info};

pub const CRATE_NAME: &str = "ldp-storage";

const BIKE_STATIONS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS bike_stations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    network_id TEXT,
    network_name TEXT,
    city TEXT,
    country TEXT,
    station_id TEXT NOT NULL,
    station_name TEXT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    free_bikes INTEGER NOT NULL,
    empty_slots INTEGER NOT NULL,
    total_slots INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    extracted_at TEXT NOT NULL
)";

const FLIGHTS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS flights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    airport_code TEXT NOT NULL,
    icao24 TEXT NOT NULL,
    callsign TEXT,
    origin_country TEXT,
    longitude REAL NOT NULL,
    latitude REAL NOT NULL,
    altitude REAL NOT NULL,
    on_ground INTEGER NOT NULL,
    velocity REAL NOT NULL,
    heading REAL,
    timestamp TEXT NOT NULL,
    extracted_at TEXT NOT NULL
)";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub bike_stations: i64,
    pub flights: i64,
}

#[derive(Debug, Clone)]
pub struct ObservationStore {
    pool: SqlitePool,
}

impl ObservationStore {
    /// Open (creating if needed) the SQLite database at `url` and ensure both
    /// observation tables exist. The DDL is idempotent.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        info!(url, "connecting to observation store");
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> Result<(), StorageError> {
        sqlx::query(BIKE_STATIONS_DDL).execute(&self.pool).await?;
        sqlx::query(FLIGHTS_DDL).execute(&self.pool).await?;
        Ok(())
    }

    /// Append bike observations, one insert per record, no dedup or upsert.
    /// Empty input returns 0 without touching storage. Failures propagate;
    /// this stage never retries.
    pub async fn load_bikes(
        &self,
        records: &[BikeStationObservation],
    ) -> Result<u64, StorageError> {
        if records.is_empty() {
            debug!("no bike observations to load");
            return Ok(0);
        }

        for record in records {
            sqlx::query(
                "INSERT INTO bike_stations (network_id, network_name, city, country, \
                 station_id, station_name, latitude, longitude, free_bikes, empty_slots, \
                 total_slots, timestamp, extracted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )
            .bind(&record.network_id)
            .bind(&record.network_name)
            .bind(&record.city)
            .bind(&record.country)
            .bind(&record.station_id)
            .bind(&record.station_name)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(record.free_bikes)
            .bind(record.empty_slots)
            .bind(record.total_slots)
            .bind(record.timestamp)
            .bind(record.extracted_at)
            .execute(&self.pool)
            .await?;
        }

        info!(rows = records.len(), "appended bike observations");
        Ok(records.len() as u64)
    }

    /// Append flight observations; same contract as [`Self::load_bikes`].
    pub async fn load_flights(&self, records: &[FlightObservation]) -> Result<u64, StorageError> {
        if records.is_empty() {
            debug!("no flight observations to load");
            return Ok(0);
        }

        for record in records {
            sqlx::query(
                "INSERT INTO flights (airport_code, icao24, callsign, origin_country, \
                 longitude, latitude, altitude, on_ground, velocity, heading, \
                 timestamp, extracted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .bind(&record.airport_code)
            .bind(&record.icao24)
            .bind(&record.callsign)
            .bind(&record.origin_country)
            .bind(record.longitude)
            .bind(record.latitude)
            .bind(record.altitude)
            .bind(record.on_ground)
            .bind(record.velocity)
            .bind(record.heading)
            .bind(record.timestamp)
            .bind(record.extracted_at)
            .execute(&self.pool)
            .await?;
        }

        info!(rows = records.len(), "appended flight observations");
        Ok(records.len() as u64)
    }

    pub async fn record_counts(&self) -> Result<TableCounts, StorageError> {
        let bike_stations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bike_stations")
            .fetch_one(&self.pool)
            .await?;
        let flights: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flights")
            .fetch_one(&self.pool)
            .await?;
        Ok(TableCounts {
            bike_stations,
            flights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn bike(station_id: &str) -> BikeStationObservation {
        let at = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).single().unwrap();
        BikeStationObservation {
            network_id: Some("bikemi".to_string()),
            network_name: Some("BikeMi".to_string()),
            city: "Milano".to_string(),
            country: "IT".to_string(),
            station_id: station_id.to_string(),
            station_name: Some("Duomo".to_string()),
            latitude: 45.46,
            longitude: 9.19,
            free_bikes: 3,
            empty_slots: 7,
            total_slots: 10,
            timestamp: at,
            extracted_at: at,
        }
    }

    fn flight(icao24: &str) -> FlightObservation {
        let at = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).single().unwrap();
        FlightObservation {
            airport_code: "MXP".to_string(),
            icao24: icao24.to_string(),
            callsign: Some("UAL123".to_string()),
            origin_country: Some("US".to_string()),
            longitude: -73.9,
            latitude: 40.7,
            altitude: 1000.0,
            on_ground: false,
            velocity: 200.0,
            heading: None,
            timestamp: at,
            extracted_at: at,
        }
    }

    async fn temp_store() -> (tempfile::TempDir, ObservationStore) {
        let dir = tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("ldp.db").display());
        let store = ObservationStore::connect(&url).await.expect("connect");
        (dir, store)
    }

    #[tokio::test]
    async fn loading_k_records_appends_exactly_k_rows() {
        let (_dir, store) = temp_store().await;

        let first = store.load_bikes(&[bike("s1"), bike("s2")]).await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(store.record_counts().await.unwrap().bike_stations, 2);

        // A second load appends without disturbing prior rows.
        let second = store.load_bikes(&[bike("s1")]).await.unwrap();
        assert_eq!(second, 1);
        assert_eq!(store.record_counts().await.unwrap().bike_stations, 3);

        let distinct: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT station_id) FROM bike_stations")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(distinct, 2);
    }

    #[tokio::test]
    async fn empty_input_short_circuits_without_storage_access() {
        let (_dir, store) = temp_store().await;

        assert_eq!(store.load_bikes(&[]).await.unwrap(), 0);
        assert_eq!(store.load_flights(&[]).await.unwrap(), 0);

        let counts = store.record_counts().await.unwrap();
        assert_eq!(counts.bike_stations, 0);
        assert_eq!(counts.flights, 0);
    }

    #[tokio::test]
    async fn flight_rows_round_trip_their_nullable_columns() {
        let (_dir, store) = temp_store().await;

        store
            .load_flights(&[flight("abc123"), flight("def456")])
            .await
            .unwrap();

        let (icao24, callsign, heading): (String, Option<String>, Option<f64>) =
            sqlx::query_as("SELECT icao24, callsign, heading FROM flights ORDER BY id LIMIT 1")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(icao24, "abc123");
        assert_eq!(callsign.as_deref(), Some("UAL123"));
        assert!(heading.is_none());
    }

    #[tokio::test]
    async fn storage_failure_propagates_to_the_caller() {
        let (_dir, store) = temp_store().await;
        sqlx::query("DROP TABLE flights")
            .execute(store.pool())
            .await
            .unwrap();

        let result = store.load_flights(&[flight("abc123")]).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[tokio::test]
    async fn reconnecting_reuses_existing_tables() {
        let dir = tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("ldp.db").display());

        let store = ObservationStore::connect(&url).await.unwrap();
        store.load_bikes(&[bike("s1")]).await.unwrap();
        drop(store);

        let reopened = ObservationStore::connect(&url).await.unwrap();
        assert_eq!(reopened.record_counts().await.unwrap().bike_stations, 1);
    }
}
