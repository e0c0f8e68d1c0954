//! Retrying HTTP fetch plus feed-specific batch extraction.
//!
//! The fetcher retries transient failures with exponential backoff; the batch
//! extractors absorb per-sub-source failures so a single bad feed endpoint
//! never sinks the whole extraction.

mod citybikes;
mod decode;
mod http;
mod opensky;

pub use citybikes::CityBikesExtractor;
pub use decode::{decode_state_vector, DecodeError};
pub use http::{
    classify_reqwest_error, classify_status, FetchError, HttpClientConfig, HttpFetcher,
    RetryClass, RetryPolicy,
};
pub use opensky::OpenSkyExtractor;

use thiserror::Error;

pub const CRATE_NAME: &str = "ldp-extract";

/// Failure extracting one sub-source. Batch extraction logs these and moves
/// on; they never escape as branch-level errors.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
