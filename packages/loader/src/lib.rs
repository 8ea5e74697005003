#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Concurrent fetch and normalization of the two map datasets.
//!
//! The incident CSV and the region boundary `GeoJSON` are downloaded at the
//! same time and joined: if either download or parse fails, the whole load
//! fails and nothing downstream runs.

pub mod boundaries;
pub mod incidents;
pub mod retry;

#[cfg(test)]
mod test_server;

use std::collections::BTreeSet;
use std::time::Duration;

use geojson::FeatureCollection;
use traffic_map_config::SourcesConfig;
use traffic_map_incident_models::IncidentRow;

/// Errors that can occur while loading the datasets.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The incident CSV could not be parsed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// The incident CSV lacks a required column.
    #[error("Incident CSV is missing the `{0}` column")]
    MissingColumn(&'static str),

    /// The boundary document is not valid `GeoJSON`.
    #[error("GeoJSON parse error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// The boundary document parsed but has the wrong shape.
    #[error("Invalid boundary data: {message}")]
    InvalidBoundaries {
        /// Description of what went wrong.
        message: String,
    },
}

/// Everything the map needs after a successful load.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Valid incident rows in source order.
    pub rows: Vec<IncidentRow>,
    /// Region boundary features.
    pub boundaries: FeatureCollection,
    /// Sorted distinct years present in `rows`.
    pub years: BTreeSet<i32>,
}

/// Fetches and parses both datasets concurrently.
///
/// # Errors
///
/// Returns [`LoaderError`] if either resource cannot be downloaded (after
/// retries) or parsed.
pub async fn load(sources: &SourcesConfig) -> Result<LoadedData, LoaderError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(sources.timeout_secs))
        .build()?;

    log::info!(
        "Loading incidents from {} and boundaries from {}",
        sources.incidents_url,
        sources.boundaries_url
    );

    let (rows, boundaries) = tokio::try_join!(
        fetch_incidents(&client, &sources.incidents_url, sources.max_retries),
        fetch_boundaries(&client, &sources.boundaries_url, sources.max_retries),
    )?;

    let years = incidents::year_universe(&rows);
    log::info!(
        "Loaded {} incidents spanning {} years and {} boundary features",
        rows.len(),
        years.len(),
        boundaries.features.len()
    );

    Ok(LoadedData {
        rows,
        boundaries,
        years,
    })
}

async fn fetch_incidents(
    client: &reqwest::Client,
    url: &str,
    max_retries: u32,
) -> Result<Vec<IncidentRow>, LoaderError> {
    let text = retry::send_text(|| client.get(url), max_retries).await?;
    log::debug!("Downloaded {} bytes of incident CSV", text.len());
    incidents::parse_incidents_csv(&text)
}

async fn fetch_boundaries(
    client: &reqwest::Client,
    url: &str,
    max_retries: u32,
) -> Result<FeatureCollection, LoaderError> {
    let text = retry::send_text(|| client.get(url), max_retries).await?;
    log::debug!("Downloaded {} bytes of boundary GeoJSON", text.len());
    boundaries::parse_boundaries(&text)
}
