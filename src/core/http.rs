//! HTTP client utilities.
//!
//! Provides a shared HTTP client for the telemetry and geocoding fetchers.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{Result, TmsError};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for reverse-geocoding requests.
pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("tmstats/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TmsError::Network(e.to_string()))
}

/// Send a prepared GET request and decode the JSON body.
///
/// # Errors
///
/// Returns error on network failure, non-2xx status, or JSON parse failure.
pub async fn fetch_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            TmsError::Timeout(DEFAULT_TIMEOUT.as_secs())
        } else {
            TmsError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let url = response.url().clone();
        return Err(TmsError::Network(format!("HTTP {status} from {url}")));
    }

    response
        .json()
        .await
        .map_err(|e| TmsError::ParseResponse(e.to_string()))
}
