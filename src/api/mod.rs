//! Client for the TeslaMate-compatible telemetry HTTP API.
//!
//! All list endpoints are paginated; callers pass a `since` date (exclusive
//! lower bound on `start_date`) so incremental syncs only transfer new rows.

use reqwest::Client;
use tracing::debug;

use crate::core::http;
use crate::core::models::{
    ChargeData, ChargeDetail, ChargeDetailResponse, ChargesResponse, DriveData, DriveDetail,
    DriveDetailResponse, DrivesResponse,
};
use crate::error::{Result, TmsError};

/// Rows requested per list page.
pub const PAGE_SIZE: usize = 500;

/// HTTP client bound to one telemetry server.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TelemetryClient {
    /// Create a client for the given base URL (for example
    /// `http://teslamate.local:8080`). Trailing slashes are stripped.
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(TmsError::Config("server URL is empty".to_string()));
        }
        Ok(Self {
            client: http::build_client(std::time::Duration::from_secs(timeout_secs))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "telemetry request");
        http::fetch_json(self.request(url)).await
    }

    /// Fetch one page of drive summaries with `start_date > since`.
    pub async fn list_drives(
        &self,
        car_id: i64,
        since: Option<&str>,
        page: usize,
    ) -> Result<Vec<DriveData>> {
        let url = self.list_url("drives", car_id, since, page);
        let resp: DrivesResponse = self.get_json(&url).await?;
        Ok(resp.data.and_then(|d| d.drives).unwrap_or_default())
    }

    /// Fetch one page of charge summaries with `start_date > since`.
    pub async fn list_charges(
        &self,
        car_id: i64,
        since: Option<&str>,
        page: usize,
    ) -> Result<Vec<ChargeData>> {
        let url = self.list_url("charges", car_id, since, page);
        let resp: ChargesResponse = self.get_json(&url).await?;
        Ok(resp.data.and_then(|d| d.charges).unwrap_or_default())
    }

    /// Fetch the full position trace for one drive.
    pub async fn get_drive_detail(&self, car_id: i64, drive_id: i64) -> Result<DriveDetail> {
        let url = format!("{}/api/v1/cars/{car_id}/drives/{drive_id}", self.base_url);
        let resp: DriveDetailResponse = self.get_json(&url).await?;
        resp.data
            .ok_or_else(|| TmsError::ParseResponse(format!("drive {drive_id}: empty data field")))
    }

    /// Fetch the full charging curve for one charge.
    pub async fn get_charge_detail(&self, car_id: i64, charge_id: i64) -> Result<ChargeDetail> {
        let url = format!("{}/api/v1/cars/{car_id}/charges/{charge_id}", self.base_url);
        let resp: ChargeDetailResponse = self.get_json(&url).await?;
        resp.data
            .and_then(|d| d.charge)
            .ok_or_else(|| TmsError::ParseResponse(format!("charge {charge_id}: empty data field")))
    }

    fn list_url(&self, kind: &str, car_id: i64, since: Option<&str>, page: usize) -> String {
        let mut url = format!(
            "{}/api/v1/cars/{car_id}/{kind}?page={page}&show={PAGE_SIZE}",
            self.base_url
        );
        if let Some(since) = since {
            url.push_str("&start_date=");
            url.push_str(&urlencode(since));
        }
        url
    }
}

/// Percent-encode the characters that appear in ISO-8601 timestamps.
fn urlencode(s: &str) -> String {
    s.replace(':', "%3A").replace('+', "%2B").replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_url_includes_since_when_present() {
        let client = TelemetryClient::new("http://host:8080/", None, 30).unwrap();
        let url = client.list_url("drives", 1, Some("2024-01-01T00:00:00"), 2);
        assert_eq!(
            url,
            "http://host:8080/api/v1/cars/1/drives?page=2&show=500&start_date=2024-01-01T00%3A00%3A00"
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TelemetryClient::new("http://host:8080///", None, 30).unwrap();
        let url = client.list_url("charges", 3, None, 1);
        assert!(url.starts_with("http://host:8080/api/v1/cars/3/charges?"));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(TelemetryClient::new("  ", None, 30).is_err());
    }
}
