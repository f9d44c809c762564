//! Reverse geocoding against a Nominatim-compatible server.
//!
//! Results are memoized in a bounded LRU keyed by coordinates rounded to
//! 4 decimal places (roughly 11 m), so repeated lookups near the same spot
//! hit the cache instead of the network.

use std::sync::Mutex;

use serde::Deserialize;
use tracing::debug;

use crate::core::http;
use crate::error::Result;

mod lru;

pub use lru::LruCache;

/// Default Nominatim endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Default cache capacity. Coordinate rounding already bounds key
/// cardinality for a single vehicle's territory.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Clone, Deserialize)]
struct NominatimAddress {
    country: Option<String>,
    country_code: Option<String>,
}

/// Resolved location for a coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Geocoded {
    pub address: Option<String>,
    /// Uppercase ISO 3166-1 alpha-2 code.
    pub country_code: Option<String>,
    pub country_name: Option<String>,
}

/// Cache key: coordinates rounded to 4 decimal places, stored as fixed-point
/// integers so the key is hashable and exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    lat_e4: i64,
    lon_e4: i64,
}

impl CoordKey {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_e4: (lat * 10_000.0).round() as i64,
            lon_e4: (lon * 10_000.0).round() as i64,
        }
    }
}

/// Reverse-geocoding client with a bounded in-memory cache.
#[derive(Debug)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<LruCache<CoordKey, Geocoded>>,
}

impl Geocoder {
    pub fn new(base_url: &str, cache_capacity: usize) -> Result<Self> {
        Ok(Self {
            client: http::build_client(http::GEOCODE_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(LruCache::new(cache_capacity)),
        })
    }

    /// Resolve a coordinate to an address and country, using the cache.
    ///
    /// # Errors
    ///
    /// Returns error on network or parse failure. Callers treat geocode
    /// failures as soft: a missing country never fails the caller's item.
    pub async fn reverse_geocode_with_country(&self, lat: f64, lon: f64) -> Result<Geocoded> {
        let key = CoordKey::new(lat, lon);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get_cloned(&key) {
                return Ok(hit);
            }
        }

        let url = format!(
            "{}/reverse?lat={lat}&lon={lon}&format=json&addressdetails=1",
            self.base_url
        );
        debug!(lat, lon, "reverse geocode");
        let resp: NominatimResponse = http::fetch_json(self.client.get(&url)).await?;

        let geocoded = Geocoded {
            address: resp.display_name,
            country_code: resp
                .address
                .as_ref()
                .and_then(|a| a.country_code.as_deref())
                .map(str::to_uppercase),
            country_name: resp.address.and_then(|a| a.country),
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, geocoded.clone());
        }
        Ok(geocoded)
    }

    /// Resolve a coordinate to a display address, using the cache.
    ///
    /// # Errors
    ///
    /// Returns error on network or parse failure.
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        Ok(self.reverse_geocode_with_country(lat, lon).await?.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_key_rounds_to_four_decimals() {
        // ~11 m apart collapses to the same key
        assert_eq!(
            CoordKey::new(52.52004, 13.40501),
            CoordKey::new(52.520_043, 13.405_012)
        );
        // ~30 m apart does not
        assert_ne!(
            CoordKey::new(52.5200, 13.4050),
            CoordKey::new(52.5203, 13.4050)
        );
    }

    #[test]
    fn coord_key_handles_negative_coordinates() {
        assert_eq!(
            CoordKey::new(-33.86882, 151.20930),
            CoordKey::new(-33.868_818, 151.209_301)
        );
    }
}
