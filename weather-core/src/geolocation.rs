//! Resolving "where am I" into a coordinate pair.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;
use tracing::debug;

use crate::error::LocationError;

const IP_API_URL: &str = "http://ip-api.com/json/";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::Other(format!(
                "coordinates out of range: {latitude}, {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Platform capability yielding one position or a denial/timeout.
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Always answers with the same position.
#[derive(Debug, Clone)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl Geolocator for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// For environments without any location source.
#[derive(Debug, Clone, Default)]
pub struct Unsupported;

#[async_trait]
impl Geolocator for Unsupported {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Coarse position from the public IP address via ip-api.com.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    endpoint: String,
    http: Client,
}

impl IpGeolocator {
    pub fn new() -> Self {
        Self::with_endpoint(IP_API_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: Client::new(),
        }
    }
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(&[("fields", "status,message,lat,lon")])
            .send()
            .await
            .map_err(|e| {
                debug!(error = %e, "IP geolocation request failed");
                LocationError::ServiceUnavailable
            })?;

        if !res.status().is_success() {
            debug!(status = %res.status(), "IP geolocation returned an error status");
            return Err(LocationError::ServiceUnavailable);
        }

        let body: IpApiResponse = res
            .json()
            .await
            .map_err(|e| LocationError::Other(format!("unreadable geolocation response: {e}")))?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Coordinates::new(lat, lon),
            _ => Err(LocationError::Other(
                body.message
                    .unwrap_or_else(|| "geolocation lookup failed".to_string()),
            )),
        }
    }
}
