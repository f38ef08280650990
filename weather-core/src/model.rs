use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked for: a place name or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    ByName(String),
    ByCoordinates { latitude: f64, longitude: f64 },
}

impl LocationQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        LocationQuery::ByName(name.into())
    }

    pub fn by_coordinates(latitude: f64, longitude: f64) -> Self {
        LocationQuery::ByCoordinates { latitude, longitude }
    }

    /// Query parameters identifying the place, without key or units.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            LocationQuery::ByName(name) => vec![("q", name.clone())],
            LocationQuery::ByCoordinates { latitude, longitude } => {
                vec![("lat", latitude.to_string()), ("lon", longitude.to_string())]
            }
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::ByName(name) => f.write_str(name),
            LocationQuery::ByCoordinates { latitude, longitude } => {
                write!(f, "{latitude:.4}, {longitude:.4}")
            }
        }
    }
}

/// Primary weather condition as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Short group name, e.g. "Rain".
    pub main: String,
    pub description: String,
    /// Provider icon identifier, e.g. "10d".
    pub icon: String,
}

/// Snapshot of the weather at one place, in the units it was requested with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub place_name: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: f64,
    pub wind_speed: f64,
    /// Metres; the provider omits it for some stations.
    pub visibility_m: Option<u32>,
    pub condition: Condition,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

impl CurrentConditions {
    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.place_name.clone()
        } else {
            format!("{}, {}", self.place_name, self.country)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity_pct: u8,
    pub description: String,
    pub icon: String,
}

/// Chronological forecast samples, nominally 3 hours apart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub samples: Vec<ForecastSample>,
}

impl ForecastSeries {
    pub fn new(samples: Vec<ForecastSample>) -> Self {
        Self { samples }
    }

    pub fn as_slice(&self) -> &[ForecastSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
