//! Core library for the `weather` dashboard.
//!
//! This crate defines:
//! - Unit systems and their display labels
//! - The OpenWeatherMap client (current conditions + forecast, by name or coordinates)
//! - Pure reductions of the forecast series into daily and intraday views
//! - The dashboard controller that coordinates fetch episodes and preferences
//! - Configuration, preference storage and the geolocation seam
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod prefs;
pub mod provider;
pub mod series;
pub mod units;

pub use config::{ApiConfig, Config};
pub use dashboard::{Dashboard, Notification, Phase, SessionState, Severity};
pub use error::{LocationError, WeatherError};
pub use geolocation::{Coordinates, FixedLocation, Geolocator, IpGeolocator, Unsupported};
pub use model::{Condition, CurrentConditions, ForecastSample, ForecastSeries, LocationQuery};
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use provider::{OpenWeatherClient, WeatherProvider, provider_from_config};
pub use series::{IntradayPoint, to_daily_summaries, to_intraday_series};
pub use units::UnitSystem;
