//! Error types surfaced by the weather client and geolocation seam.

use thiserror::Error;

/// Failure of a single weather request. Never carries a partial record.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Credential missing or still the placeholder; raised before any I/O.
    #[error("OpenWeatherMap API key is not configured")]
    Configuration,

    /// HTTP 404: the place name or coordinates matched nothing.
    #[error("Location not found: {0}")]
    NotFound(String),

    /// HTTP 401: the credential was rejected.
    #[error("API key rejected by OpenWeatherMap")]
    Auth,

    /// Network failure, any other non-2xx status or a malformed body.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl WeatherError {
    /// User-facing wording for notifications.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration => {
                "Please configure your OpenWeatherMap API key. Get one free at https://openweathermap.org/api"
                    .to_string()
            }
            Self::NotFound(_) => "Please check the city name and try again.".to_string(),
            Self::Auth => {
                "Invalid API key. Please check your OpenWeatherMap API key configuration."
                    .to_string()
            }
            Self::Transport(_) => {
                "Unable to reach the weather service. Check your connection.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failure to resolve the device's position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

impl LocationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Please allow location access or search by city.".to_string()
            }
            Self::ServiceUnavailable => "Geolocation is not supported here.".to_string(),
            Self::Timeout => "Timed out while locating you. Try searching by city.".to_string(),
            Self::Other(_) => "Unable to determine your location.".to_string(),
        }
    }
}
