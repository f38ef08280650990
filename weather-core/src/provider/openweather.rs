use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::{
    config::ApiConfig,
    error::WeatherError,
    model::{Condition, CurrentConditions, ForecastSample, ForecastSeries, LocationQuery},
    units::UnitSystem,
};

use super::WeatherProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Current,
    Forecast,
}

impl Resource {
    fn path(self) -> &'static str {
        match self {
            Resource::Current => "weather",
            Resource::Forecast => "forecast",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Resource::Current => "current",
            Resource::Forecast => "forecast",
        }
    }
}

/// Stateless OpenWeatherMap client; settings are fixed at construction.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    config: ApiConfig,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(config: ApiConfig) -> Self {
        if config.usable_api_key().is_none() {
            warn!("OpenWeatherMap API key not configured; every request will fail");
        }
        Self {
            config,
            http: Client::new(),
        }
    }

    pub async fn fetch_current_by_name(
        &self,
        name: &str,
        units: UnitSystem,
    ) -> Result<CurrentConditions, WeatherError> {
        self.fetch_current(&LocationQuery::by_name(name), units).await
    }

    pub async fn fetch_current_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        units: UnitSystem,
    ) -> Result<CurrentConditions, WeatherError> {
        self.fetch_current(&LocationQuery::by_coordinates(latitude, longitude), units)
            .await
    }

    pub async fn fetch_forecast_by_name(
        &self,
        name: &str,
        units: UnitSystem,
    ) -> Result<ForecastSeries, WeatherError> {
        self.fetch_forecast(&LocationQuery::by_name(name), units).await
    }

    pub async fn fetch_forecast_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        units: UnitSystem,
    ) -> Result<ForecastSeries, WeatherError> {
        self.fetch_forecast(&LocationQuery::by_coordinates(latitude, longitude), units)
            .await
    }

    async fn fetch_current(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<CurrentConditions, WeatherError> {
        let parsed: OwCurrentResponse = self.get_json(Resource::Current, query, units).await?;
        parsed.into_conditions()
    }

    async fn fetch_forecast(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<ForecastSeries, WeatherError> {
        let parsed: OwForecastResponse = self.get_json(Resource::Forecast, query, units).await?;
        parsed.into_series()
    }

    #[instrument(skip_all, fields(resource = resource.label(), query = %query, units = %units))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: Resource,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<T, WeatherError> {
        let api_key = self
            .config
            .usable_api_key()
            .ok_or(WeatherError::Configuration)?;

        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            resource.path()
        );

        let mut params = query.query_pairs();
        params.push(("appid", api_key.to_string()));
        params.push(("units", units.as_str().to_string()));

        let res = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                WeatherError::Transport(format!(
                    "Failed to send request to OpenWeather ({}): {e}",
                    resource.label()
                ))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::Transport(format!(
                "Failed to read OpenWeather {} response body: {e}",
                resource.label()
            ))
        })?;

        debug!(%status, bytes = body.len(), "OpenWeather responded");

        if status == StatusCode::UNAUTHORIZED {
            return Err(WeatherError::Auth);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(WeatherError::NotFound(query.to_string()));
        }
        if !status.is_success() {
            return Err(WeatherError::Transport(format!(
                "OpenWeather {} request failed with status {}: {}",
                resource.label(),
                status,
                truncate_body(&body),
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            WeatherError::Transport(format!(
                "Failed to parse OpenWeather {} JSON: {e}",
                resource.label()
            ))
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<CurrentConditions, WeatherError> {
        self.fetch_current(query, units).await
    }

    async fn forecast(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<ForecastSeries, WeatherError> {
        self.fetch_forecast(query, units).await
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    sys: OwSys,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    visibility: Option<u32>,
}

impl OwCurrentResponse {
    fn into_conditions(self) -> Result<CurrentConditions, WeatherError> {
        let weather = self.weather.into_iter().next().ok_or_else(|| {
            WeatherError::Transport(
                "OpenWeather current response contained no weather condition".to_string(),
            )
        })?;

        Ok(CurrentConditions {
            place_name: self.name,
            country: self.sys.country.unwrap_or_default(),
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind_speed: self.wind.speed,
            visibility_m: self.visibility,
            condition: Condition {
                main: weather.main,
                description: weather.description,
                icon: weather.icon,
            },
            sunrise: unix_to_utc(self.sys.sunrise)?,
            sunset: unix_to_utc(self.sys.sunset)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

impl OwForecastResponse {
    fn into_series(self) -> Result<ForecastSeries, WeatherError> {
        let samples = self
            .list
            .into_iter()
            .map(|entry| {
                let weather = entry.weather.into_iter().next().ok_or_else(|| {
                    WeatherError::Transport(format!(
                        "OpenWeather forecast entry {} contained no weather condition",
                        entry.dt
                    ))
                })?;

                Ok(ForecastSample {
                    timestamp: unix_to_utc(entry.dt)?,
                    temperature: entry.main.temp,
                    temp_min: entry.main.temp_min,
                    temp_max: entry.main.temp_max,
                    humidity_pct: entry.main.humidity,
                    description: weather.description,
                    icon: weather.icon,
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        Ok(ForecastSeries::new(samples))
    }
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, WeatherError> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| WeatherError::Transport(format!("Timestamp out of range: {ts}")))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
