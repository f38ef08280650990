use crate::{
    ApiConfig, CurrentConditions, ForecastSeries, LocationQuery, UnitSystem, WeatherError,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// Source of current conditions and forecasts.
///
/// The dashboard only talks to this trait; `OpenWeatherClient` is the one
/// real implementation.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<CurrentConditions, WeatherError>;

    async fn forecast(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<ForecastSeries, WeatherError>;
}

/// Construct the OpenWeatherMap client from injected settings.
pub fn provider_from_config(config: ApiConfig) -> Arc<dyn WeatherProvider> {
    Arc::new(OpenWeatherClient::new(config))
}
