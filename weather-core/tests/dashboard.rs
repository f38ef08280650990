//! Behavioural tests for the dashboard controller against a scripted provider.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use weather_core::{
    Condition, Coordinates, CurrentConditions, Dashboard, FixedLocation, ForecastSample,
    ForecastSeries, Geolocator, LocationError, LocationQuery, MemoryPreferenceStore, Phase,
    PreferenceStore, Preferences, UnitSystem, Unsupported, WeatherError, WeatherProvider,
};

enum Reply<T> {
    Now(Result<T, WeatherError>),
    Gated(oneshot::Receiver<Result<T, WeatherError>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, WeatherError> {
        match self {
            Reply::Now(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WeatherError::Transport("gate dropped".into()))),
        }
    }
}

#[derive(Default)]
struct ScriptedProvider {
    calls: Mutex<Vec<(&'static str, LocationQuery, UnitSystem)>>,
    current: Mutex<VecDeque<Reply<CurrentConditions>>>,
    forecast: Mutex<VecDeque<Reply<ForecastSeries>>>,
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider").finish_non_exhaustive()
    }
}

impl ScriptedProvider {
    fn push_current(&self, reply: Reply<CurrentConditions>) {
        self.current.lock().unwrap().push_back(reply);
    }

    fn push_forecast(&self, reply: Reply<ForecastSeries>) {
        self.forecast.lock().unwrap().push_back(reply);
    }

    fn push_success(&self, city: &str) {
        self.push_current(Reply::Now(Ok(conditions(city))));
        self.push_forecast(Reply::Now(Ok(forecast(16))));
    }

    fn calls(&self) -> Vec<(&'static str, LocationQuery, UnitSystem)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn current(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<CurrentConditions, WeatherError> {
        self.calls
            .lock()
            .unwrap()
            .push(("current", query.clone(), units));
        let reply = self.current.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(WeatherError::Transport("unscripted current call".into())),
        }
    }

    async fn forecast(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<ForecastSeries, WeatherError> {
        self.calls
            .lock()
            .unwrap()
            .push(("forecast", query.clone(), units));
        let reply = self.forecast.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(WeatherError::Transport("unscripted forecast call".into())),
        }
    }
}

#[derive(Debug)]
struct DeniedLocation;

#[async_trait]
impl Geolocator for DeniedLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

#[derive(Debug)]
struct NeverLocates;

#[async_trait]
impl Geolocator for NeverLocates {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        std::future::pending().await
    }
}

fn conditions(city: &str) -> CurrentConditions {
    CurrentConditions {
        place_name: city.to_string(),
        country: "JP".to_string(),
        temperature: 18.0,
        feels_like: 17.0,
        temp_min: 15.0,
        temp_max: 20.0,
        humidity_pct: 60,
        pressure_hpa: 1013.0,
        wind_speed: 3.5,
        visibility_m: Some(10_000),
        condition: Condition {
            main: "Clear".into(),
            description: "clear sky".into(),
            icon: "01d".into(),
        },
        sunrise: DateTime::<Utc>::from_timestamp(1_735_682_000, 0).unwrap(),
        sunset: DateTime::<Utc>::from_timestamp(1_735_718_000, 0).unwrap(),
    }
}

fn forecast(len: usize) -> ForecastSeries {
    ForecastSeries::new(
        (0..len)
            .map(|i| ForecastSample {
                timestamp: DateTime::<Utc>::from_timestamp(1_735_700_400 + i as i64 * 10_800, 0)
                    .unwrap(),
                temperature: 10.0 + i as f64,
                temp_min: 9.0,
                temp_max: 12.0,
                humidity_pct: 70,
                description: "light rain".into(),
                icon: "10d".into(),
            })
            .collect(),
    )
}

fn dashboard_with(
    provider: &Arc<ScriptedProvider>,
    prefs: &Arc<MemoryPreferenceStore>,
    geolocator: Arc<dyn Geolocator>,
) -> Dashboard {
    Dashboard::new(provider.clone(), prefs.clone(), geolocator)
}

fn dashboard(provider: &Arc<ScriptedProvider>, prefs: &Arc<MemoryPreferenceStore>) -> Dashboard {
    dashboard_with(provider, prefs, Arc::new(Unsupported))
}

#[tokio::test]
async fn successful_search_commits_and_persists() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_success("Tokyo");

    let dash = dashboard(&provider, &prefs);
    assert_eq!(dash.snapshot().phase, Phase::Idle);

    let note = dash.search("  Tokyo ").await.unwrap();
    assert!(!note.is_error());
    assert_eq!(note.description, "Showing weather for Tokyo, JP");

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Loaded);
    assert!(!state.is_loading);
    assert_eq!(state.current.unwrap().place_name, "Tokyo");
    assert_eq!(state.forecast.as_ref().unwrap().len(), 16);
    assert_eq!(state.last_query.as_deref(), Some("Tokyo"));

    assert_eq!(
        prefs.load(),
        Preferences {
            last_city: Some("Tokyo".into()),
            units: UnitSystem::Metric
        }
    );

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert!(
        calls
            .iter()
            .all(|(_, q, u)| *q == LocationQuery::by_name("Tokyo") && *u == UnitSystem::Metric)
    );
}

#[tokio::test]
async fn derived_views_come_from_the_forecast() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_success("Tokyo");

    let dash = dashboard(&provider, &prefs);
    assert!(dash.snapshot().daily_summaries().is_empty());

    dash.search("Tokyo").await;
    let state = dash.snapshot();
    assert_eq!(state.daily_summaries().len(), 2);
    assert_eq!(state.intraday_series().len(), 8);
    assert_eq!(state.intraday_series()[3].temperature, 13);
}

#[tokio::test]
async fn conditions_stay_hidden_until_forecast_settles() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let (current_tx, current_rx) = oneshot::channel();
    let (forecast_tx, forecast_rx) = oneshot::channel();
    provider.push_current(Reply::Gated(current_rx));
    provider.push_forecast(Reply::Gated(forecast_rx));

    let dash = Arc::new(dashboard(&provider, &prefs));
    let mut rx = dash.subscribe();

    let task = tokio::spawn({
        let dash = dash.clone();
        async move { dash.search("Tokyo").await }
    });

    rx.wait_for(|s| s.phase == Phase::Loading).await.unwrap();

    current_tx.send(Ok(conditions("Tokyo"))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mid = dash.snapshot();
    assert_eq!(mid.phase, Phase::Loading);
    assert!(mid.is_loading);
    assert!(mid.current.is_none());
    assert!(mid.forecast.is_none());

    forecast_tx.send(Ok(forecast(8))).unwrap();
    let note = task.await.unwrap().unwrap();
    assert!(!note.is_error());

    let done = dash.snapshot();
    assert_eq!(done.phase, Phase::Loaded);
    assert!(!done.is_loading);
    assert!(done.current.is_some());
    assert!(done.forecast.is_some());
}

#[tokio::test]
async fn forecast_failure_discards_current_conditions() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_current(Reply::Now(Ok(conditions("Tokyo"))));
    provider.push_forecast(Reply::Now(Err(WeatherError::Transport("boom".into()))));

    let dash = dashboard(&provider, &prefs);
    let note = dash.search("Tokyo").await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.title, "Error loading weather");

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Failed);
    assert!(!state.is_loading);
    assert!(state.current.is_none());
    assert!(state.forecast.is_none());
    assert!(state.last_query.is_none());
    assert_eq!(prefs.load(), Preferences::default());
}

#[tokio::test]
async fn failure_after_success_clears_previous_data() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_success("Tokyo");
    provider.push_current(Reply::Now(Err(WeatherError::NotFound("Atlantis".into()))));
    provider.push_forecast(Reply::Now(Ok(forecast(8))));

    let dash = dashboard(&provider, &prefs);
    dash.search("Tokyo").await;
    let note = dash.search("Atlantis").await.unwrap();
    assert_eq!(note.description, "Please check the city name and try again.");

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Failed);
    assert!(state.current.is_none());
    assert!(state.forecast.is_none());
    // Only successful searches move the last city.
    assert_eq!(state.last_query.as_deref(), Some("Tokyo"));
    assert_eq!(prefs.load().last_city.as_deref(), Some("Tokyo"));
}

#[tokio::test]
async fn first_observed_failure_is_reported() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let (current_tx, current_rx) = oneshot::channel();
    provider.push_current(Reply::Gated(current_rx));
    provider.push_forecast(Reply::Now(Err(WeatherError::NotFound("Atlantis".into()))));

    let dash = Arc::new(dashboard(&provider, &prefs));
    let mut rx = dash.subscribe();
    let task = tokio::spawn({
        let dash = dash.clone();
        async move { dash.search("Atlantis").await }
    });

    rx.wait_for(|s| s.phase == Phase::Loading).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    current_tx.send(Err(WeatherError::Auth)).unwrap();

    let note = task.await.unwrap().unwrap();
    assert_eq!(note.description, "Please check the city name and try again.");
}

#[tokio::test]
async fn unit_toggle_refetches_last_city() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_success("Tokyo");
    provider.push_success("Tokyo");

    let dash = dashboard(&provider, &prefs);
    dash.search("Tokyo").await;
    assert_eq!(dash.units(), UnitSystem::Metric);

    let note = dash.set_units(UnitSystem::Imperial).await.unwrap();
    assert!(!note.is_error());

    let calls = provider.calls();
    assert_eq!(calls.len(), 4);
    for (_, query, units) in &calls[2..] {
        assert_eq!(*query, LocationQuery::by_name("Tokyo"));
        assert_eq!(*units, UnitSystem::Imperial);
    }

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Loaded);
    assert_eq!(state.active_units, UnitSystem::Imperial);
    assert_eq!(
        prefs.load(),
        Preferences {
            last_city: Some("Tokyo".into()),
            units: UnitSystem::Imperial
        }
    );
}

#[tokio::test]
async fn unit_preference_persists_even_when_refetch_fails() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::with(Preferences {
        last_city: Some("Tokyo".into()),
        units: UnitSystem::Metric,
    }));
    provider.push_current(Reply::Now(Err(WeatherError::Transport("down".into()))));
    provider.push_forecast(Reply::Now(Err(WeatherError::Transport("down".into()))));

    let dash = dashboard(&provider, &prefs);
    let note = dash.toggle_units().await.unwrap();
    assert!(note.is_error());

    assert_eq!(dash.snapshot().phase, Phase::Failed);
    assert_eq!(prefs.load().units, UnitSystem::Imperial);
}

#[tokio::test]
async fn unit_change_without_history_only_saves_preference() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let dash = dashboard(&provider, &prefs);
    assert!(dash.set_units(UnitSystem::Imperial).await.is_none());
    assert!(dash.set_units(UnitSystem::Imperial).await.is_none());

    assert!(provider.calls().is_empty());
    assert_eq!(dash.snapshot().phase, Phase::Idle);
    assert_eq!(prefs.load().units, UnitSystem::Imperial);
}

#[tokio::test]
async fn startup_replays_stored_city_once() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::with(Preferences {
        last_city: Some("Nairobi".into()),
        units: UnitSystem::Imperial,
    }));
    provider.push_success("Nairobi");

    let dash = dashboard(&provider, &prefs);
    assert_eq!(dash.units(), UnitSystem::Imperial);

    dash.resume().await.unwrap();
    assert!(dash.resume().await.is_none());

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, LocationQuery::by_name("Nairobi"));
    assert_eq!(calls[0].2, UnitSystem::Imperial);
}

#[tokio::test]
async fn startup_without_stored_city_stays_idle() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let dash = dashboard(&provider, &prefs);
    assert!(dash.resume().await.is_none());
    assert_eq!(dash.snapshot().phase, Phase::Idle);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn geolocation_search_persists_resolved_name() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_success("Shinjuku");

    let here = Coordinates::new(35.6938, 139.7034).unwrap();
    let dash = dashboard_with(&provider, &prefs, Arc::new(FixedLocation(here)));

    let note = dash.search_here().await.unwrap();
    assert!(!note.is_error());
    assert_eq!(
        provider.calls()[0].1,
        LocationQuery::by_coordinates(35.6938, 139.7034)
    );
    assert_eq!(dash.snapshot().last_query.as_deref(), Some("Shinjuku"));
    assert_eq!(prefs.load().last_city.as_deref(), Some("Shinjuku"));
}

#[tokio::test]
async fn geolocation_denial_never_enters_loading() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let dash = dashboard_with(&provider, &prefs, Arc::new(DeniedLocation));
    let rx = dash.subscribe();

    let note = dash.search_here().await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.title, "Location permission denied");

    assert!(!rx.has_changed().unwrap());
    assert_eq!(dash.snapshot().phase, Phase::Idle);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn geolocation_timeout_is_reported() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let dash = dashboard_with(&provider, &prefs, Arc::new(NeverLocates))
        .with_geolocation_timeout(Duration::from_millis(30));

    let note = dash.search_here().await.unwrap();
    assert_eq!(note.title, "Location request timed out");
    assert_eq!(dash.snapshot().phase, Phase::Idle);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn newer_search_supersedes_in_flight_one() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let (current_tx, current_rx) = oneshot::channel();
    let (forecast_tx, forecast_rx) = oneshot::channel();
    provider.push_current(Reply::Gated(current_rx));
    provider.push_forecast(Reply::Gated(forecast_rx));
    provider.push_success("Lima");

    let dash = Arc::new(dashboard(&provider, &prefs));
    let mut rx = dash.subscribe();
    let stale = tokio::spawn({
        let dash = dash.clone();
        async move { dash.search("Tokyo").await }
    });
    rx.wait_for(|s| s.phase == Phase::Loading).await.unwrap();

    let note = dash.search("Lima").await.unwrap();
    assert_eq!(note.description, "Showing weather for Lima, JP");

    current_tx.send(Ok(conditions("Tokyo"))).unwrap();
    forecast_tx.send(Ok(forecast(8))).unwrap();
    assert!(stale.await.unwrap().is_none());

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Loaded);
    assert_eq!(state.current.unwrap().place_name, "Lima");
    assert_eq!(state.last_query.as_deref(), Some("Lima"));
    assert_eq!(prefs.load().last_city.as_deref(), Some("Lima"));
}

#[tokio::test]
async fn blank_search_is_rejected_without_fetching() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let dash = dashboard(&provider, &prefs);
    let note = dash.search("   ").await.unwrap();
    assert!(note.is_error());
    assert_eq!(dash.snapshot().phase, Phase::Idle);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn unit_change_during_load_refetches_pending_query() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let (current_tx, current_rx) = oneshot::channel();
    let (forecast_tx, forecast_rx) = oneshot::channel();
    provider.push_current(Reply::Gated(current_rx));
    provider.push_forecast(Reply::Gated(forecast_rx));
    provider.push_current(Reply::Now(Ok(CurrentConditions {
        temperature: 64.4,
        ..conditions("Tokyo")
    })));
    provider.push_forecast(Reply::Now(Ok(forecast(16))));

    let dash = Arc::new(dashboard(&provider, &prefs));
    let mut rx = dash.subscribe();
    let stale = tokio::spawn({
        let dash = dash.clone();
        async move { dash.search("Tokyo").await }
    });
    rx.wait_for(|s| s.phase == Phase::Loading).await.unwrap();

    let note = dash.set_units(UnitSystem::Imperial).await.unwrap();
    assert!(!note.is_error());

    current_tx.send(Ok(conditions("Tokyo"))).unwrap();
    forecast_tx.send(Ok(forecast(8))).unwrap();
    assert!(stale.await.unwrap().is_none());

    let calls = provider.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[..2].iter().all(|(_, _, units)| *units == UnitSystem::Metric));
    for (_, query, units) in &calls[2..] {
        assert_eq!(query, &LocationQuery::by_name("Tokyo"));
        assert_eq!(*units, UnitSystem::Imperial);
    }

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Loaded);
    assert!(!state.is_loading);
    assert_eq!(state.active_units, UnitSystem::Imperial);
    assert_eq!(state.current.unwrap().temperature, 64.4);
    assert_eq!(state.forecast.unwrap().len(), 16);
    assert_eq!(prefs.load().units, UnitSystem::Imperial);
}

#[tokio::test]
async fn dropped_search_does_not_leak_into_unit_toggle() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_success("Tokyo");

    let dash = dashboard(&provider, &prefs);
    dash.search("Tokyo").await.unwrap();

    let (_current_tx, current_rx) = oneshot::channel();
    let (_forecast_tx, forecast_rx) = oneshot::channel();
    provider.push_current(Reply::Gated(current_rx));
    provider.push_forecast(Reply::Gated(forecast_rx));

    let abandoned = tokio::time::timeout(Duration::from_millis(20), dash.search("Atlantis")).await;
    assert!(abandoned.is_err());

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Loaded);
    assert!(!state.is_loading);
    assert_eq!(state.current.unwrap().place_name, "Tokyo");

    provider.push_success("Tokyo");
    let note = dash.set_units(UnitSystem::Imperial).await.unwrap();
    assert_eq!(note.description, "Showing weather for Tokyo, JP");

    let calls = provider.calls();
    assert_eq!(calls.len(), 6);
    for (_, query, units) in &calls[4..] {
        assert_eq!(query, &LocationQuery::by_name("Tokyo"));
        assert_eq!(*units, UnitSystem::Imperial);
    }
    assert_eq!(dash.snapshot().last_query.as_deref(), Some("Tokyo"));
}

#[tokio::test]
async fn dropped_first_search_returns_to_idle() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let (_current_tx, current_rx) = oneshot::channel();
    let (_forecast_tx, forecast_rx) = oneshot::channel();
    provider.push_current(Reply::Gated(current_rx));
    provider.push_forecast(Reply::Gated(forecast_rx));

    let dash = dashboard(&provider, &prefs);
    let abandoned = tokio::time::timeout(Duration::from_millis(20), dash.search("Tokyo")).await;
    assert!(abandoned.is_err());

    let state = dash.snapshot();
    assert_eq!(state.phase, Phase::Idle);
    assert!(!state.is_loading);

    assert!(dash.set_units(UnitSystem::Imperial).await.is_none());
    assert_eq!(provider.calls().len(), 2);
}

#[tokio::test]
async fn out_of_range_coordinates_never_fetch() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let dash = dashboard(&provider, &prefs);
    let note = dash.search_coordinates(123.0, 45.0).await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.title, "Location unavailable");
    assert_eq!(dash.snapshot().phase, Phase::Idle);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn coordinate_not_found_uses_location_wording() {
    let provider = Arc::new(ScriptedProvider::default());
    let prefs = Arc::new(MemoryPreferenceStore::new());
    provider.push_current(Reply::Now(Err(WeatherError::NotFound("0, 0".into()))));
    provider.push_forecast(Reply::Now(Ok(forecast(8))));

    let dash = dashboard(&provider, &prefs);
    let note = dash.search_coordinates(0.0, 0.0).await.unwrap();
    assert!(note.is_error());
    assert_eq!(note.description, "Unable to fetch weather for your location.");
    assert_eq!(dash.snapshot().phase, Phase::Failed);
}
