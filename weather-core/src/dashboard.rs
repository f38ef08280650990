//! Session orchestration: one owner of the dashboard state, driving fetch
//! episodes (current conditions + forecast, fetched concurrently) and the
//! preference side effects around them.
//!
//! State is published through a [`tokio::sync::watch`] channel; observers only
//! ever see whole snapshots, so conditions and forecast become visible together.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{LocationError, WeatherError},
    geolocation::{Coordinates, Geolocator},
    model::{CurrentConditions, ForecastSample, ForecastSeries, LocationQuery},
    prefs::{PreferenceStore, Preferences},
    provider::WeatherProvider,
    series::{self, IntradayPoint},
    units::UnitSystem,
};

/// How long a position lookup may take before it counts as a timeout.
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Read-only snapshot handed to presentation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub current: Option<CurrentConditions>,
    pub forecast: Option<ForecastSeries>,
    pub is_loading: bool,
    pub active_units: UnitSystem,
    /// Last successfully loaded place name.
    pub last_query: Option<String>,
}

impl SessionState {
    pub fn daily_summaries(&self) -> Vec<ForecastSample> {
        self.forecast
            .as_ref()
            .map(|f| series::to_daily_summaries(f.as_slice()))
            .unwrap_or_default()
    }

    pub fn intraday_series(&self) -> Vec<IntradayPoint> {
        self.forecast
            .as_ref()
            .map(|f| series::to_intraday_series(f.as_slice()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Toast-style message describing the outcome of a user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    fn loaded(current: &CurrentConditions) -> Self {
        Self::info(
            "Weather loaded successfully",
            format!("Showing weather for {}", current.display_name()),
        )
    }

    fn fetch_failed(err: &WeatherError, query: &LocationQuery) -> Self {
        let description = if let (WeatherError::NotFound(_), LocationQuery::ByCoordinates { .. }) =
            (err, query)
        {
            "Unable to fetch weather for your location.".to_string()
        } else {
            err.user_message()
        };
        Self::error("Error loading weather", description)
    }

    fn location_failed(err: &LocationError) -> Self {
        let title = match err {
            LocationError::PermissionDenied => "Location permission denied",
            LocationError::ServiceUnavailable => "Geolocation not supported",
            LocationError::Timeout => "Location request timed out",
            LocationError::Other(_) => "Location unavailable",
        };
        Self::error(title, err.user_message())
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// The dashboard controller.
///
/// Every public operation returns `None` only when its episode was superseded
/// by a newer one (or, for unit changes, when nothing needed fetching).
#[derive(Debug)]
pub struct Dashboard {
    provider: Arc<dyn WeatherProvider>,
    prefs: Arc<dyn PreferenceStore>,
    geolocator: Arc<dyn Geolocator>,
    state: watch::Sender<SessionState>,
    sequence: AtomicU64,
    in_flight: Mutex<Option<LocationQuery>>,
    geolocation_timeout: Duration,
}

impl Dashboard {
    /// Builds the controller, reading stored preferences once.
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        prefs: Arc<dyn PreferenceStore>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Self {
        let Preferences { last_city, units } = prefs.load();
        debug!(?last_city, %units, "Loaded preferences");

        let (state, _) = watch::channel(SessionState {
            active_units: units,
            last_query: last_city,
            ..SessionState::default()
        });

        Self {
            provider,
            prefs,
            geolocator,
            state,
            sequence: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            geolocation_timeout: GEOLOCATION_TIMEOUT,
        }
    }

    pub fn with_geolocation_timeout(mut self, timeout: Duration) -> Self {
        self.geolocation_timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn units(&self) -> UnitSystem {
        self.state.borrow().active_units
    }

    /// Startup replay of the stored last city. Does nothing once any episode
    /// has run or when no city is stored.
    pub async fn resume(&self) -> Option<Notification> {
        let city = {
            let state = self.state.borrow();
            if state.phase != Phase::Idle {
                return None;
            }
            state.last_query.clone()?
        };
        info!(%city, "Replaying last city");
        self.run_episode(LocationQuery::ByName(city)).await
    }

    /// Search by place name.
    pub async fn search(&self, city: &str) -> Option<Notification> {
        let city = city.trim();
        if city.is_empty() {
            return Some(Notification::error(
                "Enter a city name",
                "Type a city to search for.",
            ));
        }
        self.run_episode(LocationQuery::by_name(city)).await
    }

    /// Search by coordinate pair; out-of-range values never reach the provider.
    pub async fn search_coordinates(&self, latitude: f64, longitude: f64) -> Option<Notification> {
        if let Err(err) = Coordinates::new(latitude, longitude) {
            return Some(Notification::location_failed(&err));
        }
        self.run_episode(LocationQuery::by_coordinates(latitude, longitude))
            .await
    }

    /// Resolve the current position first; location failures never start a
    /// fetch episode.
    #[instrument(skip(self))]
    pub async fn search_here(&self) -> Option<Notification> {
        let lookup =
            tokio::time::timeout(self.geolocation_timeout, self.geolocator.current_position())
                .await;

        let position = match lookup {
            Ok(Ok(position)) => position,
            Ok(Err(err)) => {
                warn!(error = %err, "Geolocation failed");
                return Some(Notification::location_failed(&err));
            }
            Err(_) => {
                warn!(timeout = ?self.geolocation_timeout, "Geolocation timed out");
                return Some(Notification::location_failed(&LocationError::Timeout));
            }
        };

        self.search_coordinates(position.latitude, position.longitude)
            .await
    }

    /// Switch unit system. The preference is saved immediately; the in-flight
    /// or last successful query is then re-issued under the new units.
    #[instrument(skip(self))]
    pub async fn set_units(&self, units: UnitSystem) -> Option<Notification> {
        let changed = self.state.send_if_modified(|state| {
            if state.active_units == units {
                false
            } else {
                state.active_units = units;
                true
            }
        });
        if !changed {
            return None;
        }
        self.persist();

        let pending = self.lock_in_flight().clone();
        let query = pending.or_else(|| {
            self.state
                .borrow()
                .last_query
                .clone()
                .map(LocationQuery::ByName)
        })?;

        debug!(%query, "Refetching under new units");
        self.run_episode(query).await
    }

    pub async fn toggle_units(&self) -> Option<Notification> {
        self.set_units(self.units().toggled()).await
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn run_episode(&self, query: LocationQuery) -> Option<Notification> {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        *self.lock_in_flight() = Some(query.clone());

        let units = self.state.borrow().active_units;
        let guard = EpisodeGuard::begin(self, ticket);

        let outcome = self.fetch_both(&query, units).await;
        guard.settle();

        if !self.is_current(ticket) {
            debug!(ticket, "Discarding superseded result");
            return None;
        }
        *self.lock_in_flight() = None;

        match outcome {
            Ok((current, forecast)) => {
                let resolved = match &query {
                    LocationQuery::ByName(name) => name.clone(),
                    LocationQuery::ByCoordinates { .. } => current.place_name.clone(),
                };
                let notification = Notification::loaded(&current);
                info!(place = %current.display_name(), samples = forecast.len(), "Weather loaded");

                self.state.send_modify(|state| {
                    state.phase = Phase::Loaded;
                    state.is_loading = false;
                    state.current = Some(current);
                    state.forecast = Some(forecast);
                    state.last_query = Some(resolved);
                });
                self.persist();

                Some(notification)
            }
            Err(err) => {
                warn!(error = %err, "Weather fetch failed");
                self.state.send_modify(|state| {
                    state.phase = Phase::Failed;
                    state.is_loading = false;
                    state.current = None;
                    state.forecast = None;
                });
                Some(Notification::fetch_failed(&err, &query))
            }
        }
    }

    /// Both requests run concurrently and are always awaited to completion.
    /// When both fail, the one that failed first wins.
    async fn fetch_both(
        &self,
        query: &LocationQuery,
        units: UnitSystem,
    ) -> Result<(CurrentConditions, ForecastSeries), WeatherError> {
        let settled = AtomicUsize::new(0);

        let current = async {
            let result = self.provider.current(query, units).await;
            (result, settled.fetch_add(1, Ordering::SeqCst))
        };
        let forecast = async {
            let result = self.provider.forecast(query, units).await;
            (result, settled.fetch_add(1, Ordering::SeqCst))
        };

        let ((current, current_rank), (forecast, forecast_rank)) =
            tokio::join!(current, forecast);

        match (current, forecast) {
            (Ok(current), Ok(forecast)) => Ok((current, forecast)),
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
            (Err(current_err), Err(forecast_err)) => {
                if current_rank < forecast_rank {
                    Err(current_err)
                } else {
                    Err(forecast_err)
                }
            }
        }
    }

    fn persist(&self) {
        let prefs = {
            let state = self.state.borrow();
            Preferences {
                last_city: state.last_query.clone(),
                units: state.active_units,
            }
        };
        self.prefs.save(&prefs);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.sequence.load(Ordering::SeqCst) == ticket
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<LocationQuery>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Marks the session as loading for the lifetime of one episode. If the
/// episode future is dropped before settling while it is still the latest
/// one, the loading state and pending query are rolled back.
struct EpisodeGuard<'a> {
    dashboard: &'a Dashboard,
    ticket: u64,
    rollback: Phase,
    armed: bool,
}

impl<'a> EpisodeGuard<'a> {
    fn begin(dashboard: &'a Dashboard, ticket: u64) -> Self {
        let mut rollback = Phase::Idle;
        dashboard.state.send_modify(|state| {
            rollback = match state.phase {
                _ if state.current.is_some() => Phase::Loaded,
                Phase::Failed => Phase::Failed,
                _ => Phase::Idle,
            };
            state.phase = Phase::Loading;
            state.is_loading = true;
        });
        Self {
            dashboard,
            ticket,
            rollback,
            armed: true,
        }
    }

    fn settle(mut self) {
        self.armed = false;
    }
}

impl Drop for EpisodeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.dashboard.is_current(self.ticket) {
            return;
        }
        debug!(ticket = self.ticket, "Episode abandoned before settling");
        *self.dashboard.lock_in_flight() = None;
        let rollback = self.rollback;
        self.dashboard.state.send_modify(|state| {
            state.phase = rollback;
            state.is_loading = false;
        });
    }
}
