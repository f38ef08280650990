use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode};
use weather_core::{
    Config, Coordinates, Dashboard, FilePreferenceStore, Geolocator, IpGeolocator, Notification, Phase,
    UnitSystem, Unsupported, config::API_KEY_ENV, provider_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather dashboard for your terminal")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store your OpenWeatherMap API key.
    Configure,

    /// Show current conditions and forecast.
    ///
    /// Without a city, the last searched city is shown again.
    Show {
        /// City name, e.g. "Tokyo" or "Paris,FR".
        #[arg(conflicts_with_all = ["here", "lat", "lon"])]
        city: Option<String>,

        /// Use your approximate location (from your IP address).
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        here: bool,

        /// Latitude, used together with --lon.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude, used together with --lat.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Change the unit system and refresh the last city.
    Units {
        #[arg(value_enum)]
        choice: UnitsChoice,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitsChoice {
    Metric,
    Imperial,
    Toggle,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show {
                city,
                here,
                lat,
                lon,
            } => {
                let geolocator: Arc<dyn Geolocator> = if here {
                    Arc::new(IpGeolocator::new())
                } else {
                    Arc::new(Unsupported)
                };
                let position = lat.zip(lon).map(|(lat, lon)| coordinates(lat, lon)).transpose()?;
                let (dashboard, configured) = build_dashboard(geolocator)?;

                let note = match (city, position) {
                    (Some(city), _) => dashboard.search(&city).await,
                    (None, Some(at)) => dashboard.search_coordinates(at.latitude, at.longitude).await,
                    (None, None) if here => dashboard.search_here().await,
                    (None, None) => dashboard.resume().await,
                };

                match note {
                    Some(note) => finish(&dashboard, &note, configured),
                    None => Err(anyhow!(
                        "No city given and no previous search stored.\n\
                         Hint: run `weather show <CITY>` or `weather show --here`."
                    )),
                }
            }
            Command::Units { choice } => {
                let (dashboard, configured) = build_dashboard(Arc::new(Unsupported))?;

                let note = match choice {
                    UnitsChoice::Metric => dashboard.set_units(UnitSystem::Metric).await,
                    UnitsChoice::Imperial => dashboard.set_units(UnitSystem::Imperial).await,
                    UnitsChoice::Toggle => dashboard.toggle_units().await,
                };

                println!("Units: {}", dashboard.units());
                match note {
                    Some(note) => finish(&dashboard, &note, configured),
                    None => Ok(()),
                }
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Get a free key at https://openweathermap.org/api")
        .prompt()
        .context("Failed to read API key")?;

    config.set_api_key(api_key);
    if !config.is_configured() {
        return Err(anyhow!("That does not look like a usable API key."));
    }
    config.save()?;

    println!(
        "Saved API key to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

fn coordinates(latitude: f64, longitude: f64) -> anyhow::Result<Coordinates> {
    Coordinates::new(latitude, longitude).map_err(|err| {
        anyhow!("{err}\nHint: latitude must be within -90..90 and longitude within -180..180.")
    })
}

/// Wires the dashboard to the on-disk config and preferences.
fn build_dashboard(geolocator: Arc<dyn Geolocator>) -> anyhow::Result<(Dashboard, bool)> {
    let config = Config::load()?;
    let api = config.api_config_from_env();
    let configured = api.usable_api_key().is_some();

    let prefs = FilePreferenceStore::open_default()?;
    tracing::debug!(path = %prefs.path().display(), "Using preference store");

    let dashboard = Dashboard::new(provider_from_config(api), Arc::new(prefs), geolocator);
    Ok((dashboard, configured))
}

fn finish(dashboard: &Dashboard, note: &Notification, configured: bool) -> anyhow::Result<()> {
    if note.is_error() {
        let mut msg = format!("{}: {}", note.title, note.description);
        if !configured {
            msg.push_str(&format!(
                "\nHint: run `weather configure` or set {API_KEY_ENV}."
            ));
        }
        return Err(anyhow!(msg));
    }

    let state = dashboard.snapshot();
    if state.phase == Phase::Loaded {
        println!("{}", render::render_state(&state));
    }
    eprintln!("{}: {}", note.title, note.description);
    Ok(())
}
