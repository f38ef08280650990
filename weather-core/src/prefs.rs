//! Durable user preferences: the last searched city and the unit system.
//!
//! Loading never fails and saving is best-effort; neither is user-visible.

use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{debug, warn};

use crate::{config::project_dirs, units::UnitSystem};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    pub last_city: Option<String>,
    pub units: UnitSystem,
}

/// On-disk shape. Units stay a raw string so an unknown value degrades to
/// Metric instead of discarding the whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredPreferences {
    last_city: Option<String>,
    units: Option<String>,
}

impl From<StoredPreferences> for Preferences {
    fn from(stored: StoredPreferences) -> Self {
        Self {
            last_city: stored
                .last_city
                .map(|city| city.trim().to_string())
                .filter(|city| !city.is_empty()),
            units: UnitSystem::from_stored(stored.units.as_deref()),
        }
    }
}

impl From<&Preferences> for StoredPreferences {
    fn from(prefs: &Preferences) -> Self {
        Self {
            last_city: prefs.last_city.clone(),
            units: Some(prefs.units.as_str().to_string()),
        }
    }
}

pub trait PreferenceStore: Send + Sync + Debug {
    fn load(&self) -> Preferences;
    fn save(&self, prefs: &Preferences);
}

/// TOML file in the platform data directory (or an explicit path).
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default platform location.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(project_dirs()?.data_dir().join("preferences.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, prefs: &Preferences) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(&StoredPreferences::from(prefs))?;
        fs::write(&self.path, toml)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Preferences {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No stored preferences");
                return Preferences::default();
            }
        };

        match toml::from_str::<StoredPreferences>(&contents) {
            Ok(stored) => stored.into(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable preferences");
                Preferences::default()
            }
        }
    }

    fn save(&self, prefs: &Preferences) {
        if let Err(e) = self.write(prefs) {
            warn!(path = %self.path.display(), error = %e, "Failed to save preferences");
        }
    }
}

/// Process-local store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Option<StoredPreferences>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(prefs: Preferences) -> Self {
        Self {
            inner: Mutex::new(Some(StoredPreferences::from(&prefs))),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Preferences {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone().map(Preferences::from).unwrap_or_default()
    }

    fn save(&self, prefs: &Preferences) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(StoredPreferences::from(prefs));
    }
}
