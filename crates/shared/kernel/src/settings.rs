use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Every section an application reads at startup.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettingsInner {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub routing: RoutingSettings,
    pub store: StoreSettings,
    pub import: ImportSettings,
}

/// Arc-wrapped settings, cheap to clone into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(flatten, default)]
    inner: Arc<SettingsInner>,
}

impl Deref for Settings {
    type Target = SettingsInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Settings {
    fn deref_mut(&mut self) -> &mut SettingsInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Target connection of a load run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub alias: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub name: String,
    /// `trace`, `debug`, `info`, `warn`, `error` or `off`.
    pub level: String,
    pub env_filter: Option<String>,
    /// Log files are written here when set.
    pub directory: Option<PathBuf>,
    pub json: bool,
}

/// App label to connection alias. Unrouted apps may be written through any alias.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub apps: BTreeMap<String, String>,
}

/// Models the in-memory store accepts.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub models: Vec<ModelSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// `app_label.model_name`
    pub name: String,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub fixtures: Vec<FixtureSource>,
}

/// One fixture file. The format falls back to the file extension.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSource {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<String>,
}

// --- Default ---

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { alias: "default".to_owned() }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            name: "smuggler".to_owned(),
            level: "info".to_owned(),
            env_filter: None,
            directory: None,
            json: false,
        }
    }
}
