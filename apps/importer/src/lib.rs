//! # Smuggler Importer
//!
//! Loads the fixture files listed in the settings into an in-memory store as one
//! all-or-nothing batch.
//!
//! ## Example
//! ```no_run
//! use smuggler_importer::Importer;
//! use smuggler_kernel::load_config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let loaded = Importer::builder()
//!         .settings(load_config(Some("smuggler.toml"))?)
//!         .build()?
//!         .run()?;
//!     println!("{loaded} objects");
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result, bail};
use smuggler_kernel::Settings;
use smuggler_kernel::settings::{FixtureSource, LoggingSettings};
use smuggler_loader::{AppRouter, BulkLoader, MemoryStore, SerializedStream};
use smuggler_logger::{LevelFilter, Logger};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// A fluent builder for configuring and initializing the [`Importer`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ImporterBuilder {
    settings: Settings,
}

impl ImporterBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Connection alias the batch is written through.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.settings.database.alias = alias.into();
        self
    }

    /// Appends a fixture file; `format` falls back to the file extension.
    pub fn fixture(mut self, path: impl Into<PathBuf>, format: Option<&str>) -> Self {
        self.settings
            .import
            .fixtures
            .push(FixtureSource { path: path.into(), format: format.map(str::to_owned) });
        self
    }

    /// Consumes the builder and prepares the import.
    ///
    /// # Errors
    /// Returns an error if:
    /// * A configured model name is not `app_label.model_name`
    /// * A fixture names an unknown format or has an unrecognized extension
    /// * A fixture file does not exist
    pub fn build(self) -> Result<Importer> {
        let Self { settings } = self;

        let store = settings
            .store
            .models
            .iter()
            .fold(MemoryStore::builder(), |builder, model| {
                builder.model(&model.name, model.required.iter().cloned())
            })
            .build()
            .context("Invalid [store] settings")?;

        let router: AppRouter = settings.routing.apps.iter().collect();
        let loader = BulkLoader::builder().policy(router).build();

        let fixtures = settings
            .import
            .fixtures
            .iter()
            .map(|source| resolve(&loader, source))
            .collect::<Result<Vec<_>>>()?;

        info!(
            alias = %settings.database.alias,
            models = settings.store.models.len(),
            fixtures = fixtures.len(),
            "Importer ready"
        );

        Ok(Importer { alias: settings.database.alias.clone(), store, loader, fixtures })
    }
}

/// A resolved fixture file.
#[derive(Debug, Clone)]
struct Fixture {
    path: PathBuf,
    format: String,
}

fn resolve(loader: &BulkLoader<AppRouter>, source: &FixtureSource) -> Result<Fixture> {
    let registry = loader.registry();
    let format = match &source.format {
        Some(format) => registry.get(format).map(|_| format.clone()),
        None => registry.format_for_path(&source.path).map(str::to_owned),
    }
    .with_context(|| format!("Fixture {}", source.path.display()))?;

    if !source.path.is_file() {
        bail!("Fixture not found: {}", source.path.display());
    }

    Ok(Fixture { path: source.path.clone(), format })
}

/// Runs one configured import.
#[derive(Debug)]
pub struct Importer {
    alias: String,
    store: MemoryStore,
    loader: BulkLoader<AppRouter>,
    fixtures: Vec<Fixture>,
}

impl Importer {
    pub fn builder() -> ImporterBuilder {
        ImporterBuilder::default()
    }

    /// The store the fixtures are written to.
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Loads every fixture in order and returns the number of objects saved.
    ///
    /// # Errors
    /// Any load error; nothing is committed in that case.
    pub fn run(&self) -> Result<usize> {
        let streams = self
            .fixtures
            .iter()
            .map(|fixture| SerializedStream::open_as(&fixture.format, &fixture.path))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.store.connect(&self.alias);
        let loaded = self.loader.load(&mut conn, streams).with_context(|| {
            format!("Loading {} fixture(s) through '{}'", self.fixtures.len(), self.alias)
        })?;

        info!(loaded, total = self.store.total(), "Import finished");
        Ok(loaded)
    }
}

/// Installs the global subscriber described by `settings`.
///
/// # Errors
/// An unknown level name, or any [`smuggler_logger::LoggerError`].
pub fn init_logger(settings: &LoggingSettings) -> Result<Logger> {
    let level = LevelFilter::from_str(&settings.level)
        .with_context(|| format!("Invalid log level '{}'", settings.level))?;

    let mut builder = Logger::builder().name(&settings.name).level(level).json(settings.json);
    if let Some(filter) = &settings.env_filter {
        builder = builder.env_filter(filter);
    }
    if let Some(directory) = &settings.directory {
        builder = builder.path(directory);
    }

    Ok(builder.init()?)
}
