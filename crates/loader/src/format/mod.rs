//! Deserializers turning byte streams into lazily produced domain objects.
//!
//! Every built-in format shares the fixture record shape
//! `{"model": "app.model", "pk": 1, "fields": {...}}`.

mod json;
mod jsonl;
mod tabular;

pub use json::JsonFixtures;
pub use jsonl::JsonLines;
pub use tabular::CsvFixtures;

use crate::error::LoadError;
use crate::model::{DomainObject, ModelId, Record};
use fxhash::FxHashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// Objects in stream order. The first `Err` ends the stream.
pub type ObjectStream<'a> =
    Box<dyn Iterator<Item = Result<Box<dyn DomainObject>, LoadError>> + 'a>;

/// Converts one serialized stream into domain objects.
///
/// Implementations must read lazily: objects after a failing one are never produced.
pub trait Deserializer: fmt::Debug + Send + Sync {
    fn deserialize<'a>(&self, reader: Box<dyn BufRead + 'a>) -> ObjectStream<'a>;
}

/// Deserializers by format name, plus the file extensions that select them.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: FxHashMap<String, Arc<dyn Deserializer>>,
    extensions: FxHashMap<String, String>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `json`, `jsonl` (also `ndjson`) and `csv`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("json", JsonFixtures);
        registry.register("csv", CsvFixtures::default());
        registry.register("jsonl", JsonLines);
        registry.alias("ndjson", "jsonl");
        registry
    }

    /// Registers `deserializer` under `name`, which also becomes a recognized file extension.
    /// Returns the deserializer previously registered under that name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        deserializer: impl Deserializer + 'static,
    ) -> Option<Arc<dyn Deserializer>> {
        let name = name.into().to_ascii_lowercase();
        self.extensions.insert(name.clone(), name.clone());
        self.formats.insert(name, Arc::new(deserializer))
    }

    /// Makes `alias` resolve to the deserializer of `format`, as a name and as an extension.
    /// Does nothing when `format` is not registered.
    pub fn alias(&mut self, alias: impl Into<String>, format: &str) {
        let alias = alias.into().to_ascii_lowercase();
        if let Some(deserializer) = self.formats.get(format).cloned() {
            self.extensions.insert(alias.clone(), format.to_owned());
            self.formats.insert(alias, deserializer);
        }
    }

    /// # Errors
    /// [`LoadError::UnknownFormat`] when nothing is registered under `format`.
    pub fn get(&self, format: &str) -> Result<&dyn Deserializer, LoadError> {
        self.formats
            .get(format)
            .or_else(|| self.formats.get(&format.to_ascii_lowercase()))
            .map(|deserializer| &**deserializer)
            .ok_or_else(|| LoadError::UnknownFormat {
                message: format!("no deserializer registered for '{format}'").into(),
                context: Some(format!("known formats: {}", self.names().join(", ")).into()),
            })
    }

    pub fn contains(&self, format: &str) -> bool {
        self.get(format).is_ok()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Format selected by the extension of `path`, compared case-insensitively.
    ///
    /// # Errors
    /// [`LoadError::UnknownFormat`] for a missing or unrecognized extension.
    pub fn format_for_path(&self, path: &Path) -> Result<&str, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        self.extensions.get(&extension).map(String::as_str).ok_or_else(|| {
            LoadError::UnknownFormat {
                message: format!("cannot infer a format from '{}'", path.display()).into(),
                context: None,
            }
        })
    }
}

/// Wire shape of one fixture record.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureEntry {
    model: String,
    #[serde(default)]
    pk: Option<i64>,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl TryFrom<FixtureEntry> for Record {
    type Error = LoadError;

    fn try_from(entry: FixtureEntry) -> Result<Self, Self::Error> {
        Ok(Self { model: ModelId::parse(&entry.model)?, pk: entry.pk, fields: entry.fields })
    }
}

fn boxed(record: Record) -> Box<dyn DomainObject> {
    Box::new(record)
}
