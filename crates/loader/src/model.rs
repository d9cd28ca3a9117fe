use crate::backend::Connection;
use crate::error::LoadError;
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identity of a persistent type, written `app_label.model_name`.
///
/// Stored lowercase so `Library.Book` and `library.book` name the same model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(Arc<str>);

impl ModelId {
    /// # Errors
    /// [`LoadError::Validation`] unless `raw` is two non-empty identifiers joined by a dot.
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let normalized = raw.trim().to_ascii_lowercase();
        let valid = normalized.split_once('.').is_some_and(|(app, model)| {
            is_identifier(app) && is_identifier(model)
        });

        if !valid {
            return Err(LoadError::Validation {
                message: format!("'{raw}' is not an `app_label.model_name` identifier").into(),
                context: None,
            });
        }

        Ok(Self(normalized.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn app_label(&self) -> &str {
        self.split().0
    }

    pub fn model_name(&self) -> &str {
        self.split().1
    }

    /// Backing table name, `app_label_model_name`.
    pub fn db_table(&self) -> String {
        let (app, model) = self.split();
        format!("{app}_{model}")
    }

    fn split(&self) -> (&str, &str) {
        self.0.split_once('.').unwrap_or((&self.0, ""))
    }
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelId {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A deserialized object that knows how to persist itself.
pub trait DomainObject: fmt::Debug {
    fn model(&self) -> &ModelId;

    /// Writes the object through `conn`. Errors propagate to the loader unchanged.
    fn save(&self, conn: &mut dyn Connection) -> Result<(), LoadError>;
}

/// Generic fixture record: a model, an optional primary key and a field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub model: ModelId,
    pub pk: Option<i64>,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(model: ModelId) -> Self {
        Self { model, pk: None, fields: Map::new() }
    }

    #[must_use]
    pub const fn with_pk(mut self, pk: i64) -> Self {
        self.pk = Some(pk);
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl DomainObject for Record {
    fn model(&self) -> &ModelId {
        &self.model
    }

    fn save(&self, conn: &mut dyn Connection) -> Result<(), LoadError> {
        conn.persist(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes() {
        let id = ModelId::parse(" Library.Book ").unwrap();
        assert_eq!(id.as_str(), "library.book");
        assert_eq!(id.app_label(), "library");
        assert_eq!(id.model_name(), "book");
        assert_eq!(id.db_table(), "library_book");
        assert_eq!(id.to_string(), "library.book");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for raw in ["", "book", ".book", "library.", "library.book.extra", "lib rary.book"] {
            let err = ModelId::parse(raw).unwrap_err();
            assert!(err.is_validation(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn record_builder_collects_fields() {
        let record = Record::new("shop.item".parse().unwrap())
            .with_pk(4)
            .with_field("name", "lamp")
            .with_field("stock", 3);

        assert_eq!(record.pk, Some(4));
        assert_eq!(record.fields["name"], "lamp");
        assert_eq!(record.fields["stock"], 3);
        assert_eq!(record.model().as_str(), "shop.item");
    }
}
