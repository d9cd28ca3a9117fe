use serde_json::json;
use smuggler_loader::{
    Connection, LoadError, MemoryConnection, MemoryStore, ModelId, Record, SerializedStream, Style,
};

pub const BOOK: &str = "library.book";
pub const AUTHOR: &str = "library.author";
pub const ENTRY: &str = "archive.entry";

/// Store accepting books (title required), authors and archive entries.
/// # Panics
/// * If the store cannot be built.
#[must_use]
pub fn setup_store() -> MemoryStore {
    MemoryStore::builder()
        .model(BOOK, ["title"])
        .model(AUTHOR, ["name"])
        .model(ENTRY, ["body"])
        .build()
        .expect("Store setup failed")
}

/// A JSON array stream of `model` records with keys `pks` and a value for `field`.
#[must_use]
pub fn json_stream(model: &str, field: &str, pks: impl IntoIterator<Item = i64>) -> SerializedStream<'static> {
    let records: Vec<_> = pks
        .into_iter()
        .map(|pk| json!({ "model": model, "pk": pk, "fields": { field: format!("{model} #{pk}") } }))
        .collect();
    SerializedStream::from_bytes("json", serde_json::to_vec(&records).expect("fixture encodes"))
}

#[must_use]
pub fn books(pks: impl IntoIterator<Item = i64>) -> SerializedStream<'static> {
    json_stream(BOOK, "title", pks)
}

#[must_use]
pub fn authors(pks: impl IntoIterator<Item = i64>) -> SerializedStream<'static> {
    json_stream(AUTHOR, "name", pks)
}

/// Wraps a [`MemoryConnection`] and fails chosen operations with [`injected_error`].
#[derive(Debug)]
pub struct FlakyConnection {
    pub inner: MemoryConnection,
    /// Fail the save after this many successful ones.
    pub fail_persist_after: Option<usize>,
    pub fail_execute: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_leave: bool,
    pub fail_close: bool,
    persisted: usize,
}

impl FlakyConnection {
    pub const fn new(inner: MemoryConnection) -> Self {
        Self {
            inner,
            fail_persist_after: None,
            fail_execute: false,
            fail_commit: false,
            fail_rollback: false,
            fail_leave: false,
            fail_close: false,
            persisted: 0,
        }
    }
}

/// Storage fault the loader must hand back untouched.
#[must_use]
pub fn injected_error() -> LoadError {
    LoadError::Storage { message: "connection reset by peer".into(), context: Some("injected".into()) }
}

impl Connection for FlakyConnection {
    fn alias(&self) -> &str {
        self.inner.alias()
    }

    fn begin_managed(&mut self) -> Result<(), LoadError> {
        self.inner.begin_managed()
    }

    fn commit(&mut self) -> Result<(), LoadError> {
        if self.fail_commit {
            return Err(injected_error());
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), LoadError> {
        if self.fail_rollback {
            return Err(LoadError::Storage { message: "rollback refused".into(), context: None });
        }
        self.inner.rollback()
    }

    fn leave_managed(&mut self) -> Result<(), LoadError> {
        if self.fail_leave {
            return Err(LoadError::Transaction { message: "leave refused".into(), context: None });
        }
        self.inner.leave_managed()
    }

    fn persist(&mut self, record: &Record) -> Result<(), LoadError> {
        if self.fail_persist_after.is_some_and(|limit| self.persisted >= limit) {
            return Err(injected_error());
        }
        self.persisted += 1;
        self.inner.persist(record)
    }

    fn sequence_reset_statements(&self, style: Style, models: &[&ModelId]) -> Vec<String> {
        self.inner.sequence_reset_statements(style, models)
    }

    fn execute(&mut self, statement: &str) -> Result<(), LoadError> {
        if self.fail_execute {
            return Err(injected_error());
        }
        self.inner.execute(statement)
    }

    fn close(&mut self) -> Result<(), LoadError> {
        if self.fail_close {
            return Err(LoadError::Storage { message: "close refused".into(), context: None });
        }
        self.inner.close()
    }
}
