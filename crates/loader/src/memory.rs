//! In-memory [`Connection`] backend.
//!
//! Tables are keyed by model and hold rows by primary key. Writes made in managed mode go to
//! a private snapshot of the committed tables; commit publishes the snapshot, rollback throws
//! it away. Outside managed mode every write is committed immediately.

use crate::backend::{Connection, Style};
use crate::error::LoadError;
use crate::model::{ModelId, Record};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Primary key column of every table.
const PK_COLUMN: &str = "id";

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<i64, Map<String, Value>>,
    /// Last key handed out to a row saved without one.
    sequence: i64,
}

impl Table {
    fn insert(&mut self, model: &ModelId, record: &Record) -> Result<(), LoadError> {
        let pk = match record.pk {
            Some(pk) => pk,
            None => {
                let next = self.sequence + 1;
                if self.rows.contains_key(&next) {
                    return Err(LoadError::Storage {
                        message: format!("duplicate key {PK_COLUMN}={next}").into(),
                        context: Some(format!("{model} sequence is behind its rows").into()),
                    });
                }
                self.sequence = next;
                next
            },
        };

        self.rows.insert(pk, record.fields.clone());
        Ok(())
    }

    fn max_pk(&self) -> i64 {
        self.rows.last_key_value().map_or(0, |(pk, _)| *pk)
    }
}

/// Row data plus the statement log; cloned whole to open a managed snapshot.
#[derive(Debug, Clone, Default)]
struct Tables {
    tables: BTreeMap<ModelId, Table>,
    executed: Vec<String>,
}

#[derive(Debug, Clone)]
struct Schema {
    required: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    schemas: FxHashMap<ModelId, Schema>,
    /// Table name to model; table names are unique.
    tables: FxHashMap<String, ModelId>,
    committed: Tables,
    /// Connection holding the managed transaction. Only it may write while set.
    writer: Option<u64>,
    next_connection: u64,
    commits: usize,
    rollbacks: usize,
}

/// Shared in-memory database. Clones refer to the same data.
///
/// One managed transaction at a time: while a connection is in managed mode, other
/// connections can neither begin one nor write in autocommit mode.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// Opens a connection under `alias`.
    pub fn connect(&self, alias: impl Into<String>) -> MemoryConnection {
        let id = {
            let mut state = self.state.lock();
            state.next_connection += 1;
            state.next_connection
        };
        MemoryConnection { store: self.clone(), id, alias: alias.into(), session: Session::Closed }
    }

    /// Returns `true` while some connection holds a managed transaction.
    pub fn is_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    /// Committed rows of `model`, ordered by key.
    pub fn rows(&self, model: &str) -> Vec<(i64, Map<String, Value>)> {
        self.with_table(model, |table| {
            table.rows.iter().map(|(pk, fields)| (*pk, fields.clone())).collect()
        })
        .unwrap_or_default()
    }

    pub fn count(&self, model: &str) -> usize {
        self.with_table(model, |table| table.rows.len()).unwrap_or_default()
    }

    /// Committed rows across all models.
    pub fn total(&self) -> usize {
        self.state.lock().committed.tables.values().map(|table| table.rows.len()).sum()
    }

    /// Last key handed out for `model`; the next key-less row gets `sequence + 1`.
    pub fn sequence(&self, model: &str) -> i64 {
        self.with_table(model, |table| table.sequence).unwrap_or_default()
    }

    /// Statements executed by committed transactions, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().committed.executed.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    fn with_table<R>(&self, model: &str, f: impl FnOnce(&Table) -> R) -> Option<R> {
        let model = ModelId::parse(model).ok()?;
        self.state.lock().committed.tables.get(&model).map(f)
    }

    fn schema(&self, model: &ModelId) -> Option<Schema> {
        self.state.lock().schemas.get(model).cloned()
    }

    fn model_for_table(&self, table: &str) -> Option<ModelId> {
        self.state.lock().tables.get(table).cloned()
    }
}

/// Declares the models a [`MemoryStore`] accepts.
#[must_use = "builders do nothing unless `.build()` is called"]
#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    models: Vec<(String, Vec<String>)>,
}

impl MemoryStoreBuilder {
    /// Accepts `model`; rows must carry a non-null value for every field in `required`.
    pub fn model<I, S>(mut self, model: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models.push((model.into(), required.into_iter().map(Into::into).collect()));
        self
    }

    /// # Errors
    /// [`LoadError::Validation`] when a model name is not `app_label.model_name`, or when two
    /// models map to the same table (`a_b.c` and `a.b_c`).
    pub fn build(self) -> Result<MemoryStore, LoadError> {
        let mut schemas = FxHashMap::default();
        let mut tables: FxHashMap<String, ModelId> = FxHashMap::default();

        for (model, required) in self.models {
            let model = ModelId::parse(&model)?;
            let table = model.db_table();
            if let Some(other) = tables.get(&table).filter(|other| **other != model) {
                return Err(LoadError::Validation {
                    message: format!("'{other}' and '{model}' share table \"{table}\"").into(),
                    context: None,
                });
            }
            tables.insert(table, model.clone());
            schemas.insert(model, Schema { required });
        }

        let state = StoreState { schemas, tables, ..StoreState::default() };
        Ok(MemoryStore { state: Arc::new(Mutex::new(state)) })
    }
}

#[derive(Debug)]
enum Session {
    Closed,
    /// Open, committing every write immediately.
    Autocommit,
    /// Writes go to the snapshot; `dirty` marks writes not yet committed or rolled back.
    Managed { snapshot: Tables, dirty: bool },
}

/// A connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    id: u64,
    alias: String,
    session: Session,
}

impl MemoryConnection {
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub const fn is_managed(&self) -> bool {
        matches!(self.session, Session::Managed { .. })
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self.session, Session::Closed)
    }

    fn committed_snapshot(&self) -> Tables {
        self.store.state.lock().committed.clone()
    }

    /// Runs `f` on the tables this connection currently writes to.
    fn write<R>(
        &mut self,
        f: impl FnOnce(&mut Tables) -> Result<R, LoadError>,
    ) -> Result<R, LoadError> {
        match &mut self.session {
            Session::Managed { snapshot, dirty } => {
                let result = f(snapshot)?;
                *dirty = true;
                Ok(result)
            },
            session => {
                if matches!(session, Session::Closed) {
                    trace!(alias = %self.alias, "Reopening connection");
                    *session = Session::Autocommit;
                }
                let mut state = self.store.state.lock();
                if state.writer.is_some_and(|holder| holder != self.id) {
                    return Err(locked(&self.alias));
                }
                f(&mut state.committed)
            },
        }
    }

    fn release_writer(&self) {
        let mut state = self.store.state.lock();
        if state.writer == Some(self.id) {
            state.writer = None;
        }
    }

    fn not_managed(&self, operation: &str) -> LoadError {
        LoadError::Transaction {
            message: format!("{operation} called outside managed mode").into(),
            context: Some(self.alias.clone().into()),
        }
    }
}

impl Connection for MemoryConnection {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn begin_managed(&mut self) -> Result<(), LoadError> {
        if self.is_managed() {
            return Err(LoadError::Transaction {
                message: "already in managed mode".into(),
                context: Some(self.alias.clone().into()),
            });
        }

        let snapshot = {
            let mut state = self.store.state.lock();
            if state.writer.is_some_and(|holder| holder != self.id) {
                return Err(locked(&self.alias));
            }
            state.writer = Some(self.id);
            state.committed.clone()
        };
        self.session = Session::Managed { snapshot, dirty: false };
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LoadError> {
        if !self.is_managed() {
            return Err(self.not_managed("commit"));
        }

        let mut state = self.store.state.lock();
        if let Session::Managed { snapshot, dirty } = &mut self.session {
            state.committed = snapshot.clone();
            *dirty = false;
        }
        state.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), LoadError> {
        if !self.is_managed() {
            return Err(self.not_managed("rollback"));
        }

        let snapshot = self.committed_snapshot();
        self.store.state.lock().rollbacks += 1;
        self.session = Session::Managed { snapshot, dirty: false };
        Ok(())
    }

    fn leave_managed(&mut self) -> Result<(), LoadError> {
        match self.session {
            Session::Managed { dirty: false, .. } => {
                self.session = Session::Autocommit;
                self.release_writer();
                Ok(())
            },
            Session::Managed { dirty: true, .. } => Err(LoadError::Transaction {
                message: "managed block ended with pending changes".into(),
                context: Some(self.alias.clone().into()),
            }),
            _ => Err(self.not_managed("leave_managed")),
        }
    }

    fn persist(&mut self, record: &Record) -> Result<(), LoadError> {
        let Some(schema) = self.store.schema(&record.model) else {
            return Err(LoadError::Validation {
                message: format!("unknown model '{}'", record.model).into(),
                context: None,
            });
        };

        if let Some(pk) = record.pk.filter(|pk| *pk < 1) {
            return Err(LoadError::Validation {
                message: format!("{PK_COLUMN} must be positive, got {pk}").into(),
                context: Some(record.model.to_string().into()),
            });
        }

        if let Some(missing) = schema
            .required
            .iter()
            .find(|field| record.fields.get(field.as_str()).is_none_or(Value::is_null))
        {
            return Err(LoadError::Validation {
                message: format!("field '{missing}' may not be null").into(),
                context: Some(record.model.to_string().into()),
            });
        }

        let model = record.model.clone();
        self.write(|tables| tables.tables.entry(model.clone()).or_default().insert(&model, record))
    }

    fn sequence_reset_statements(&self, style: Style, models: &[&ModelId]) -> Vec<String> {
        models.iter().map(|model| sequence_reset_sql(style, &model.db_table())).collect()
    }

    fn execute(&mut self, statement: &str) -> Result<(), LoadError> {
        let table = parse_sequence_reset(statement).ok_or_else(|| LoadError::Storage {
            message: "unsupported statement".into(),
            context: Some(statement.to_owned().into()),
        })?;
        let model = self.store.model_for_table(table).ok_or_else(|| LoadError::Storage {
            message: format!("relation \"{table}\" does not exist").into(),
            context: None,
        })?;

        self.write(|tables| {
            let target = tables.tables.entry(model).or_default();
            target.sequence = target.max_pk();
            tables.executed.push(statement.to_owned());
            Ok(())
        })
    }

    fn close(&mut self) -> Result<(), LoadError> {
        if matches!(self.session, Session::Managed { dirty: true, .. }) {
            return Err(LoadError::Transaction {
                message: "cannot close with pending changes".into(),
                context: Some(self.alias.clone().into()),
            });
        }
        self.session = Session::Closed;
        self.release_writer();
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release_writer();
    }
}

fn locked(alias: &str) -> LoadError {
    LoadError::Transaction {
        message: "store is locked by another managed transaction".into(),
        context: Some(alias.to_owned().into()),
    }
}

/// `SELECT setval(pg_get_serial_sequence('"<table>"','id'), coalesce(max("id"), 1), max("id") IS NOT null) FROM "<table>";`
fn sequence_reset_sql(style: Style, table: &str) -> String {
    let quoted = format!("\"{table}\"");
    let pk = format!("\"{PK_COLUMN}\"");
    format!(
        "{select} setval(pg_get_serial_sequence('{seq_table}','{pk_name}'), coalesce(max({pk}), 1), max({pk}) {is_not} null) {from} {table};",
        select = style.keyword("SELECT"),
        seq_table = style.table(&quoted),
        pk_name = style.field(PK_COLUMN),
        pk = style.field(&pk),
        is_not = style.keyword("IS NOT"),
        from = style.keyword("FROM"),
        table = style.table(&quoted),
    )
}

/// Table named by a plain-style sequence reset statement.
fn parse_sequence_reset(statement: &str) -> Option<&str> {
    let rest = statement.trim().strip_prefix("SELECT setval(pg_get_serial_sequence('\"")?;
    let (table, rest) = rest.split_once("\"','")?;
    let expected = format!(
        "{PK_COLUMN}'), coalesce(max(\"{PK_COLUMN}\"), 1), max(\"{PK_COLUMN}\") IS NOT null) FROM \"{table}\";"
    );
    (rest == expected).then_some(table)
}
