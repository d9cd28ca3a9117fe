use crate::error::LoadError;
use crate::model::{ModelId, Record};
use std::borrow::Cow;

/// A named storage connection with managed-transaction control.
///
/// While managed mode is active nothing is committed implicitly; only [`Connection::commit`]
/// publishes writes and [`Connection::rollback`] discards them.
pub trait Connection {
    /// Alias the connection was opened under, e.g. `default`.
    fn alias(&self) -> &str;

    /// Enters managed mode, flushing any pending implicit transaction first.
    fn begin_managed(&mut self) -> Result<(), LoadError>;

    fn commit(&mut self) -> Result<(), LoadError>;

    fn rollback(&mut self) -> Result<(), LoadError>;

    /// Leaves managed mode. Fails when uncommitted writes are still pending.
    fn leave_managed(&mut self) -> Result<(), LoadError>;

    /// Inserts or overwrites one row.
    fn persist(&mut self, record: &Record) -> Result<(), LoadError>;

    /// Statements that realign the key sequences of `models` with their current contents.
    fn sequence_reset_statements(&self, style: Style, models: &[&ModelId]) -> Vec<String>;

    fn execute(&mut self, statement: &str) -> Result<(), LoadError>;

    /// Releases the underlying session. The connection reopens on next use.
    fn close(&mut self) -> Result<(), LoadError>;
}

/// Rendering of generated SQL.
///
/// The loader always asks for [`Style::Plain`] unless configured otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Style {
    #[default]
    Plain,
    /// Terminal colors for echoing statements.
    Ansi,
}

impl Style {
    pub fn keyword(self, text: &str) -> Cow<'_, str> {
        self.paint("\x1b[1m", text)
    }

    pub fn table(self, text: &str) -> Cow<'_, str> {
        self.paint("\x1b[1;33m", text)
    }

    pub fn field(self, text: &str) -> Cow<'_, str> {
        self.paint("\x1b[1;36m", text)
    }

    fn paint<'t>(self, code: &str, text: &'t str) -> Cow<'t, str> {
        match self {
            Self::Plain => Cow::Borrowed(text),
            Self::Ansi => Cow::Owned(format!("{code}{text}\x1b[0m")),
        }
    }
}
