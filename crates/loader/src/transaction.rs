use crate::backend::Connection;
use crate::error::LoadError;
use std::fmt;
use tracing::{debug, warn};

/// Scope guard over a connection in managed mode.
///
/// [`Transaction::commit`] publishes the writes, leaves managed mode and closes the connection.
/// Dropping an uncommitted guard rolls back and leaves managed mode; failures during that
/// cleanup are logged and never replace the error that caused the unwind.
pub struct Transaction<'c> {
    conn: &'c mut dyn Connection,
    committed: bool,
}

impl<'c> Transaction<'c> {
    /// Flushes any implicit transaction and enters managed mode.
    pub fn begin(conn: &'c mut dyn Connection) -> Result<Self, LoadError> {
        conn.begin_managed()?;
        debug!(alias = conn.alias(), "Entered managed transaction");
        Ok(Self { conn, committed: false })
    }

    pub fn alias(&self) -> &str {
        self.conn.alias()
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.conn
    }

    /// Commits, then leaves managed mode and closes the connection.
    ///
    /// Only a failed commit is an error. Once the commit succeeded the writes are durable, so
    /// failures while leaving managed mode or closing are logged and swallowed.
    pub fn commit(mut self) -> Result<(), LoadError> {
        self.conn.commit()?;
        self.committed = true;

        let alias = self.conn.alias().to_owned();
        if let Err(err) = self.conn.leave_managed() {
            warn!(%alias, error = %err, "Leaving managed mode after commit failed");
        }
        if let Err(err) = self.conn.close() {
            warn!(%alias, error = %err, "Closing connection after commit failed");
        }
        debug!(%alias, "Committed and closed");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let alias = self.conn.alias().to_owned();
        if let Err(err) = self.conn.rollback() {
            warn!(%alias, error = %err, "Rollback failed");
        }
        if let Err(err) = self.conn.leave_managed() {
            warn!(%alias, error = %err, "Leaving managed mode failed");
        }
        debug!(%alias, "Rolled back");
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("alias", &self.conn.alias())
            .field("committed", &self.committed)
            .finish()
    }
}
