use crate::backend::{Connection, Style};
use crate::error::LoadError;
use crate::format::FormatRegistry;
use crate::model::ModelId;
use crate::policy::{AllowAll, WritePolicy};
use crate::stream::SerializedStream;
use crate::transaction::Transaction;
use fxhash::FxHashSet;
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

/// Loads serialized streams into one connection as a single all-or-nothing batch.
///
/// # Example
///
/// ```rust
/// # use smuggler_loader::{AppRouter, BulkLoader, Style};
/// let loader = BulkLoader::builder()
///     .policy(AppRouter::new().route("archive", "cold"))
///     .style(Style::Plain)
///     .build();
/// # let _ = loader;
/// ```
#[derive(Debug)]
pub struct BulkLoader<P = AllowAll> {
    registry: FormatRegistry,
    policy: P,
    style: Style,
}

impl BulkLoader {
    pub fn builder() -> BulkLoaderBuilder {
        BulkLoaderBuilder { registry: None, policy: AllowAll, style: Style::Plain }
    }
}

impl Default for BulkLoader {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<P: WritePolicy> BulkLoader<P> {
    pub const fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Deserializes every stream in order and saves the objects the policy accepts.
    ///
    /// Runs inside one managed transaction on `conn`. When at least one object was saved,
    /// the key sequences of every touched model are reset before committing. On success the
    /// connection is closed and the number of saved objects returned.
    ///
    /// # Errors
    /// The first error raised by a deserializer, a save, a reset statement or the commit,
    /// returned unchanged after the transaction has been rolled back.
    #[instrument(name = "bulk_load", skip_all, fields(alias = %conn.alias()))]
    pub fn load<'a, I>(&self, conn: &mut dyn Connection, streams: I) -> Result<usize, LoadError>
    where
        I: IntoIterator<Item = SerializedStream<'a>>,
    {
        let started = Instant::now();
        let mut tx = Transaction::begin(conn)?;

        let mut saved = 0usize;
        let mut skipped = 0usize;
        let mut touched: FxHashSet<ModelId> = FxHashSet::default();

        for stream in streams {
            let (format, reader) = stream.into_parts();
            let deserializer = self.registry.get(&format)?;
            debug!(%format, "Reading stream");

            for object in deserializer.deserialize(reader) {
                let object = object?;
                let model = object.model();

                if !self.policy.allow_write(tx.alias(), model) {
                    trace!(%model, "Write not allowed on this connection, skipping");
                    skipped += 1;
                    continue;
                }

                if !touched.contains(model) {
                    touched.insert(model.clone());
                }
                saved += 1;
                object.save(tx.connection())?;
            }
        }

        if saved > 0 {
            let mut models: Vec<&ModelId> = touched.iter().collect();
            models.sort_unstable();

            let statements = tx.connection().sequence_reset_statements(self.style, &models);
            for statement in &statements {
                trace!(%statement, "Resetting sequence");
                tx.connection().execute(statement)?;
            }
        }

        tx.commit()?;

        info!(
            objects = saved,
            skipped,
            models = touched.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Fixtures loaded"
        );
        Ok(saved)
    }
}

/// Builder for [`BulkLoader`]. Defaults to the built-in formats, [`AllowAll`] and
/// [`Style::Plain`].
#[must_use = "builders do nothing unless `.build()` is called"]
#[derive(Debug)]
pub struct BulkLoaderBuilder<P = AllowAll> {
    registry: Option<FormatRegistry>,
    policy: P,
    style: Style,
}

impl<P: WritePolicy> BulkLoaderBuilder<P> {
    pub fn registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn policy<Q: WritePolicy>(self, policy: Q) -> BulkLoaderBuilder<Q> {
        BulkLoaderBuilder { registry: self.registry, policy, style: self.style }
    }

    pub const fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn build(self) -> BulkLoader<P> {
        BulkLoader {
            registry: self.registry.unwrap_or_else(FormatRegistry::builtin),
            policy: self.policy,
            style: self.style,
        }
    }
}
