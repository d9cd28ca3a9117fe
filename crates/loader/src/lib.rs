//! # Loader
//!
//! All-or-nothing bulk loading of serialized fixtures.
//!
//! A batch is an ordered list of [`SerializedStream`]s. [`BulkLoader::load`] deserializes
//! each one lazily, asks the [`WritePolicy`] whether every object may be written through the
//! target [`Connection`], saves the accepted ones and realigns the key sequences of the
//! models it touched. Everything happens inside one managed transaction: either every
//! accepted object is committed or none is.
//!
//! * Formats: [`format::JsonFixtures`], [`format::JsonLines`] and [`format::CsvFixtures`],
//!   looked up by name in a [`FormatRegistry`].
//! * Storage: any [`Connection`]; [`MemoryStore`] is the bundled backend.
//!
//! ## Example
//!
//! ```rust
//! use smuggler_loader::{BulkLoader, LoadError, MemoryStore, SerializedStream};
//!
//! fn main() -> Result<(), LoadError> {
//!     let store = MemoryStore::builder().model("library.book", ["title"]).build()?;
//!     let mut conn = store.connect("default");
//!
//!     let fixture = r#"[{"model": "library.book", "pk": 1, "fields": {"title": "Dune"}}]"#;
//!     let loaded = BulkLoader::default().load(&mut conn, [SerializedStream::from_bytes("json", fixture)])?;
//!
//!     assert_eq!(loaded, 1);
//!     assert_eq!(store.count("library.book"), 1);
//!     Ok(())
//! }
//! ```

mod backend;
mod error;
mod loader;
mod memory;
mod model;
mod policy;
mod stream;
mod transaction;

pub mod format;

pub use crate::backend::{Connection, Style};
pub use crate::error::{LoadError, LoadErrorExt};
pub use crate::format::{Deserializer, FormatRegistry, ObjectStream};
pub use crate::loader::{BulkLoader, BulkLoaderBuilder};
pub use crate::memory::{MemoryConnection, MemoryStore, MemoryStoreBuilder};
pub use crate::model::{DomainObject, ModelId, Record};
pub use crate::policy::{AllowAll, AppRouter, WritePolicy};
pub use crate::stream::SerializedStream;
pub use crate::transaction::Transaction;
