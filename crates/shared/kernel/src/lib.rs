//! Settings shared by smuggler applications and the loader that reads them.
//!
//! ```rust,no_run
//! use smuggler_kernel::config::load_config;
//! use smuggler_kernel::settings::Settings;
//!
//! let settings: Settings = load_config(Some("smuggler")).unwrap_or_default();
//! assert_eq!(settings.database.alias, "default");
//! ```

pub mod config;
pub mod settings;

pub use crate::config::{ConfigError, ConfigErrorExt, load_config};
pub use crate::settings::Settings;
