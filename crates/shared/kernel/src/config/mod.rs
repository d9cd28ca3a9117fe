use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix for environment overrides (`SMUGGLER__DATABASE__ALIAS=replica`).
pub const ENV_PREFIX: &str = "SMUGGLER";
const DEFAULT_CONFIG: &str = "smuggler";

#[smuggler_derive::smuggler_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads `T` from a configuration file, then applies environment overrides.
///
/// The file extension picks the parser (`smuggler.toml`, `smuggler.json`, ...); without an
/// extension every supported one is tried. `None` means `smuggler` in the working directory.
/// Nested keys are reached with double underscores: `SMUGGLER__LOGGING__LEVEL=debug`.
///
/// # Errors
/// [`ConfigError::Config`] when the file is missing, cannot be parsed, or does not match `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG), |p| p.as_ref().to_path_buf());
    info!(path = %path.display(), "Loading configuration");

    Config::builder()
        .add_source(File::from(path.as_path()).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        )
        .build()
        .context(format!("Failed to read {}", path.display()))?
        .try_deserialize::<T>()
        .context("Failed to deserialize settings")
}
