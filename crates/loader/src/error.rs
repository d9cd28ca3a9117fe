use std::borrow::Cow;

/// A specialized [`LoadError`] enum of this crate.
///
/// Errors travel from the failing collaborator to the caller untouched; the loader only
/// rolls back before returning them.
#[smuggler_derive::smuggler_error]
pub enum LoadError {
    /// A record is malformed or was rejected by the storage layer.
    #[validation]
    #[error("Validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// No deserializer is registered under the requested name.
    #[validation]
    #[error("Unknown serialization format{}: {message}", format_context(.context))]
    UnknownFormat { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[validation]
    #[error("JSON error{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[validation]
    #[error("CSV error{}: {source}", format_context(.context))]
    Csv { source: csv::Error, context: Option<Cow<'static, str>> },

    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// Backend failure: constraint violation, lost connection, unsupported statement.
    #[error("Storage error{}: {message}", format_context(.context))]
    Storage { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Managed-transaction misuse, e.g. committing outside managed mode.
    #[error("Transaction error{}: {message}", format_context(.context))]
    Transaction { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal loader error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
