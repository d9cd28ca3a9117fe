#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the smuggler crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! smuggler-derive = { path = "../infra/derive" }
//! thiserror = "2"
//! ```

mod error;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Turns a plain enum into the crate's error type.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` unless already present.
/// * **Context Support**: Generates a companion `<Name>Ext` trait that adds `.context(...)`
///   to `Result<T, Name>` and to `Result<T, Source>` for every variant with a source field.
/// * **Standard Conversions**: Implements `From<Source>` for variants holding a `source`
///   (or `#[source]` / `#[from]`) field, so upstream errors work with `?`.
/// * **Internal Fallback**: `From<&'static str>` and `From<String>` when an `Internal`
///   variant exists.
/// * **Classification**: Variants marked `#[validation]` make `is_validation()` return `true`.
///   These carry messages meant for the person who supplied the input.
///
/// # Requirements
///
/// 1. Only enums are accepted.
/// 2. Every variant uses named fields.
/// 3. Variants with a source must also carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use smuggler_derive::smuggler_error;
/// use std::borrow::Cow;
///
/// #[smuggler_error]
/// pub enum ImportError {
///     #[validation]
///     #[error("Bad record{}: {message}", format_context(.context))]
///     Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &str) -> Result<Vec<u8>, ImportError> {
///     std::fs::read(path).context("Reading fixture")
/// }
/// ```
#[proc_macro_attribute]
pub fn smuggler_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    error::expand(input).into()
}
