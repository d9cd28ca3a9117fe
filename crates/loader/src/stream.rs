use crate::error::{LoadError, LoadErrorExt};
use crate::format::FormatRegistry;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

/// A readable byte stream tagged with the name of its serialization format.
///
/// Nothing is read until the loader consumes the stream.
pub struct SerializedStream<'a> {
    format: String,
    reader: Box<dyn BufRead + 'a>,
}

impl<'a> SerializedStream<'a> {
    pub fn new(format: impl Into<String>, reader: impl Read + 'a) -> Self {
        Self { format: format.into(), reader: Box::new(BufReader::new(reader)) }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn into_parts(self) -> (String, Box<dyn BufRead + 'a>) {
        (self.format, self.reader)
    }
}

impl SerializedStream<'static> {
    pub fn from_bytes(format: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { format: format.into(), reader: Box::new(Cursor::new(bytes.into())) }
    }

    /// Opens `path`, taking the format from its extension.
    ///
    /// # Errors
    /// [`LoadError::UnknownFormat`] when the extension maps to no registered format,
    /// [`LoadError::Io`] when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, registry: &FormatRegistry) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let format = registry.format_for_path(path)?.to_owned();
        Self::open_as(format, path)
    }

    pub fn open_as(format: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).context(format!("Opening fixture {}", path.display()))?;
        Ok(Self::new(format, file))
    }
}

impl fmt::Debug for SerializedStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializedStream").field("format", &self.format).finish_non_exhaustive()
    }
}
