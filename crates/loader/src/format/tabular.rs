use super::{ObjectStream, boxed};
use crate::error::{LoadError, LoadErrorExt};
use crate::format::Deserializer;
use crate::model::{DomainObject, ModelId, Record};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Value};
use std::io::BufRead;

const MODEL_COLUMN: &str = "model";
const PK_COLUMN: &str = "pk";

/// Delimited text with a `model,pk,<field>...` header.
///
/// Every row must have as many cells as the header. Empty cells become `null`; an empty `pk`
/// leaves the key to the store.
#[derive(Debug, Clone, Copy)]
pub struct CsvFixtures {
    delimiter: u8,
}

impl CsvFixtures {
    pub const fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for CsvFixtures {
    fn default() -> Self {
        Self::with_delimiter(b',')
    }
}

impl Deserializer for CsvFixtures {
    fn deserialize<'a>(&self, reader: Box<dyn BufRead + 'a>) -> ObjectStream<'a> {
        let reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .trim(Trim::All)
            .from_reader(reader);

        Box::new(CsvRows { reader, columns: None, row: StringRecord::new(), line: 0, done: false })
    }
}

struct CsvRows<'a> {
    reader: csv::Reader<Box<dyn BufRead + 'a>>,
    /// Field names after `model` and `pk`, known once the header is read.
    columns: Option<Vec<String>>,
    row: StringRecord,
    line: u64,
    done: bool,
}

impl CsvRows<'_> {
    fn read_row(&mut self) -> Result<bool, LoadError> {
        self.line += 1;
        self.reader.read_record(&mut self.row).context(format!("line {}", self.line))
    }

    fn read_header(&mut self) -> Result<Option<Vec<String>>, LoadError> {
        if !self.read_row()? {
            return Ok(None);
        }

        let mut cells = self.row.iter();
        if cells.next() != Some(MODEL_COLUMN) || cells.next() != Some(PK_COLUMN) {
            return Err(LoadError::Validation {
                message: format!("header must start with `{MODEL_COLUMN},{PK_COLUMN}`").into(),
                context: Some("line 1".into()),
            });
        }

        let columns: Vec<String> = cells.map(str::to_owned).collect();
        if columns.iter().any(String::is_empty) {
            return Err(LoadError::Validation {
                message: "header contains an empty field name".into(),
                context: Some("line 1".into()),
            });
        }
        Ok(Some(columns))
    }

    fn next_object(&mut self) -> Option<Result<Box<dyn DomainObject>, LoadError>> {
        if self.columns.is_none() {
            match self.read_header() {
                Ok(Some(columns)) => self.columns = Some(columns),
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }

        match self.read_row() {
            Ok(true) => Some(self.convert().context(format!("line {}", self.line)).map(boxed)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }

    fn convert(&self) -> Result<Record, LoadError> {
        let model = ModelId::parse(self.row.get(0).unwrap_or_default())?;
        let pk = match self.row.get(1).unwrap_or_default() {
            "" => None,
            raw => Some(raw.parse::<i64>().map_err(|_| LoadError::Validation {
                message: format!("pk '{raw}' is not an integer").into(),
                context: None,
            })?),
        };

        let fields: Map<String, Value> = self
            .columns
            .iter()
            .flatten()
            .zip(self.row.iter().skip(2))
            .map(|(name, cell)| {
                let value = if cell.is_empty() { Value::Null } else { Value::from(cell) };
                (name.clone(), value)
            })
            .collect();

        Ok(Record { model, pk, fields })
    }
}

impl Iterator for CsvRows<'_> {
    type Item = Result<Box<dyn DomainObject>, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_object();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}
