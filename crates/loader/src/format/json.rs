use super::{FixtureEntry, ObjectStream, boxed};
use crate::error::{LoadError, LoadErrorExt};
use crate::format::Deserializer;
use crate::model::{DomainObject, Record};
use serde_json::Value;
use std::io::BufRead;
use std::mem;
use std::vec;

/// A JSON array of fixture records.
///
/// The document is syntax-checked as a whole on the first pull; records are converted one at
/// a time after that, so a bad record stops the stream without touching the ones after it.
///
/// The whole document is held in memory, and a syntax error anywhere in it fails the stream
/// before any record is produced. Use [`super::JsonLines`] to stream large inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFixtures;

impl Deserializer for JsonFixtures {
    fn deserialize<'a>(&self, reader: Box<dyn BufRead + 'a>) -> ObjectStream<'a> {
        Box::new(JsonArray { state: State::Unread(reader) })
    }
}

enum State<'a> {
    Unread(Box<dyn BufRead + 'a>),
    Records(std::iter::Enumerate<vec::IntoIter<Value>>),
    Finished,
}

struct JsonArray<'a> {
    state: State<'a>,
}

impl Iterator for JsonArray<'_> {
    type Item = Result<Box<dyn DomainObject>, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match mem::replace(&mut self.state, State::Finished) {
                State::Unread(reader) => {
                    match serde_json::from_reader::<_, Vec<Value>>(reader)
                        .context("Parsing JSON fixture document")
                    {
                        Ok(values) => self.state = State::Records(values.into_iter().enumerate()),
                        Err(err) => return Some(Err(err)),
                    }
                },
                State::Records(mut records) => {
                    let (index, value) = records.next()?;
                    let object = convert(index, value);
                    if object.is_ok() {
                        self.state = State::Records(records);
                    }
                    return Some(object);
                },
                State::Finished => return None,
            }
        }
    }
}

fn convert(index: usize, value: Value) -> Result<Box<dyn DomainObject>, LoadError> {
    let context = format!("record #{}", index + 1);
    let entry = serde_json::from_value::<FixtureEntry>(value).context(context.clone())?;
    Record::try_from(entry).context(context).map(boxed)
}
