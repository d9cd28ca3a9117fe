use super::{FixtureEntry, ObjectStream, boxed};
use crate::error::{LoadError, LoadErrorExt};
use crate::format::Deserializer;
use crate::model::{DomainObject, Record};
use std::io::BufRead;

/// One fixture record per JSON value, usually one per line. Fully streaming.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLines;

impl Deserializer for JsonLines {
    fn deserialize<'a>(&self, reader: Box<dyn BufRead + 'a>) -> ObjectStream<'a> {
        let entries = serde_json::Deserializer::from_reader(reader).into_iter::<FixtureEntry>();
        let mut failed = false;

        Box::new(entries.enumerate().map_while(move |(index, entry)| {
            if failed {
                return None;
            }
            let object = convert(index, entry);
            failed = object.is_err();
            Some(object)
        }))
    }
}

fn convert(
    index: usize,
    entry: Result<FixtureEntry, serde_json::Error>,
) -> Result<Box<dyn DomainObject>, LoadError> {
    let context = format!("record #{}", index + 1);
    let entry = entry.context(context.clone())?;
    Record::try_from(entry).context(context).map(boxed)
}
