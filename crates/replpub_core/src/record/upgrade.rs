//! Record format adapter.

use crate::error::PublisherResult;
use crate::record::Record;
use crate::relation::Relation;
use std::borrow::Cow;
use std::sync::Arc;

/// Normalizes `record` to the relation's current format.
///
/// A record already in the current format is returned borrowed. Otherwise a
/// new record is built in the current format: every field starts null and
/// receives the old value (converted if the type changed) only when the
/// field resolves in both layouts. The original record is never modified.
pub fn upgrade<'a>(relation: &Relation, record: &'a Record) -> PublisherResult<Cow<'a, Record>> {
    let format = relation.format();
    if record.version() == format.version() {
        return Ok(Cow::Borrowed(record));
    }

    let mut upgraded = Record::new(Arc::clone(format));

    for index in 0..format.count() {
        if let Some((desc, slot)) = record.resolve(index) {
            upgraded.move_from(index, desc, slot)?;
        }
    }

    Ok(Cow::Owned(upgraded))
}
