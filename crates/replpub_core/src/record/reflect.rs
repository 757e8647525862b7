//! Field reflector handed to replicator sessions.
//!
//! The reflector exposes per-field metadata and raw bytes of a normalized
//! record without the publisher knowing the replicator's wire format. Field
//! views are immutable values; iterating twice yields the same fields.

use crate::record::Record;
use crate::relation::Relation;
use crate::types::CharSetId;

/// Read-only view of a record for replication.
#[derive(Debug, Clone, Copy)]
pub struct ReplicatedRecord<'a> {
    relation: &'a Relation,
    record: &'a Record,
}

impl<'a> ReplicatedRecord<'a> {
    /// Creates a view over `record`, named through `relation`'s metadata.
    #[must_use]
    pub fn new(relation: &'a Relation, record: &'a Record) -> Self {
        Self { relation, record }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &'a str {
        self.relation.name()
    }

    /// Returns the number of fields in the record's format.
    #[must_use]
    pub fn count(&self) -> usize {
        self.record.format().count()
    }

    /// Returns the field at `index`.
    ///
    /// `None` when the index is out of range or the field has an unknown
    /// type or no storage; callers must not treat this as an error.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<ReplicatedField<'a>> {
        let record = self.record;
        let desc = record.format().field(index)?;
        let sql_type = desc.data_type().sql_type()?;
        let slot = record.slot(index)?;

        Some(ReplicatedField {
            index,
            name: self.relation.field_name(index),
            sql_type,
            sub_type: desc.sub_type(),
            scale: desc.scale(),
            length: desc.data_type().sql_length(),
            charset: desc.charset(),
            data: if record.is_null(index) {
                None
            } else {
                Some(slot)
            },
        })
    }

    /// Returns the available fields in index order.
    #[must_use]
    pub fn fields(&self) -> Fields<'a> {
        Fields {
            record: *self,
            next: 0,
        }
    }

    /// Returns the length of the whole record image.
    #[must_use]
    pub fn raw_length(&self) -> usize {
        self.record.length()
    }

    /// Returns the whole record image, null bitmap included.
    #[must_use]
    pub fn raw_data(&self) -> &'a [u8] {
        self.record.data()
    }
}

/// Iterator over the available fields of a [`ReplicatedRecord`].
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    record: ReplicatedRecord<'a>,
    next: usize,
}

impl<'a> Iterator for Fields<'a> {
    type Item = ReplicatedField<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.record.count() {
            let index = self.next;
            self.next += 1;
            if let Some(field) = self.record.field(index) {
                return Some(field);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.record.count().saturating_sub(self.next)))
    }
}

/// Metadata and value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicatedField<'a> {
    index: usize,
    name: Option<&'a str>,
    sql_type: u32,
    sub_type: i16,
    scale: i8,
    length: u32,
    charset: CharSetId,
    data: Option<&'a [u8]>,
}

impl<'a> ReplicatedField<'a> {
    /// Field position within the format.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Field name from the relation metadata, if known.
    #[must_use]
    pub const fn name(&self) -> Option<&'a str> {
        self.name
    }

    /// SQL type code.
    #[must_use]
    pub const fn sql_type(&self) -> u32 {
        self.sql_type
    }

    /// Sub-type.
    #[must_use]
    pub const fn sub_type(&self) -> i16 {
        self.sub_type
    }

    /// Decimal scale.
    #[must_use]
    pub const fn scale(&self) -> i8 {
        self.scale
    }

    /// SQL length.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Character set.
    #[must_use]
    pub const fn charset(&self) -> CharSetId {
        self.charset
    }

    /// Stored bytes, `None` when the field is null.
    #[must_use]
    pub const fn data(&self) -> Option<&'a [u8]> {
        self.data
    }

    /// Returns true if the field is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, FieldDesc, Format, Value, SQL_LONG, SQL_VARYING};
    use crate::types::{FormatVersion, RelationId};
    use std::sync::Arc;

    fn relation() -> Relation {
        let format = Arc::new(Format::new(
            FormatVersion::new(1),
            vec![
                FieldDesc::new(DataType::Integer).with_scale(-2),
                FieldDesc::new(DataType::Unknown),
                FieldDesc::new(DataType::VarChar(12)).with_charset(CharSetId::UTF8),
            ],
        ));
        Relation::new(RelationId::new(130), "INVOICES", format)
            .with_field_names(["AMOUNT", "OLD_NOTE", "CUSTOMER"])
    }

    #[test]
    fn field_metadata() {
        let rel = relation();
        let mut record = Record::new(Arc::clone(rel.format()));
        record.set(0, &Value::int(3)).unwrap();

        let view = ReplicatedRecord::new(&rel, &record);
        let amount = view.field(0).unwrap();
        assert_eq!(amount.name(), Some("AMOUNT"));
        assert_eq!(amount.sql_type(), SQL_LONG);
        assert_eq!(amount.scale(), -2);
        assert_eq!(amount.length(), 4);
        assert_eq!(amount.data(), Some(&300i32.to_le_bytes()[..]));

        let customer = view.field(2).unwrap();
        assert_eq!(customer.sql_type(), SQL_VARYING);
        assert_eq!(customer.length(), 12);
        assert_eq!(customer.charset(), CharSetId::UTF8);
        assert!(customer.is_null());
    }

    #[test]
    fn withheld_fields() {
        let rel = relation();
        let record = Record::new(Arc::clone(rel.format()));
        let view = ReplicatedRecord::new(&rel, &record);

        assert!(view.field(1).is_none());
        assert!(view.field(3).is_none());
        assert_eq!(view.count(), 3);
    }

    #[test]
    fn fields_iteration_is_restartable() {
        let rel = relation();
        let record = Record::new(Arc::clone(rel.format()));
        let view = ReplicatedRecord::new(&rel, &record);

        let first: Vec<usize> = view.fields().map(|f| f.index()).collect();
        let second: Vec<usize> = view.fields().map(|f| f.index()).collect();
        assert_eq!(first, vec![0, 2]);
        assert_eq!(first, second);
    }

    #[test]
    fn raw_image() {
        let rel = relation();
        let record = Record::new(Arc::clone(rel.format()));
        let view = ReplicatedRecord::new(&rel, &record);

        assert_eq!(view.raw_length(), record.length());
        assert_eq!(view.raw_data(), record.data());
        assert_eq!(view.table_name(), "INVOICES");
    }
}
