//! Records, formats and the views handed to replicators.
//!
//! - [`Format`] / [`FieldDesc`]: the layout a record was written under
//! - [`Record`]: a row image tagged with its format
//! - [`upgrade`]: normalizes a record to its relation's current format
//! - [`ReplicatedRecord`]: read-only field reflector over a record

mod format;
mod reflect;
mod upgrade;
mod value;

pub use format::{
    DataType, FieldDesc, Format, SQL_BLOB, SQL_BOOLEAN, SQL_DOUBLE, SQL_FLOAT, SQL_INT64,
    SQL_LONG, SQL_SHORT, SQL_TEXT, SQL_TIMESTAMP, SQL_TYPE_DATE, SQL_VARYING,
};
pub use reflect::{Fields, ReplicatedField, ReplicatedRecord};
pub use upgrade::upgrade;
pub use value::{decode, encode, move_value, Value};

use crate::error::{PublisherError, PublisherResult};
use crate::types::FormatVersion;
use std::sync::Arc;

/// A row image in a specific format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    format: Arc<Format>,
    data: Vec<u8>,
}

impl Record {
    /// Creates a record in `format` with every field null.
    #[must_use]
    pub fn new(format: Arc<Format>) -> Self {
        let mut data = vec![0u8; format.record_length()];
        let count = format.count();
        for index in 0..count {
            data[index / 8] |= 1 << (index % 8);
        }
        Self { format, data }
    }

    /// Wraps an existing record image.
    pub fn from_image(format: Arc<Format>, data: Vec<u8>) -> PublisherResult<Self> {
        if data.len() != format.record_length() {
            return Err(PublisherError::invalid_format(format!(
                "record image is {} bytes, format {} expects {}",
                data.len(),
                format.version(),
                format.record_length()
            )));
        }
        Ok(Self { format, data })
    }

    /// Returns the record's format.
    #[must_use]
    pub fn format(&self) -> &Arc<Format> {
        &self.format
    }

    /// Returns the version of the record's format.
    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.format.version()
    }

    /// Returns the image length in bytes.
    #[must_use]
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Returns the raw image, null bitmap included.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns true if the field is null. Out-of-range fields read as null.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        if index >= self.format.count() {
            return true;
        }
        self.data[index / 8] & (1 << (index % 8)) != 0
    }

    /// Marks a field null.
    pub fn set_null(&mut self, index: usize) {
        if index < self.format.count() {
            self.data[index / 8] |= 1 << (index % 8);
        }
    }

    /// Clears a field's null flag.
    pub fn clear_null(&mut self, index: usize) {
        if index < self.format.count() {
            self.data[index / 8] &= !(1 << (index % 8));
        }
    }

    /// Returns the descriptor and storage of a non-null stored field.
    ///
    /// `None` for out-of-range, unknown-typed, storage-less or null fields.
    #[must_use]
    pub fn resolve(&self, index: usize) -> Option<(&FieldDesc, &[u8])> {
        let desc = self.format.field(index)?;
        let slot = self.slot(index)?;
        if self.is_null(index) {
            return None;
        }
        Some((desc, slot))
    }

    /// Returns the storage of a field regardless of its null flag.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&[u8]> {
        let desc = self.format.field(index)?;
        if !desc.is_stored() {
            return None;
        }
        let offset = desc.offset()?;
        self.data
            .get(offset..offset + desc.data_type().storage_len())
    }

    fn slot_mut(&mut self, index: usize) -> Option<(FieldDesc, &mut [u8])> {
        let desc = self.format.field(index)?.clone();
        if !desc.is_stored() {
            return None;
        }
        let offset = desc.offset()?;
        let len = desc.data_type().storage_len();
        let slot = self.data.get_mut(offset..offset + len)?;
        Some((desc, slot))
    }

    /// Reads a field value; `None` when the field is null or not stored.
    pub fn get(&self, index: usize) -> PublisherResult<Option<Value>> {
        match self.resolve(index) {
            Some((desc, slot)) => decode(desc, slot).map(Some),
            None => Ok(None),
        }
    }

    /// Writes a field value, converting it to the field's type.
    pub fn set(&mut self, index: usize, value: &Value) -> PublisherResult<()> {
        let (desc, slot) = self.slot_mut(index).ok_or_else(|| {
            PublisherError::invalid_operation(format!("field {index} has no storage"))
        })?;
        encode(&desc, value, slot)?;
        self.clear_null(index);
        Ok(())
    }

    /// Moves a stored field value from another record into this one.
    pub(crate) fn move_from(
        &mut self,
        index: usize,
        source_desc: &FieldDesc,
        source: &[u8],
    ) -> PublisherResult<bool> {
        let Some((desc, slot)) = self.slot_mut(index) else {
            return Ok(false);
        };
        move_value(source_desc, source, &desc, slot)?;
        self.clear_null(index);
        Ok(true)
    }
}
