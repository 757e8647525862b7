//! Record formats.
//!
//! A format is the field layout a record was written under. The record image
//! starts with a null bitmap (`ceil(count / 8)` bytes, bit set = null)
//! followed by one fixed-size slot per stored field, in field order.

use crate::types::{CharSetId, FormatVersion};
use serde::{Deserialize, Serialize};

/// SQL type code of `VARCHAR`.
pub const SQL_VARYING: u32 = 448;
/// SQL type code of `CHAR`.
pub const SQL_TEXT: u32 = 452;
/// SQL type code of `DOUBLE PRECISION`.
pub const SQL_DOUBLE: u32 = 480;
/// SQL type code of `FLOAT`.
pub const SQL_FLOAT: u32 = 482;
/// SQL type code of `INTEGER`.
pub const SQL_LONG: u32 = 496;
/// SQL type code of `SMALLINT`.
pub const SQL_SHORT: u32 = 500;
/// SQL type code of `TIMESTAMP`.
pub const SQL_TIMESTAMP: u32 = 510;
/// SQL type code of `BLOB`.
pub const SQL_BLOB: u32 = 520;
/// SQL type code of `DATE`.
pub const SQL_TYPE_DATE: u32 = 570;
/// SQL type code of `BIGINT`.
pub const SQL_INT64: u32 = 580;
/// SQL type code of `BOOLEAN`.
pub const SQL_BOOLEAN: u32 = 32764;

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Unknown or dropped field; has no storage.
    Unknown,
    /// Boolean, one byte.
    Boolean,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Fixed-length text of the given byte length, blank padded.
    Char(u16),
    /// Variable-length text of the given maximum byte length.
    VarChar(u16),
    /// Days since 1970-01-01.
    Date,
    /// Days since 1970-01-01 plus time of day in 1/10000 s.
    Timestamp,
    /// Blob identifier.
    Blob,
}

impl DataType {
    /// Returns the number of bytes the type occupies in a record image.
    #[must_use]
    pub const fn storage_len(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::Boolean => 1,
            Self::SmallInt => 2,
            Self::Integer | Self::Float | Self::Date => 4,
            Self::BigInt | Self::Double | Self::Timestamp | Self::Blob => 8,
            Self::Char(len) => len as usize,
            Self::VarChar(len) => len as usize + 2,
        }
    }

    /// Returns the SQL type code, or `None` for unknown fields.
    #[must_use]
    pub const fn sql_type(self) -> Option<u32> {
        let code = match self {
            Self::Unknown => return None,
            Self::Boolean => SQL_BOOLEAN,
            Self::SmallInt => SQL_SHORT,
            Self::Integer => SQL_LONG,
            Self::BigInt => SQL_INT64,
            Self::Float => SQL_FLOAT,
            Self::Double => SQL_DOUBLE,
            Self::Char(_) => SQL_TEXT,
            Self::VarChar(_) => SQL_VARYING,
            Self::Date => SQL_TYPE_DATE,
            Self::Timestamp => SQL_TIMESTAMP,
            Self::Blob => SQL_BLOB,
        };
        Some(code)
    }

    /// Returns the SQL length: the declared length for text types, the
    /// storage length otherwise.
    #[must_use]
    pub const fn sql_length(self) -> u32 {
        match self {
            Self::Char(len) | Self::VarChar(len) => len as u32,
            other => other.storage_len() as u32,
        }
    }

    /// Returns true for exact numeric types.
    #[must_use]
    pub const fn is_exact(self) -> bool {
        matches!(self, Self::SmallInt | Self::Integer | Self::BigInt)
    }

    /// Returns true for text types.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Char(_) | Self::VarChar(_))
    }
}

/// Descriptor of one field within a format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDesc {
    data_type: DataType,
    scale: i8,
    sub_type: i16,
    charset: CharSetId,
    offset: Option<usize>,
}

impl FieldDesc {
    /// Creates a descriptor of the given type with zero scale.
    ///
    /// The storage offset is assigned when the descriptor is placed in a
    /// [`Format`].
    #[must_use]
    pub const fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            scale: 0,
            sub_type: 0,
            charset: CharSetId::NONE,
            offset: None,
        }
    }

    /// Sets the decimal scale (negative = digits after the point).
    #[must_use]
    pub const fn with_scale(mut self, scale: i8) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the sub-type.
    #[must_use]
    pub const fn with_sub_type(mut self, sub_type: i16) -> Self {
        self.sub_type = sub_type;
        self
    }

    /// Sets the character set.
    #[must_use]
    pub const fn with_charset(mut self, charset: CharSetId) -> Self {
        self.charset = charset;
        self
    }

    /// Returns the data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the decimal scale.
    #[must_use]
    pub const fn scale(&self) -> i8 {
        self.scale
    }

    /// Returns the sub-type.
    #[must_use]
    pub const fn sub_type(&self) -> i16 {
        self.sub_type
    }

    /// Returns the character set.
    #[must_use]
    pub const fn charset(&self) -> CharSetId {
        self.charset
    }

    /// Returns the storage offset within the record image, if stored.
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Returns true if the field has a known type and storage.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        !matches!(self.data_type, DataType::Unknown) && self.offset.is_some()
    }
}

/// A record format: versioned list of field descriptors with computed layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    version: FormatVersion,
    fields: Vec<FieldDesc>,
    length: usize,
}

impl Format {
    /// Builds a format, assigning storage offsets to every known field.
    #[must_use]
    pub fn new(version: FormatVersion, fields: Vec<FieldDesc>) -> Self {
        let mut fields = fields;
        let mut offset = null_bitmap_len(fields.len());

        for desc in &mut fields {
            if desc.data_type == DataType::Unknown {
                desc.offset = None;
                continue;
            }
            desc.offset = Some(offset);
            offset += desc.data_type.storage_len();
        }

        Self {
            version,
            fields,
            length: offset,
        }
    }

    /// Returns the format version.
    #[must_use]
    pub const fn version(&self) -> FormatVersion {
        self.version
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the descriptor at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldDesc> {
        self.fields.get(index)
    }

    /// Returns all descriptors.
    #[must_use]
    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    /// Returns the size of the null bitmap in bytes.
    #[must_use]
    pub fn null_bitmap_len(&self) -> usize {
        null_bitmap_len(self.fields.len())
    }

    /// Returns the total record image length.
    #[must_use]
    pub const fn record_length(&self) -> usize {
        self.length
    }
}

fn null_bitmap_len(count: usize) -> usize {
    count.div_ceil(8)
}
