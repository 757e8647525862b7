//! Logical change operations produced by the built-in session.
//!
//! Field values are owned snapshots of the reflected record, so a change can
//! outlive the capture call that produced it.

use crate::record::{ReplicatedField, ReplicatedRecord};
use crate::types::{AttachmentId, CharSetId, TransactionNumber};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

/// Owned snapshot of one replicated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    /// Field position in the record format.
    pub index: usize,
    /// Field name, if known.
    pub name: Option<String>,
    /// SQL type code.
    pub sql_type: u32,
    /// SQL sub-type.
    pub sub_type: i16,
    /// Decimal scale.
    pub scale: i8,
    /// SQL length.
    pub length: u32,
    /// Character set.
    pub charset: CharSetId,
    /// Raw value bytes, `None` when null.
    pub data: Option<Bytes>,
}

impl From<ReplicatedField<'_>> for FieldValue {
    fn from(field: ReplicatedField<'_>) -> Self {
        Self {
            index: field.index(),
            name: field.name().map(str::to_string),
            sql_type: field.sql_type(),
            sub_type: field.sub_type(),
            scale: field.scale(),
            length: field.length(),
            charset: field.charset(),
            data: field.data().map(Bytes::copy_from_slice),
        }
    }
}

/// Owned snapshot of a replicated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowImage {
    /// Reflected fields; fields without a known type are omitted.
    pub fields: Vec<FieldValue>,
    /// Raw record image.
    pub raw: Bytes,
}

impl RowImage {
    /// Takes a snapshot of a reflected record.
    pub fn capture(record: &ReplicatedRecord<'_>) -> Self {
        Self {
            fields: record.fields().map(FieldValue::from).collect(),
            raw: Bytes::copy_from_slice(record.raw_data()),
        }
    }

    /// Returns the field at `index`, if it was reflected.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.index == index)
    }

    fn size(&self) -> usize {
        self.raw.len()
            + self
                .fields
                .iter()
                .map(|f| f.data.as_ref().map_or(0, Bytes::len))
                .sum::<usize>()
    }
}

/// One logical operation of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChangeOp {
    /// A savepoint was started.
    StartSavepoint,
    /// The innermost savepoint was released.
    ReleaseSavepoint,
    /// The innermost savepoint was rolled back.
    RollbackSavepoint,
    /// A row was inserted.
    Insert {
        /// Table name.
        table: String,
        /// New row.
        record: RowImage,
    },
    /// A row was updated.
    Update {
        /// Table name.
        table: String,
        /// Row before the update.
        old: RowImage,
        /// Row after the update.
        new: RowImage,
    },
    /// A row was deleted.
    Delete {
        /// Table name.
        table: String,
        /// Deleted row.
        record: RowImage,
    },
    /// A sequence was set.
    SetSequence {
        /// Sequence name.
        name: String,
        /// New value.
        value: i64,
    },
    /// A replicated SQL statement.
    ExecuteSql {
        /// Character set of the statement text.
        charset: CharSetId,
        /// User that executed the statement.
        owner: String,
        /// Statement text.
        sql: String,
    },
    /// The transaction was prepared.
    Prepare,
    /// The transaction committed.
    Commit,
    /// The transaction rolled back.
    Rollback,
    /// A dead transaction should be forgotten.
    Cleanup,
}

impl ChangeOp {
    /// Returns the approximate buffered size of the operation in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        // tag
        let header = 1;
        header
            + match self {
                Self::Insert { table, record } | Self::Delete { table, record } => {
                    table.len() + record.size()
                }
                Self::Update { table, old, new } => table.len() + old.size() + new.size(),
                Self::SetSequence { name, .. } => name.len() + 8,
                Self::ExecuteSql { owner, sql, .. } => 1 + owner.len() + sql.len(),
                _ => 0,
            }
    }

    /// Returns true for operations that end a transaction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Commit | Self::Rollback | Self::Cleanup)
    }
}

/// A batch of operations handed to the replication manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeBlock {
    /// Sequence number assigned by the manager (0 until flushed).
    pub sequence: u64,
    /// Log segment the block was written to (0 until flushed).
    pub segment: u64,
    /// Database identifier.
    pub database: Uuid,
    /// Attachment that produced the block.
    pub attachment: AttachmentId,
    /// Transaction the operations belong to; `None` for changes made
    /// outside any transaction, such as sequence values.
    pub transaction: Option<TransactionNumber>,
    /// User name of the attachment.
    pub user: String,
    /// Operations in capture order.
    pub ops: Vec<ChangeOp>,
}

impl ChangeBlock {
    /// Creates an unflushed block.
    pub fn new(
        database: Uuid,
        attachment: AttachmentId,
        transaction: Option<TransactionNumber>,
        user: impl Into<String>,
        ops: Vec<ChangeOp>,
    ) -> Self {
        Self {
            sequence: 0,
            segment: 0,
            database,
            attachment,
            transaction,
            user: user.into(),
            ops,
        }
    }

    /// Returns the approximate size of the block's operations.
    #[must_use]
    pub fn size(&self) -> usize {
        self.ops.iter().map(ChangeOp::size).sum()
    }
}
