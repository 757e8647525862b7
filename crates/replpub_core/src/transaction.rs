//! Transaction state seen by the publisher.

use crate::error::{PublisherError, PublisherResult};
use crate::session::{ReplicatedTransaction, SessionSlot, TransactionInfo};
use crate::types::{AttachmentId, TransactionNumber};

/// Flags of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionFlags(u8);

impl TransactionFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Engine-internal transaction.
    pub const SYSTEM: Self = Self(0x01);
    /// Read-only transaction.
    pub const READ_ONLY: Self = Self(0x02);
    /// The transaction's changes are replicated.
    pub const REPLICATING: Self = Self(0x04);

    /// Returns true if all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the flags with `other` set or cleared.
    #[must_use]
    pub const fn with(self, other: Self, value: bool) -> Self {
        if value {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }
}

/// A savepoint on the transaction's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint {
    number: u32,
    pub(crate) replicated: bool,
}

impl Savepoint {
    /// Returns the savepoint number.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns true once the savepoint was announced to the replicator.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }
}

/// An active transaction.
///
/// Savepoints are strictly LIFO. The engine ends a savepoint only after the
/// publisher was told about it through
/// [`save_cleanup`](crate::publisher::save_cleanup).
#[derive(Debug)]
pub struct Transaction {
    number: TransactionNumber,
    attachment: AttachmentId,
    flags: TransactionFlags,
    /// Bottom to top.
    pub(crate) savepoints: Vec<Savepoint>,
    next_savepoint: u32,
    pub(crate) session: SessionSlot<dyn ReplicatedTransaction>,
}

impl Transaction {
    /// Creates a replicating user transaction.
    pub fn new(number: TransactionNumber, attachment: AttachmentId) -> Self {
        Self {
            number,
            attachment,
            flags: TransactionFlags::REPLICATING,
            savepoints: Vec::new(),
            next_savepoint: 1,
            session: SessionSlot::empty(),
        }
    }

    /// Replaces the transaction flags.
    #[must_use]
    pub fn with_flags(mut self, flags: TransactionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns the transaction number.
    #[must_use]
    pub fn number(&self) -> TransactionNumber {
        self.number
    }

    /// Returns the owning attachment.
    #[must_use]
    pub fn attachment(&self) -> AttachmentId {
        self.attachment
    }

    /// Returns the flags.
    #[must_use]
    pub fn flags(&self) -> TransactionFlags {
        self.flags
    }

    /// Returns true for engine-internal transactions.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.flags.contains(TransactionFlags::SYSTEM)
    }

    /// Returns true for read-only transactions.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(TransactionFlags::READ_ONLY)
    }

    /// Returns true if the transaction's changes are replicated.
    #[must_use]
    pub fn is_replicating(&self) -> bool {
        self.flags.contains(TransactionFlags::REPLICATING)
    }

    /// Returns true if a transaction session is active.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_active()
    }

    /// Pushes a new savepoint and returns its number.
    pub fn start_savepoint(&mut self) -> u32 {
        let number = self.next_savepoint;
        self.next_savepoint += 1;
        self.savepoints.push(Savepoint {
            number,
            replicated: false,
        });
        number
    }

    /// Pops the innermost savepoint.
    pub fn end_savepoint(&mut self) -> PublisherResult<Savepoint> {
        self.savepoints
            .pop()
            .ok_or_else(|| PublisherError::invalid_operation("no active savepoint"))
    }

    /// Returns the innermost savepoint.
    #[must_use]
    pub fn top_savepoint(&self) -> Option<&Savepoint> {
        self.savepoints.last()
    }

    /// Returns the savepoint stack, bottom first.
    #[must_use]
    pub fn savepoints(&self) -> &[Savepoint] {
        &self.savepoints
    }

    /// Returns the details handed to a new transaction session.
    #[must_use]
    pub fn info(&self) -> TransactionInfo {
        TransactionInfo {
            number: self.number,
            attachment: self.attachment,
        }
    }
}
