//! Built-in replicator session.
//!
//! Buffers each transaction's operations and hands them to the database's
//! [`ReplicationManager`] as change blocks. A block is flushed when the
//! buffer exceeds the configured size and at prepare/commit. A rollback
//! whose operations never left the buffer is dropped silently.

use super::{
    AttachmentInfo, Disposable, ReplicatedSession, ReplicatedTransaction, TransactionInfo,
};
use crate::change::{ChangeBlock, ChangeOp, RowImage};
use crate::manager::ReplicationManager;
use crate::record::ReplicatedRecord;
use crate::status::{SharedStatus, Status};
use crate::types::{AttachmentId, CharSetId, TransactionNumber};
use std::sync::Arc;
use uuid::Uuid;

/// Attachment session writing to the replication manager.
pub struct BuiltinSession {
    manager: Arc<ReplicationManager>,
    database: Uuid,
    attachment: AttachmentInfo,
    status: SharedStatus,
    buffer_size: usize,
}

impl BuiltinSession {
    /// Creates a session for `database` connected as `user_name`.
    pub fn new(
        manager: Arc<ReplicationManager>,
        database: Uuid,
        user_name: impl Into<String>,
        buffer_size: usize,
    ) -> Self {
        Self {
            manager,
            database,
            attachment: AttachmentInfo {
                id: AttachmentId::default(),
                user_name: user_name.into(),
                charset: CharSetId::NONE,
            },
            status: SharedStatus::new(),
            buffer_size,
        }
    }

    fn flush_standalone(&self, transaction: Option<TransactionNumber>, op: ChangeOp) -> bool {
        let block = ChangeBlock::new(
            self.database,
            self.attachment.id,
            transaction,
            self.attachment.user_name.clone(),
            vec![op],
        );
        match self.manager.flush(block) {
            Ok(_) => true,
            Err(e) => self.status.fail(e.to_string()),
        }
    }
}

impl Disposable for BuiltinSession {}

impl ReplicatedSession for BuiltinSession {
    fn bind_attachment(&mut self, info: &AttachmentInfo) -> bool {
        self.attachment = info.clone();
        true
    }

    fn start_transaction(
        &mut self,
        info: &TransactionInfo,
    ) -> Option<Box<dyn ReplicatedTransaction>> {
        Some(Box::new(BuiltinTransaction {
            manager: Arc::clone(&self.manager),
            database: self.database,
            attachment: info.attachment,
            user_name: self.attachment.user_name.clone(),
            number: info.number,
            status: self.status.clone(),
            buffer_size: self.buffer_size,
            ops: Vec::new(),
            buffered: 0,
            flushed: false,
        }))
    }

    fn cleanup_transaction(&mut self, number: TransactionNumber) -> bool {
        self.flush_standalone(Some(number), ChangeOp::Cleanup)
    }

    fn set_sequence(&mut self, name: &str, value: i64) -> bool {
        self.flush_standalone(
            None,
            ChangeOp::SetSequence {
                name: name.to_string(),
                value,
            },
        )
    }

    fn status(&self) -> Status {
        self.status.snapshot()
    }

    fn reset_status(&mut self) {
        self.status.init();
    }
}

/// Transaction session buffering operations for one transaction.
pub struct BuiltinTransaction {
    manager: Arc<ReplicationManager>,
    database: Uuid,
    attachment: AttachmentId,
    user_name: String,
    number: TransactionNumber,
    status: SharedStatus,
    buffer_size: usize,
    ops: Vec<ChangeOp>,
    buffered: usize,
    /// Set once any block of this transaction reached the manager.
    flushed: bool,
}

impl BuiltinTransaction {
    /// Returns the number of buffered, unflushed operations.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.ops.len()
    }

    fn push(&mut self, op: ChangeOp) -> bool {
        self.buffered += op.size();
        self.ops.push(op);
        if self.buffered > self.buffer_size {
            return self.flush();
        }
        true
    }

    fn flush(&mut self) -> bool {
        if self.ops.is_empty() {
            return true;
        }

        let block = ChangeBlock::new(
            self.database,
            self.attachment,
            Some(self.number),
            self.user_name.clone(),
            std::mem::take(&mut self.ops),
        );
        self.buffered = 0;

        match self.manager.flush(block) {
            Ok(_) => {
                self.flushed = true;
                true
            }
            Err(e) => self.status.fail(e.to_string()),
        }
    }
}

impl Disposable for BuiltinTransaction {}

impl ReplicatedTransaction for BuiltinTransaction {
    fn prepare(&mut self) -> bool {
        self.push(ChangeOp::Prepare) && self.flush()
    }

    fn commit(&mut self) -> bool {
        self.push(ChangeOp::Commit) && self.flush()
    }

    fn rollback(&mut self) -> bool {
        if !self.flushed {
            self.ops.clear();
            self.buffered = 0;
            return true;
        }
        self.push(ChangeOp::Rollback) && self.flush()
    }

    fn start_savepoint(&mut self) -> bool {
        self.push(ChangeOp::StartSavepoint)
    }

    fn release_savepoint(&mut self) -> bool {
        self.push(ChangeOp::ReleaseSavepoint)
    }

    fn rollback_savepoint(&mut self) -> bool {
        self.push(ChangeOp::RollbackSavepoint)
    }

    fn insert_record(&mut self, table: &str, record: &ReplicatedRecord<'_>) -> bool {
        self.push(ChangeOp::Insert {
            table: table.to_string(),
            record: RowImage::capture(record),
        })
    }

    fn update_record(
        &mut self,
        table: &str,
        old: &ReplicatedRecord<'_>,
        new: &ReplicatedRecord<'_>,
    ) -> bool {
        self.push(ChangeOp::Update {
            table: table.to_string(),
            old: RowImage::capture(old),
            new: RowImage::capture(new),
        })
    }

    fn delete_record(&mut self, table: &str, record: &ReplicatedRecord<'_>) -> bool {
        self.push(ChangeOp::Delete {
            table: table.to_string(),
            record: RowImage::capture(record),
        })
    }

    fn execute_sql(&mut self, charset: CharSetId, sql: &str) -> bool {
        self.push(ChangeOp::ExecuteSql {
            charset,
            owner: self.user_name.clone(),
            sql: sql.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(manager: &Arc<ReplicationManager>, buffer_size: usize) -> BuiltinSession {
        let mut session = BuiltinSession::new(Arc::clone(manager), Uuid::nil(), "SYSDBA", buffer_size);
        assert!(session.bind_attachment(&AttachmentInfo {
            id: AttachmentId::new(3),
            user_name: "SYSDBA".into(),
            charset: CharSetId::UTF8,
        }));
        session
    }

    fn info(number: u64) -> TransactionInfo {
        TransactionInfo {
            number: TransactionNumber::new(number),
            attachment: AttachmentId::new(3),
        }
    }

    #[test]
    fn commit_flushes_one_block() {
        let manager = Arc::new(ReplicationManager::new());
        let mut session = session(&manager, 1024);
        let mut txn = session.start_transaction(&info(42)).unwrap();

        assert!(txn.start_savepoint());
        assert!(txn.execute_sql(CharSetId::UTF8, "CREATE TABLE T (ID INT)"));
        assert_eq!(manager.history_len(), 0);
        assert!(txn.commit());

        let blocks = manager.poll(0, 10);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].transaction, Some(TransactionNumber::new(42)));
        assert_eq!(blocks[0].attachment, AttachmentId::new(3));
        assert_eq!(
            blocks[0].ops,
            vec![
                ChangeOp::StartSavepoint,
                ChangeOp::ExecuteSql {
                    charset: CharSetId::UTF8,
                    owner: "SYSDBA".into(),
                    sql: "CREATE TABLE T (ID INT)".into(),
                },
                ChangeOp::Commit,
            ]
        );
    }

    #[test]
    fn unflushed_rollback_is_discarded() {
        let manager = Arc::new(ReplicationManager::new());
        let mut session = session(&manager, 1024);
        let mut txn = session.start_transaction(&info(1)).unwrap();

        assert!(txn.start_savepoint());
        assert!(txn.rollback());
        assert_eq!(manager.history_len(), 0);
    }

    #[test]
    fn buffer_overflow_flushes_early() {
        let manager = Arc::new(ReplicationManager::new());
        let mut session = session(&manager, 8);
        let mut txn = session.start_transaction(&info(1)).unwrap();

        assert!(txn.execute_sql(CharSetId::UTF8, "DELETE FROM T"));
        assert_eq!(manager.history_len(), 1);

        assert!(txn.rollback());
        let blocks = manager.poll(0, 10);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].ops, vec![ChangeOp::Rollback]);
    }

    #[test]
    fn standalone_blocks() {
        let manager = Arc::new(ReplicationManager::new());
        let mut session = session(&manager, 1024);

        assert!(session.cleanup_transaction(TransactionNumber::ALL_STALE));
        assert!(session.set_sequence("GEN_ID", 5));

        let blocks = manager.poll(0, 10);
        assert_eq!(blocks[0].ops, vec![ChangeOp::Cleanup]);
        assert_eq!(blocks[0].transaction, Some(TransactionNumber::ALL_STALE));
        assert_eq!(blocks[1].transaction, None);
        assert_eq!(
            blocks[1].ops,
            vec![ChangeOp::SetSequence {
                name: "GEN_ID".into(),
                value: 5
            }]
        );
    }

    #[test]
    fn manager_failure_lands_in_shared_status() {
        let manager = Arc::new(ReplicationManager::new());
        let mut session = session(&manager, 1024);
        let mut txn = session.start_transaction(&info(1)).unwrap();
        manager.shutdown();

        assert!(txn.start_savepoint());
        assert!(!txn.commit());
        assert!(session.status().has_errors());

        session.reset_status();
        assert!(session.status().is_clean());
    }
}
