//! Recording replicator with failure injection.
//!
//! [`Recorder`] is the shared journal; [`RecordingSession`] and
//! [`RecordingTransaction`] are the sessions handed to the publisher. Every
//! call is journaled, whether it succeeds or not, so tests can assert on
//! exactly what reached the replicator.

use parking_lot::Mutex;
use replpub_core::session::{
    Disposable, ReplicatedSession, ReplicatedTransaction, SessionFactory,
};
use replpub_core::{
    AttachmentId, AttachmentInfo, CharSetId, ReplicationDatabase, RowImage, Status,
    TransactionInfo, TransactionNumber,
};
use replpub_core::record::ReplicatedRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// Kind of replicator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `bind_attachment`
    BindAttachment,
    /// `start_transaction`
    StartTransaction,
    /// `cleanup_transaction`
    CleanupTransaction,
    /// `set_sequence`
    SetSequence,
    /// `prepare`
    Prepare,
    /// `commit`
    Commit,
    /// `rollback`
    Rollback,
    /// `start_savepoint`
    StartSavepoint,
    /// `release_savepoint`
    ReleaseSavepoint,
    /// `rollback_savepoint`
    RollbackSavepoint,
    /// `insert_record`
    Insert,
    /// `update_record`
    Update,
    /// `delete_record`
    Delete,
    /// `execute_sql`
    ExecuteSql,
}

/// One journaled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Session bound to an attachment.
    BindAttachment(AttachmentId),
    /// Transaction session requested.
    StartTransaction(TransactionNumber),
    /// Transaction cleanup requested.
    CleanupTransaction(TransactionNumber),
    /// Sequence value replicated.
    SetSequence {
        /// Sequence name.
        name: String,
        /// New value.
        value: i64,
    },
    /// Transaction prepared.
    Prepare(TransactionNumber),
    /// Transaction committed.
    Commit(TransactionNumber),
    /// Transaction rolled back.
    Rollback(TransactionNumber),
    /// Savepoint started.
    StartSavepoint(TransactionNumber),
    /// Savepoint released.
    ReleaseSavepoint(TransactionNumber),
    /// Savepoint rolled back.
    RollbackSavepoint(TransactionNumber),
    /// Row inserted.
    Insert {
        /// Table name.
        table: String,
        /// Row snapshot.
        record: RowImage,
    },
    /// Row updated.
    Update {
        /// Table name.
        table: String,
        /// Row before.
        old: RowImage,
        /// Row after.
        new: RowImage,
    },
    /// Row deleted.
    Delete {
        /// Table name.
        table: String,
        /// Row snapshot.
        record: RowImage,
    },
    /// SQL statement replicated.
    ExecuteSql {
        /// Statement charset.
        charset: CharSetId,
        /// Statement text.
        sql: String,
    },
}

impl Call {
    /// Returns the kind of call.
    pub fn operation(&self) -> Operation {
        match self {
            Self::BindAttachment(_) => Operation::BindAttachment,
            Self::StartTransaction(_) => Operation::StartTransaction,
            Self::CleanupTransaction(_) => Operation::CleanupTransaction,
            Self::SetSequence { .. } => Operation::SetSequence,
            Self::Prepare(_) => Operation::Prepare,
            Self::Commit(_) => Operation::Commit,
            Self::Rollback(_) => Operation::Rollback,
            Self::StartSavepoint(_) => Operation::StartSavepoint,
            Self::ReleaseSavepoint(_) => Operation::ReleaseSavepoint,
            Self::RollbackSavepoint(_) => Operation::RollbackSavepoint,
            Self::Insert { .. } => Operation::Insert,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
            Self::ExecuteSql { .. } => Operation::ExecuteSql,
        }
    }
}

/// When an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailRule {
    Always,
    /// Fires on the given 1-based call of the operation.
    Nth(usize),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    counts: HashMap<Operation, usize>,
    failures: HashMap<Operation, FailRule>,
    warnings: HashMap<Operation, String>,
    status: Status,
    sessions_created: usize,
    sessions_disposed: usize,
    transactions_disposed: Vec<TransactionNumber>,
}

impl State {
    /// Journals a call and returns whether it succeeds.
    fn record(&mut self, call: Call) -> bool {
        let operation = call.operation();
        self.calls.push(call);

        let count = self.counts.entry(operation).or_insert(0);
        *count += 1;
        let nth = *count;

        if let Some(message) = self.warnings.get(&operation) {
            self.status.push_warning(message.clone());
        }

        let fails = match self.failures.get(&operation) {
            Some(FailRule::Always) => true,
            Some(FailRule::Nth(n)) => *n == nth,
            None => false,
        };
        if fails {
            self.status
                .push_error(format!("injected {operation:?} failure (call {nth})"));
        }
        !fails
    }
}

/// Shared journal of a recording replicator.
///
/// Clones share the same journal.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
}

impl Recorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new attachment session journaling into this recorder.
    pub fn session(&self) -> Box<RecordingSession> {
        self.state.lock().sessions_created += 1;
        Box::new(RecordingSession {
            recorder: self.clone(),
        })
    }

    /// Returns a plugin factory producing recording sessions.
    pub fn factory(&self) -> impl SessionFactory + 'static {
        let recorder = self.clone();
        move |_: &ReplicationDatabase| -> Option<Box<dyn ReplicatedSession>> {
            Some(recorder.session())
        }
    }

    /// Makes every call of `operation` fail.
    pub fn fail(&self, operation: Operation) {
        self.state.lock().failures.insert(operation, FailRule::Always);
    }

    /// Makes the `nth` (1-based, counted from now on) call of `operation`
    /// fail.
    pub fn fail_nth(&self, operation: Operation, nth: usize) {
        let mut state = self.state.lock();
        let seen = state.counts.get(&operation).copied().unwrap_or(0);
        state.failures.insert(operation, FailRule::Nth(seen + nth));
    }

    /// Makes the next call of `operation` fail.
    pub fn fail_once(&self, operation: Operation) {
        self.fail_nth(operation, 1);
    }

    /// Leaves a warning in the status whenever `operation` is called.
    pub fn warn(&self, operation: Operation, message: impl Into<String>) {
        self.state.lock().warnings.insert(operation, message.into());
    }

    /// Removes every injected failure and warning.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.failures.clear();
        state.warnings.clear();
    }

    /// Returns every journaled call.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Returns the journaled kinds of call, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().calls.iter().map(Call::operation).collect()
    }

    /// Returns how many times `operation` was called.
    pub fn count(&self, operation: Operation) -> usize {
        self.state.lock().counts.get(&operation).copied().unwrap_or(0)
    }

    /// Returns the total number of journaled calls.
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Clears the journal (failures stay armed).
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.counts.clear();
    }

    /// Returns the current status.
    pub fn status(&self) -> Status {
        self.state.lock().status.clone()
    }

    /// Returns the number of attachment sessions created.
    pub fn sessions_created(&self) -> usize {
        self.state.lock().sessions_created
    }

    /// Returns the number of attachment sessions disposed.
    pub fn sessions_disposed(&self) -> usize {
        self.state.lock().sessions_disposed
    }

    /// Returns the transactions whose sessions were disposed, in order.
    pub fn transactions_disposed(&self) -> Vec<TransactionNumber> {
        self.state.lock().transactions_disposed.clone()
    }

    fn record(&self, call: Call) -> bool {
        self.state.lock().record(call)
    }
}

/// Attachment session journaling into a [`Recorder`].
#[derive(Debug)]
pub struct RecordingSession {
    recorder: Recorder,
}

impl Disposable for RecordingSession {
    fn dispose(self: Box<Self>) {
        self.recorder.state.lock().sessions_disposed += 1;
    }
}

impl ReplicatedSession for RecordingSession {
    fn bind_attachment(&mut self, info: &AttachmentInfo) -> bool {
        self.recorder.record(Call::BindAttachment(info.id))
    }

    fn start_transaction(
        &mut self,
        info: &TransactionInfo,
    ) -> Option<Box<dyn ReplicatedTransaction>> {
        if !self.recorder.record(Call::StartTransaction(info.number)) {
            return None;
        }
        Some(Box::new(RecordingTransaction {
            number: info.number,
            recorder: self.recorder.clone(),
        }))
    }

    fn cleanup_transaction(&mut self, number: TransactionNumber) -> bool {
        self.recorder.record(Call::CleanupTransaction(number))
    }

    fn set_sequence(&mut self, name: &str, value: i64) -> bool {
        self.recorder.record(Call::SetSequence {
            name: name.to_string(),
            value,
        })
    }

    fn status(&self) -> Status {
        self.recorder.status()
    }

    fn reset_status(&mut self) {
        self.recorder.state.lock().status.init();
    }
}

/// Transaction session journaling into a [`Recorder`].
#[derive(Debug)]
pub struct RecordingTransaction {
    number: TransactionNumber,
    recorder: Recorder,
}

impl Disposable for RecordingTransaction {
    fn dispose(self: Box<Self>) {
        self.recorder
            .state
            .lock()
            .transactions_disposed
            .push(self.number);
    }
}

impl ReplicatedTransaction for RecordingTransaction {
    fn prepare(&mut self) -> bool {
        self.recorder.record(Call::Prepare(self.number))
    }

    fn commit(&mut self) -> bool {
        self.recorder.record(Call::Commit(self.number))
    }

    fn rollback(&mut self) -> bool {
        self.recorder.record(Call::Rollback(self.number))
    }

    fn start_savepoint(&mut self) -> bool {
        self.recorder.record(Call::StartSavepoint(self.number))
    }

    fn release_savepoint(&mut self) -> bool {
        self.recorder.record(Call::ReleaseSavepoint(self.number))
    }

    fn rollback_savepoint(&mut self) -> bool {
        self.recorder.record(Call::RollbackSavepoint(self.number))
    }

    fn insert_record(&mut self, table: &str, record: &ReplicatedRecord<'_>) -> bool {
        self.recorder.record(Call::Insert {
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
        self.recorder.record(Call::Update {
            table: table.to_string(),
            old: RowImage::capture(old),
            new: RowImage::capture(new),
        })
    }

    fn delete_record(&mut self, table: &str, record: &ReplicatedRecord<'_>) -> bool {
        self.recorder.record(Call::Delete {
            table: table.to_string(),
            record: RowImage::capture(record),
        })
    }

    fn execute_sql(&mut self, charset: CharSetId, sql: &str) -> bool {
        self.recorder.record(Call::ExecuteSql {
            charset,
            sql: sql.to_string(),
        })
    }
}
