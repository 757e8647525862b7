//! Downstream replicator sessions.
//!
//! A replicator is reached through two session kinds: a
//! [`ReplicatedSession`] per attachment and a [`ReplicatedTransaction`] per
//! transaction. Every call returns a plain success flag; failure details are
//! left in the attachment session's [`Status`].
//!
//! Sessions are held in a [`SessionSlot`], which disposes the session
//! exactly once, whether explicitly or on drop.

mod builtin;

pub use builtin::{BuiltinSession, BuiltinTransaction};

use crate::database::ReplicationDatabase;
use crate::record::ReplicatedRecord;
use crate::status::Status;
use crate::types::{AttachmentId, CharSetId, TransactionNumber};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Explicit end-of-life hook for a session.
pub trait Disposable {
    /// Releases the session. The default simply drops it.
    fn dispose(self: Box<Self>) {}
}

/// Attachment-level replicator session.
pub trait ReplicatedSession: Disposable + Send {
    /// Binds the session to the attachment that owns it.
    fn bind_attachment(&mut self, info: &AttachmentInfo) -> bool;

    /// Starts a transaction session. `None` means the replicator refused.
    fn start_transaction(&mut self, info: &TransactionInfo)
        -> Option<Box<dyn ReplicatedTransaction>>;

    /// Forgets a dead transaction; [`TransactionNumber::ALL_STALE`] asks
    /// for every stale transaction.
    fn cleanup_transaction(&mut self, number: TransactionNumber) -> bool;

    /// Replicates a new sequence value.
    fn set_sequence(&mut self, name: &str, value: i64) -> bool;

    /// Returns the status left by the last call.
    fn status(&self) -> Status;

    /// Clears the status.
    fn reset_status(&mut self);
}

/// Transaction-level replicator session.
pub trait ReplicatedTransaction: Disposable + Send {
    /// First phase of a two-phase commit.
    fn prepare(&mut self) -> bool;

    /// Commits the transaction.
    fn commit(&mut self) -> bool;

    /// Rolls the transaction back.
    fn rollback(&mut self) -> bool;

    /// Opens a savepoint.
    fn start_savepoint(&mut self) -> bool;

    /// Releases the innermost savepoint.
    fn release_savepoint(&mut self) -> bool;

    /// Rolls back the innermost savepoint.
    fn rollback_savepoint(&mut self) -> bool;

    /// Replicates an inserted row.
    fn insert_record(&mut self, table: &str, record: &ReplicatedRecord<'_>) -> bool;

    /// Replicates an updated row.
    fn update_record(
        &mut self,
        table: &str,
        old: &ReplicatedRecord<'_>,
        new: &ReplicatedRecord<'_>,
    ) -> bool;

    /// Replicates a deleted row.
    fn delete_record(&mut self, table: &str, record: &ReplicatedRecord<'_>) -> bool;

    /// Replicates a SQL statement written in `charset`.
    fn execute_sql(&mut self, charset: CharSetId, sql: &str) -> bool;
}

/// Attachment details passed to [`ReplicatedSession::bind_attachment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// Attachment identifier.
    pub id: AttachmentId,
    /// User the attachment is connected as.
    pub user_name: String,
    /// Attachment character set.
    pub charset: CharSetId,
}

/// Transaction details passed to [`ReplicatedSession::start_transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Transaction number.
    pub number: TransactionNumber,
    /// Owning attachment.
    pub attachment: AttachmentId,
}

/// Optional, exclusively owned session handle.
///
/// Disposal is idempotent and also happens on drop.
pub struct SessionSlot<S: ?Sized + Disposable> {
    session: Option<Box<S>>,
}

impl<S: ?Sized + Disposable> SessionSlot<S> {
    /// Creates an empty slot.
    #[must_use]
    pub fn empty() -> Self {
        Self { session: None }
    }

    /// Installs a session, disposing any previous one.
    pub fn install(&mut self, session: Box<S>) {
        self.dispose();
        self.session = Some(session);
    }

    /// Returns the session, if any.
    #[must_use]
    pub fn get(&self) -> Option<&S> {
        self.session.as_deref()
    }

    /// Returns the session mutably, if any.
    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.session.as_deref_mut()
    }

    /// Returns true if a session is installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Disposes and clears the session. No-op when empty.
    pub fn dispose(&mut self) {
        if let Some(session) = self.session.take() {
            session.dispose();
        }
    }
}

impl<S: ?Sized + Disposable> Default for SessionSlot<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: ?Sized + Disposable> Drop for SessionSlot<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: ?Sized + Disposable> fmt::Debug for SessionSlot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Source of attachment sessions for an external replicator.
pub trait SessionFactory: Send + Sync {
    /// Creates a session for an attachment of `database`.
    fn create(&self, database: &ReplicationDatabase) -> Option<Box<dyn ReplicatedSession>>;
}

impl<F> SessionFactory for F
where
    F: Fn(&ReplicationDatabase) -> Option<Box<dyn ReplicatedSession>> + Send + Sync,
{
    fn create(&self, database: &ReplicationDatabase) -> Option<Box<dyn ReplicatedSession>> {
        self(database)
    }
}

/// Named session factories of the installed replicator plugins.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn SessionFactory>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin, replacing any plugin of the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: impl SessionFactory + 'static) {
        self.plugins.insert(name.into(), Arc::new(factory));
    }

    /// Registers a plugin (builder form).
    #[must_use]
    pub fn with_plugin(
        mut self,
        name: impl Into<String>,
        factory: impl SessionFactory + 'static,
    ) -> Self {
        self.register(name, factory);
        self
    }

    /// Looks up a plugin by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SessionFactory>> {
        self.plugins.get(name).cloned()
    }

    /// Returns true if no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.plugins.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry")
            .field("plugins", &names)
            .finish()
    }
}
