//! Change capture entry points called by the storage engine.
//!
//! Every entry point first checks whether the change qualifies for
//! replication and returns `Ok(())` without side effects when it does not.
//! Replication failures go through the error policy; only
//! [`store`], [`modify`], [`erase`], [`exec_sql`], [`trans_prepare`] and
//! [`save_cleanup`] can return them, and only when the configuration asks
//! for errors to be reported. Record conversion errors are always returned.
//!
//! # Usage
//!
//! ```rust,ignore
//! let worker = WorkerState::new();
//! let mut ctx = CaptureContext::new(&database, &mut attachment, &worker);
//!
//! publisher::attach(&mut ctx, false)?;
//! publisher::store(&mut ctx, &relation, &record, &mut transaction)?;
//! publisher::trans_commit(&mut ctx, &mut transaction);
//! publisher::detach(&mut ctx);
//! ```

mod policy;
mod savepoint;
mod session;

pub use policy::STOP_MESSAGE;

use crate::context::CaptureContext;
use crate::database::ReplicationDatabase;
use crate::error::PublisherResult;
use crate::filter::TableMatcher;
use crate::record::{upgrade, Record, ReplicatedRecord};
use crate::relation::Relation;
use crate::sequence;
use crate::session::ReplicatedTransaction;
use crate::transaction::{Savepoint, Transaction};
use crate::types::{SequenceId, TransactionNumber};
use policy::{handle_error, handle_terminal_error};
use savepoint::ensure_savepoints;
use session::{attachment_session, transaction_session};

/// How the innermost savepoint ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavepointAction {
    /// The savepoint's changes are kept.
    Release,
    /// The savepoint's changes are undone.
    Rollback,
}

/// Prepares an attachment for replication.
///
/// Installs the table matcher built from the configured filters. With
/// `cleanup_transactions`, the replication session is created right away
/// and asked to clean up every stale transaction.
pub fn attach(ctx: &mut CaptureContext<'_>, cleanup_transactions: bool) -> PublisherResult<()> {
    let database = ctx.database;
    let Some(config) = database.config() else {
        return Ok(());
    };

    let matcher = TableMatcher::new(&config.include_filter, &config.exclude_filter)?;
    ctx.attachment.filter = Some(Box::new(matcher));

    if cleanup_transactions {
        attachment_session(ctx, true);
    }
    Ok(())
}

/// Releases the attachment's replication state.
pub fn detach(ctx: &mut CaptureContext<'_>) {
    let attachment = &mut *ctx.attachment;
    attachment.session.dispose();
    attachment.filter = None;
    attachment.sequences.clear();
}

/// Captures an inserted row.
pub fn store(
    ctx: &mut CaptureContext<'_>,
    relation: &Relation,
    record: &Record,
    transaction: &mut Transaction,
) -> PublisherResult<()> {
    if !captures(ctx, relation) || !transaction_session(ctx, transaction)? {
        return Ok(());
    }

    let record = upgrade(relation, record)?;

    let worker = ctx.worker;
    let _guard = worker.enter_replication();

    if !ensure_savepoints(ctx, transaction)? {
        return Ok(());
    }

    let image = ReplicatedRecord::new(relation, &record);
    replicate(ctx, transaction, |session| {
        session.insert_record(relation.name(), &image)
    })
}

/// Captures an updated row. Updates that leave the row image unchanged
/// are not replicated.
pub fn modify(
    ctx: &mut CaptureContext<'_>,
    relation: &Relation,
    old: &Record,
    new: &Record,
    transaction: &mut Transaction,
) -> PublisherResult<()> {
    if !captures(ctx, relation) || !transaction_session(ctx, transaction)? {
        return Ok(());
    }

    let new = upgrade(relation, new)?;
    let old = upgrade(relation, old)?;

    if old.length() == new.length() && old.data() == new.data() {
        return Ok(());
    }

    let worker = ctx.worker;
    let _guard = worker.enter_replication();

    if !ensure_savepoints(ctx, transaction)? {
        return Ok(());
    }

    let old_image = ReplicatedRecord::new(relation, &old);
    let new_image = ReplicatedRecord::new(relation, &new);
    replicate(ctx, transaction, |session| {
        session.update_record(relation.name(), &old_image, &new_image)
    })
}

/// Captures a deleted row.
pub fn erase(
    ctx: &mut CaptureContext<'_>,
    relation: &Relation,
    record: &Record,
    transaction: &mut Transaction,
) -> PublisherResult<()> {
    if !captures(ctx, relation) || !transaction_session(ctx, transaction)? {
        return Ok(());
    }

    let record = upgrade(relation, record)?;

    let worker = ctx.worker;
    let _guard = worker.enter_replication();

    if !ensure_savepoints(ctx, transaction)? {
        return Ok(());
    }

    let image = ReplicatedRecord::new(relation, &record);
    replicate(ctx, transaction, |session| {
        session.delete_record(relation.name(), &image)
    })
}

/// Captures a new sequence value.
///
/// Engine-owned sequences are ignored, except the backup history sequence.
/// Failures are never returned.
pub fn gen_id(ctx: &mut CaptureContext<'_>, id: SequenceId, value: i64) {
    if ctx.capture_suppressed() || !sequence::is_replicable(id) {
        return;
    }

    if !attachment_session(ctx, false) {
        return;
    }

    let database = ctx.database;
    let name = match ctx.attachment.sequences.get(&id) {
        Some(name) => name.clone(),
        None => {
            let Some(name) = database.catalog().sequence_name(id) else {
                tracing::debug!(sequence = %id, "sequence name not found, change not replicated");
                return;
            };
            ctx.attachment.sequences.insert(id, name.clone());
            name
        }
    };

    let worker = ctx.worker;
    let _guard = worker.enter_replication();

    let replicated = ctx
        .attachment
        .session
        .get_mut()
        .map_or(true, |session| session.set_sequence(&name, value));
    if !replicated {
        handle_terminal_error(ctx, None);
    }
}

/// Captures a replicated SQL statement.
///
/// The caller must already hold the recursion guard
/// ([`WorkerState::enter_replication`](crate::WorkerState::enter_replication)).
pub fn exec_sql(
    ctx: &mut CaptureContext<'_>,
    transaction: &mut Transaction,
    sql: &str,
) -> PublisherResult<()> {
    debug_assert!(
        ctx.worker.is_replicating(),
        "exec_sql called without the recursion guard"
    );

    if ctx.worker.is_defer_suppressed() || !transaction_session(ctx, transaction)? {
        return Ok(());
    }

    if !ensure_savepoints(ctx, transaction)? {
        return Ok(());
    }

    let charset = ctx.attachment.charset();
    replicate(ctx, transaction, |session| session.execute_sql(charset, sql))
}

/// First phase of a two-phase commit.
///
/// Only a transaction that already has a session is replicated.
pub fn trans_prepare(
    ctx: &mut CaptureContext<'_>,
    transaction: &mut Transaction,
) -> PublisherResult<()> {
    replicate(ctx, transaction, |session| session.prepare())
}

/// Commits the transaction's replication session and disposes it.
pub fn trans_commit(ctx: &mut CaptureContext<'_>, transaction: &mut Transaction) {
    finish(ctx, transaction, |session| session.commit());
}

/// Rolls back the transaction's replication session and disposes it.
pub fn trans_rollback(ctx: &mut CaptureContext<'_>, transaction: &mut Transaction) {
    finish(ctx, transaction, |session| session.rollback());
}

/// Asks the replicator to forget a dead transaction.
///
/// [`TransactionNumber::ALL_STALE`] forgets every stale transaction.
pub fn trans_cleanup(ctx: &mut CaptureContext<'_>, number: TransactionNumber) {
    if !attachment_session(ctx, false) {
        return;
    }

    let cleaned = ctx
        .attachment
        .session
        .get_mut()
        .map_or(true, |session| session.cleanup_transaction(number));
    if !cleaned {
        handle_terminal_error(ctx, None);
    }
}

/// Ends the innermost savepoint on the replica.
///
/// Must be called before the engine pops the savepoint. Savepoints that
/// were never announced have nothing to end.
pub fn save_cleanup(
    ctx: &mut CaptureContext<'_>,
    transaction: &mut Transaction,
    action: SavepointAction,
) -> PublisherResult<()> {
    if ctx.capture_suppressed() {
        return Ok(());
    }
    if !transaction
        .top_savepoint()
        .is_some_and(Savepoint::is_replicated)
    {
        return Ok(());
    }

    replicate(ctx, transaction, |session| match action {
        SavepointAction::Release => session.release_savepoint(),
        SavepointAction::Rollback => session.rollback_savepoint(),
    })
}

/// Forces the replication manager to switch to a new log segment.
pub fn log_switch(database: &ReplicationDatabase) {
    if let Some(manager) = database.replication_manager() {
        manager.force_log_switch();
    }
}

/// Worker flags, relation kind and table filter checks shared by row
/// capture.
fn captures(ctx: &CaptureContext<'_>, relation: &Relation) -> bool {
    if ctx.capture_suppressed() || relation.is_temporary() {
        return false;
    }
    if relation.is_system() {
        return true;
    }
    relation.is_replicating() && ctx.attachment.accepts_table(relation.name())
}

/// Calls the transaction session, routing a failure through the policy.
fn replicate<F>(
    ctx: &mut CaptureContext<'_>,
    transaction: &mut Transaction,
    call: F,
) -> PublisherResult<()>
where
    F: FnOnce(&mut dyn ReplicatedTransaction) -> bool,
{
    let Some(session) = transaction.session.get_mut() else {
        return Ok(());
    };
    if call(session) {
        return Ok(());
    }
    handle_error(ctx, Some(transaction))
}

fn finish<F>(ctx: &mut CaptureContext<'_>, transaction: &mut Transaction, call: F)
where
    F: FnOnce(&mut dyn ReplicatedTransaction) -> bool,
{
    let Some(session) = transaction.session.get_mut() else {
        return;
    };
    if !call(session) {
        handle_terminal_error(ctx, Some(&mut *transaction));
    }
    transaction.session.dispose();
}
