//! Lazy acquisition of attachment and transaction sessions.

use super::policy::handle_error;
use crate::context::CaptureContext;
use crate::error::PublisherResult;
use crate::log::LogKind;
use crate::session::{BuiltinSession, ReplicatedSession};
use crate::transaction::Transaction;
use crate::types::TransactionNumber;

/// Returns true if the attachment has a usable replication session,
/// creating one if needed.
///
/// With `force_create`, a newly created session is asked to clean up all
/// stale transactions.
pub(crate) fn attachment_session(ctx: &mut CaptureContext<'_>, force_create: bool) -> bool {
    let database = ctx.database;
    let attachment = &mut *ctx.attachment;

    if attachment.is_system() {
        return false;
    }

    let Some(config) = database.config() else {
        return false;
    };
    if !database.is_replicating() {
        attachment.session.dispose();
        return false;
    }

    if let Some(session) = attachment.session.get_mut() {
        if config.disable_on_error && session.status().has_errors() {
            return false;
        }
        session.reset_status();
        return true;
    }

    let session: Box<dyn ReplicatedSession> = if config.uses_builtin() {
        Box::new(BuiltinSession::new(
            database.ensure_replication_manager(),
            database.guid(),
            attachment.user_name(),
            config.buffer_size,
        ))
    } else {
        let Some(factory) = database.plugins().get(&config.plugin_name) else {
            database.log(
                LogKind::Error,
                &format!("Replication plugin {} is not found", config.plugin_name),
            );
            return false;
        };
        let Some(session) = factory.create(database) else {
            tracing::warn!(plugin = %config.plugin_name, "replication plugin returned no session");
            return false;
        };
        session
    };

    let info = attachment.info();
    attachment.session.install(session);
    if let Some(session) = attachment.session.get_mut() {
        session.bind_attachment(&info);
        if force_create {
            session.cleanup_transaction(TransactionNumber::ALL_STALE);
        }
    }

    tracing::debug!(attachment = %info.id, user = %info.user_name, "replication session created");
    true
}

/// Returns true if the transaction has a usable replication session,
/// starting one if needed.
///
/// A replicator refusing to start the transaction goes through the error
/// policy, which may return an error.
pub(crate) fn transaction_session(
    ctx: &mut CaptureContext<'_>,
    transaction: &mut Transaction,
) -> PublisherResult<bool> {
    if transaction.is_system() || transaction.is_read_only() {
        return Ok(false);
    }

    if !attachment_session(ctx, false) {
        transaction.session.dispose();
        return Ok(false);
    }

    if !transaction.session.is_active() && transaction.is_replicating() {
        let info = transaction.info();
        let started = ctx
            .attachment
            .session
            .get_mut()
            .and_then(|session| session.start_transaction(&info));

        match started {
            Some(session) => transaction.session.install(session),
            None => {
                handle_error(ctx, Some(&mut *transaction))?;
                return Ok(false);
            }
        }
    }

    Ok(transaction.session.is_active())
}
