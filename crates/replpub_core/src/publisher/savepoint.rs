//! Announces pending savepoints before the first change inside them.

use super::policy::handle_error;
use crate::context::CaptureContext;
use crate::error::PublisherResult;
use crate::transaction::Transaction;

/// Announces every unreplicated savepoint above the last replicated one,
/// oldest first.
///
/// Returns false if an announcement failed; savepoints announced before the
/// failure stay marked.
pub(crate) fn ensure_savepoints(
    ctx: &mut CaptureContext<'_>,
    transaction: &mut Transaction,
) -> PublisherResult<bool> {
    let pending = transaction
        .savepoints
        .iter()
        .rev()
        .take_while(|savepoint| !savepoint.replicated)
        .count();
    let first = transaction.savepoints.len() - pending;

    for index in first..transaction.savepoints.len() {
        let Some(session) = transaction.session.get_mut() else {
            return Ok(false);
        };
        if !session.start_savepoint() {
            handle_error(ctx, Some(&mut *transaction))?;
            return Ok(false);
        }
        transaction.savepoints[index].replicated = true;
    }

    Ok(true)
}
