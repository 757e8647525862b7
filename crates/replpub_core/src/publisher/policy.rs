//! Error policy applied after a failed replication call.

use crate::config::ReplicationConfig;
use crate::context::CaptureContext;
use crate::error::{PublisherError, PublisherResult};
use crate::log::LogKind;
use crate::status::{Status, LINE_SEPARATOR};
use crate::transaction::Transaction;

/// Logged when replication is disabled after an error.
pub const STOP_MESSAGE: &str = "Replication is stopped due to critical error(s)";

/// What the policy does with one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Decision {
    pub log_warnings: bool,
    pub log_errors: bool,
    pub disable: bool,
    pub raise: bool,
}

pub(crate) fn decide(config: &ReplicationConfig, status: &Status, can_throw: bool) -> Decision {
    let failed = status.has_errors();
    Decision {
        log_warnings: status.has_warnings() && config.log_errors,
        log_errors: failed && config.log_errors,
        disable: failed && config.disable_on_error,
        raise: failed && config.report_errors && can_throw,
    }
}

/// Applies the policy where the caller may fail the user operation.
pub(crate) fn handle_error(
    ctx: &mut CaptureContext<'_>,
    transaction: Option<&mut Transaction>,
) -> PublisherResult<()> {
    apply(ctx, transaction, true)
}

/// Applies the policy on a path that must not fail.
pub(crate) fn handle_terminal_error(
    ctx: &mut CaptureContext<'_>,
    transaction: Option<&mut Transaction>,
) {
    let result = apply(ctx, transaction, false);
    debug_assert!(result.is_ok(), "terminal policy raised an error");
}

fn apply(
    ctx: &mut CaptureContext<'_>,
    transaction: Option<&mut Transaction>,
    can_throw: bool,
) -> PublisherResult<()> {
    let database = ctx.database;
    let Some(config) = database.config() else {
        return Ok(());
    };
    let Some(session) = ctx.attachment.session.get() else {
        return Ok(());
    };

    let status = session.status();
    let decision = decide(config, &status, can_throw);

    if decision.log_warnings {
        database.log(LogKind::Warning, &status.warnings().join(LINE_SEPARATOR));
    }
    if decision.log_errors {
        database.log(LogKind::Error, &status.errors().join(LINE_SEPARATOR));
    }

    if decision.disable {
        if let Some(transaction) = transaction {
            transaction.session.dispose();
        }
        database.log(LogKind::Error, STOP_MESSAGE);
        tracing::warn!(
            attachment = %ctx.attachment.id(),
            "replication disabled after error"
        );
    }

    if decision.raise {
        return Err(PublisherError::replication(status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> Status {
        Status::from_error("connection to replica lost")
    }

    #[test]
    fn clean_status_does_nothing() {
        let decision = decide(&ReplicationConfig::default(), &Status::new(), true);
        assert_eq!(decision, Decision::default());
    }

    #[test]
    fn defaults_log_and_disable() {
        let decision = decide(&ReplicationConfig::default(), &failed(), true);
        assert!(decision.log_errors);
        assert!(decision.disable);
        assert!(!decision.raise);
    }

    #[test]
    fn report_requires_permission() {
        let config = ReplicationConfig::new().report_errors(true);
        assert!(decide(&config, &failed(), true).raise);
        assert!(!decide(&config, &failed(), false).raise);
    }

    #[test]
    fn warnings_only() {
        let mut status = Status::new();
        status.push_warning("replica lagging");
        let decision = decide(&ReplicationConfig::default(), &status, true);
        assert!(decision.log_warnings);
        assert!(!decision.log_errors && !decision.disable && !decision.raise);

        let quiet = ReplicationConfig::new().log_errors(false);
        assert!(!decide(&quiet, &status, true).log_warnings);
    }

    #[test]
    fn swallow_when_everything_off() {
        let config = ReplicationConfig::new()
            .log_errors(false)
            .disable_on_error(false);
        assert_eq!(decide(&config, &failed(), true), Decision::default());
    }
}
