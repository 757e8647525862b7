//! Replication log sink.
//!
//! Configuration errors, replication warnings/errors and the "replication
//! stopped" notice are written to the database's replication log, tagged with
//! the database file name as origin.

use std::fmt;

/// Severity of a replication log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Informational message.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// Destination of replication log messages.
pub trait ReplicationLog: Send + Sync {
    /// Writes one message originating from the database `origin`.
    fn log(&self, origin: &str, kind: LogKind, message: &str);
}

/// Log sink forwarding to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl ReplicationLog for TracingLog {
    fn log(&self, origin: &str, kind: LogKind, message: &str) {
        match kind {
            LogKind::Info => tracing::info!(origin, "{message}"),
            LogKind::Warning => tracing::warn!(origin, "{message}"),
            LogKind::Error => tracing::error!(origin, "{message}"),
        }
    }
}
