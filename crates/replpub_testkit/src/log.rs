//! In-memory replication log and test logging setup.

use parking_lot::Mutex;
use replpub_core::{LogKind, ReplicationLog};
use tracing_subscriber::EnvFilter;

/// A message written to a [`MemoryLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Database the message came from.
    pub origin: String,
    /// Severity.
    pub kind: LogKind,
    /// Message text.
    pub message: String,
}

/// Replication log keeping every message in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every entry.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Returns the messages of one kind.
    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Returns true if any message contains `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(text))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ReplicationLog for MemoryLog {
    fn log(&self, origin: &str, kind: LogKind, message: &str) {
        self.entries.lock().push(LogEntry {
            origin: origin.to_string(),
            kind,
            message: message.to_string(),
        });
    }
}

/// Installs a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_collects() {
        let log = MemoryLog::new();
        assert!(log.is_empty());

        log.log("a.fdb", LogKind::Error, "boom");
        log.log("a.fdb", LogKind::Warning, "careful");

        assert_eq!(log.len(), 2);
        assert_eq!(log.messages(LogKind::Error), vec!["boom".to_string()]);
        assert!(log.contains("care"));
        assert_eq!(log.entries()[0].origin, "a.fdb");
    }
}
