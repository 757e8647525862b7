//! Replication configuration.
//!
//! The configuration is loaded by the host (from a config file, a catalog
//! table, etc.) and handed to [`crate::ReplicationDatabase`]. It derives
//! `Deserialize` so hosts can load it from any serde format.

use serde::{Deserialize, Serialize};

/// Default size of the built-in session's per-transaction buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Configuration of the publisher for one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Name of the external replicator plugin. Empty selects the built-in
    /// session.
    pub plugin_name: String,

    /// Regular expression of table names to replicate (empty = all).
    pub include_filter: String,

    /// Regular expression of table names never to replicate.
    pub exclude_filter: String,

    /// Whether replication warnings and errors are written to the log.
    pub log_errors: bool,

    /// Whether replication errors fail the user operation where permitted.
    pub report_errors: bool,

    /// Whether replication stops for the attachment after the first error.
    pub disable_on_error: bool,

    /// Size in bytes after which the built-in session flushes a partial
    /// transaction block.
    pub buffer_size: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            plugin_name: String::new(),
            include_filter: String::new(),
            exclude_filter: String::new(),
            log_errors: true,
            report_errors: false,
            disable_on_error: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ReplicationConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the external plugin name.
    #[must_use]
    pub fn plugin_name(mut self, name: impl Into<String>) -> Self {
        self.plugin_name = name.into();
        self
    }

    /// Sets the include filter.
    #[must_use]
    pub fn include_filter(mut self, pattern: impl Into<String>) -> Self {
        self.include_filter = pattern.into();
        self
    }

    /// Sets the exclude filter.
    #[must_use]
    pub fn exclude_filter(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_filter = pattern.into();
        self
    }

    /// Sets whether errors are logged.
    #[must_use]
    pub fn log_errors(mut self, value: bool) -> Self {
        self.log_errors = value;
        self
    }

    /// Sets whether errors are reported to the caller.
    #[must_use]
    pub fn report_errors(mut self, value: bool) -> Self {
        self.report_errors = value;
        self
    }

    /// Sets whether replication is disabled after an error.
    #[must_use]
    pub fn disable_on_error(mut self, value: bool) -> Self {
        self.disable_on_error = value;
        self
    }

    /// Sets the built-in session buffer size.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Returns true if the built-in session is selected.
    #[must_use]
    pub fn uses_builtin(&self) -> bool {
        self.plugin_name.is_empty()
    }
}
