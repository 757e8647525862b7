//! Status reported by replication sessions.
//!
//! Every downstream call returns a plain success flag; details about a
//! failure (and any warnings raised along the way) are left in the session's
//! status, which the error policy inspects afterwards.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Separator used when a multi-line status is written as one log message.
pub const LINE_SEPARATOR: &str = "\n\t";

/// Warnings and errors left behind by the last replication call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Status {
    /// Creates a clean status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a status carrying a single error line.
    #[must_use]
    pub fn from_error(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.push_error(message);
        status
    }

    /// Adds a warning line.
    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Adds an error line.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Resets the status to clean.
    pub fn init(&mut self) {
        self.warnings.clear();
        self.errors.clear();
    }

    /// Returns true if any warning is present.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns true if any error is present.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if neither warnings nor errors are present.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.has_warnings() && !self.has_errors()
    }

    /// Returns the warning lines.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the error lines.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str(&self.warnings.join("; "));
        }
        f.write_str(&self.errors.join("; "))
    }
}

/// Status shared between an attachment session and the transaction sessions
/// it started.
///
/// Clones refer to the same status.
#[derive(Debug, Clone, Default)]
pub struct SharedStatus(Arc<Mutex<Status>>);

impl SharedStatus {
    /// Creates a clean shared status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current status.
    #[must_use]
    pub fn snapshot(&self) -> Status {
        self.0.lock().clone()
    }

    /// Resets the status to clean.
    pub fn init(&self) {
        self.0.lock().init();
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.0.lock().push_warning(message);
    }

    /// Records an error and returns `false`, for use as a call result.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.0.lock().push_error(message);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_status() {
        let status = Status::new();
        assert!(status.is_clean());
        assert!(!status.has_errors());
    }

    #[test]
    fn init_clears_everything() {
        let mut status = Status::new();
        status.push_warning("slow flush");
        status.push_error("disk full");
        assert!(status.has_warnings() && status.has_errors());

        status.init();
        assert!(status.is_clean());
    }

    #[test]
    fn display_prefers_errors() {
        let mut status = Status::new();
        status.push_warning("w");
        assert_eq!(status.to_string(), "w");

        status.push_error("e1");
        status.push_error("e2");
        assert_eq!(status.to_string(), "e1; e2");
    }

    #[test]
    fn shared_status_is_shared() {
        let a = SharedStatus::new();
        let b = a.clone();

        assert!(!b.fail("boom"));
        assert!(a.snapshot().has_errors());

        a.init();
        assert!(b.snapshot().is_clean());
    }
}
