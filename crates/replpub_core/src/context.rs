//! Per-call capture context and the recursion guard.
//!
//! The storage engine keeps one [`WorkerState`] per worker thread. Its flags
//! tell the publisher whether deferred work is suppressed for the current
//! operation and whether the worker is already inside a replication call.
//! Flags are only ever changed through [`FlagGuard`], which restores the
//! prior value when dropped.

use crate::attachment::Attachment;
use crate::database::ReplicationDatabase;
use std::cell::Cell;

/// Flags on a worker's execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureFlags(u8);

impl CaptureFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The engine suppressed deferred-work posting for this operation.
    pub const DEFER_SUPPRESSED: Self = Self(0x01);
    /// A replication call is in progress on this worker.
    pub const REPLICATING: Self = Self(0x02);

    /// Returns true if all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the union of both flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the flags with `other` set or cleared.
    #[must_use]
    pub const fn with(self, other: Self, value: bool) -> Self {
        if value {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }
}

/// Execution state of one engine worker.
#[derive(Debug, Default)]
pub struct WorkerState {
    flags: Cell<CaptureFlags>,
}

impl WorkerState {
    /// Creates a worker state with no flags set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current flags.
    #[must_use]
    pub fn flags(&self) -> CaptureFlags {
        self.flags.get()
    }

    /// Returns true while a replication call is in progress.
    #[must_use]
    pub fn is_replicating(&self) -> bool {
        self.flags().contains(CaptureFlags::REPLICATING)
    }

    /// Returns true while deferred-work posting is suppressed.
    #[must_use]
    pub fn is_defer_suppressed(&self) -> bool {
        self.flags().contains(CaptureFlags::DEFER_SUPPRESSED)
    }

    /// Sets the recursion guard until the returned guard is dropped.
    ///
    /// Engine code that replays replicated statements holds this guard so
    /// its own writes are not captured again.
    #[must_use = "the flag is cleared as soon as the guard is dropped"]
    pub fn enter_replication(&self) -> FlagGuard<'_> {
        FlagGuard::set(&self.flags, CaptureFlags::REPLICATING)
    }

    /// Suppresses deferred-work posting until the returned guard is dropped.
    #[must_use = "the flag is cleared as soon as the guard is dropped"]
    pub fn suppress_deferred_work(&self) -> FlagGuard<'_> {
        FlagGuard::set(&self.flags, CaptureFlags::DEFER_SUPPRESSED)
    }
}

/// Sets one flag and restores its prior value on drop.
#[derive(Debug)]
pub struct FlagGuard<'a> {
    flags: &'a Cell<CaptureFlags>,
    flag: CaptureFlags,
    was_set: bool,
}

impl<'a> FlagGuard<'a> {
    fn set(flags: &'a Cell<CaptureFlags>, flag: CaptureFlags) -> Self {
        let current = flags.get();
        flags.set(current.with(flag, true));
        Self {
            flags,
            flag,
            was_set: current.contains(flag),
        }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let current = self.flags.get();
        self.flags.set(current.with(self.flag, self.was_set));
    }
}

/// Everything a capture entry point needs from its caller.
pub struct CaptureContext<'a> {
    pub(crate) database: &'a ReplicationDatabase,
    pub(crate) attachment: &'a mut Attachment,
    pub(crate) worker: &'a WorkerState,
}

impl<'a> CaptureContext<'a> {
    /// Creates a capture context for one engine call.
    pub fn new(
        database: &'a ReplicationDatabase,
        attachment: &'a mut Attachment,
        worker: &'a WorkerState,
    ) -> Self {
        Self {
            database,
            attachment,
            worker,
        }
    }

    /// Returns the database context.
    #[must_use]
    pub fn database(&self) -> &'a ReplicationDatabase {
        self.database
    }

    /// Returns the attachment.
    #[must_use]
    pub fn attachment(&self) -> &Attachment {
        self.attachment
    }

    /// Returns the attachment mutably.
    pub fn attachment_mut(&mut self) -> &mut Attachment {
        self.attachment
    }

    /// Returns the worker state.
    #[must_use]
    pub fn worker(&self) -> &'a WorkerState {
        self.worker
    }

    /// Returns true if capture is suppressed for the current worker.
    pub(crate) fn capture_suppressed(&self) -> bool {
        self.worker
            .flags()
            .intersects(CaptureFlags::DEFER_SUPPRESSED.union(CaptureFlags::REPLICATING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_sets_and_restores() {
        let worker = WorkerState::new();
        assert!(!worker.is_replicating());
        {
            let _guard = worker.enter_replication();
            assert!(worker.is_replicating());
        }
        assert!(!worker.is_replicating());
    }

    #[test]
    fn nested_guard_keeps_outer_value() {
        let worker = WorkerState::new();
        let outer = worker.enter_replication();
        {
            let _inner = worker.enter_replication();
            assert!(worker.is_replicating());
        }
        assert!(worker.is_replicating());
        drop(outer);
        assert!(!worker.is_replicating());
    }

    #[test]
    fn guards_touch_only_their_flag() {
        let worker = WorkerState::new();
        let defer = worker.suppress_deferred_work();
        {
            let _repl = worker.enter_replication();
            assert!(worker.is_defer_suppressed() && worker.is_replicating());
        }
        assert!(worker.is_defer_suppressed());
        assert!(!worker.is_replicating());
        drop(defer);
        assert_eq!(worker.flags(), CaptureFlags::NONE);
    }

    #[test]
    fn flags_restored_on_unwind() {
        let worker = WorkerState::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = worker.enter_replication();
            panic!("replicator blew up");
        }));
        assert!(result.is_err());
        assert!(!worker.is_replicating());
    }
}
