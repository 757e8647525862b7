//! Database-wide replication manager.
//!
//! The manager receives the change blocks flushed by built-in sessions,
//! assigns them commit-order sequence numbers and the current log segment,
//! and distributes them to subscribers. It keeps a bounded history so a
//! consumer that fell behind can catch up by polling.
//!
//! # Usage
//!
//! ```rust,ignore
//! let manager = database.ensure_replication_manager();
//! let receiver = manager.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(block) = receiver.recv() {
//!         println!("block {} in segment {}", block.sequence, block.segment);
//!     }
//! });
//! ```

use crate::change::ChangeBlock;
use crate::error::{PublisherError, PublisherResult};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Default number of blocks kept for polling.
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

struct Counters {
    sequence: u64,
    segment: u64,
}

/// Distributes flushed change blocks in flush order.
pub struct ReplicationManager {
    /// Subscribers (senders).
    subscribers: RwLock<Vec<Sender<ChangeBlock>>>,
    /// Recent blocks for polling.
    history: RwLock<Vec<ChangeBlock>>,
    /// Sequence and segment counters.
    counters: Mutex<Counters>,
    /// Maximum history size.
    max_history: usize,
    shut_down: AtomicBool,
}

impl ReplicationManager {
    /// Creates a new manager writing to segment 1.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Creates a manager with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            counters: Mutex::new(Counters {
                sequence: 0,
                segment: 1,
            }),
            max_history,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Subscribes to flushed blocks.
    ///
    /// The receiver gets every block flushed after this call.
    pub fn subscribe(&self) -> Receiver<ChangeBlock> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Accepts a block, returning the sequence number assigned to it.
    pub fn flush(&self, mut block: ChangeBlock) -> PublisherResult<u64> {
        if self.is_shut_down() {
            return Err(PublisherError::invalid_operation(
                "replication manager is shut down",
            ));
        }

        // Sequence assignment and history append happen under the counters
        // lock so history stays in sequence order.
        let mut counters = self.counters.lock();
        counters.sequence += 1;
        block.sequence = counters.sequence;
        block.segment = counters.segment;

        {
            let mut history = self.history.write();
            history.push(block.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(block.clone()).is_ok());
        drop(subscribers);

        tracing::trace!(
            sequence = block.sequence,
            segment = block.segment,
            transaction = ?block.transaction,
            ops = block.ops.len(),
            "change block flushed"
        );
        Ok(block.sequence)
    }

    /// Closes the current log segment; later blocks go to the next one.
    ///
    /// Returns the new segment number.
    pub fn force_log_switch(&self) -> u64 {
        let mut counters = self.counters.lock();
        counters.segment += 1;
        tracing::info!(segment = counters.segment, "replication log switched");
        counters.segment
    }

    /// Returns the segment new blocks are written to.
    pub fn current_segment(&self) -> u64 {
        self.counters.lock().segment
    }

    /// Polls blocks with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeBlock> {
        let history = self.history.read();
        history
            .iter()
            .filter(|b| b.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|b| b.sequence).unwrap_or(0)
    }

    /// Returns the number of blocks in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Stops accepting blocks and disconnects subscribers.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.subscribers.write().clear();
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for ReplicationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeOp;
    use crate::types::{AttachmentId, TransactionNumber};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    fn block(txn: u64) -> ChangeBlock {
        ChangeBlock::new(
            Uuid::nil(),
            AttachmentId::new(1),
            Some(TransactionNumber::new(txn)),
            "SYSDBA",
            vec![ChangeOp::Commit],
        )
    }

    #[test]
    fn flush_and_receive() {
        let manager = ReplicationManager::new();
        let rx = manager.subscribe();

        assert_eq!(manager.flush(block(10)).unwrap(), 1);

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.segment, 1);
        assert_eq!(received.transaction, Some(TransactionNumber::new(10)));
    }

    #[test]
    fn multiple_subscribers() {
        let manager = ReplicationManager::new();
        let rx1 = manager.subscribe();
        let rx2 = manager.subscribe();

        manager.flush(block(1)).unwrap();

        assert_eq!(rx1.recv().unwrap().sequence, 1);
        assert_eq!(rx2.recv().unwrap().sequence, 1);
    }

    #[test]
    fn dropped_subscriber_is_removed() {
        let manager = ReplicationManager::new();
        let rx = manager.subscribe();
        drop(rx);

        manager.flush(block(1)).unwrap();
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[test]
    fn poll_from_cursor() {
        let manager = ReplicationManager::new();
        for txn in 1..=5 {
            manager.flush(block(txn)).unwrap();
        }

        let blocks = manager.poll(2, 10);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].sequence, 3);

        assert_eq!(manager.poll(0, 2).len(), 2);
        assert_eq!(manager.latest_sequence(), 5);
    }

    #[test]
    fn history_limit() {
        let manager = ReplicationManager::with_max_history(3);
        for txn in 1..=5 {
            manager.flush(block(txn)).unwrap();
        }

        assert_eq!(manager.history_len(), 3);
        assert_eq!(manager.poll(0, 10)[0].sequence, 3);
    }

    #[test]
    fn log_switch_moves_later_blocks() {
        let manager = ReplicationManager::new();
        manager.flush(block(1)).unwrap();

        assert_eq!(manager.force_log_switch(), 2);
        manager.flush(block(2)).unwrap();

        let blocks = manager.poll(0, 10);
        assert_eq!(blocks[0].segment, 1);
        assert_eq!(blocks[1].segment, 2);
        assert_eq!(manager.current_segment(), 2);
    }

    #[test]
    fn shutdown_rejects_blocks() {
        let manager = ReplicationManager::new();
        let rx = manager.subscribe();
        manager.shutdown();

        assert!(manager.is_shut_down());
        assert!(manager.flush(block(1)).is_err());
        assert!(rx.recv().is_err());
    }

    #[test]
    fn concurrent_flushers_get_distinct_sequences() {
        let manager = Arc::new(ReplicationManager::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for i in 0..25 {
                        manager.flush(block(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<u64> = manager.poll(0, 1000).iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, (1..=100).collect::<Vec<_>>());
    }
}
