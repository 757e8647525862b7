//! # replpub Core
//!
//! Change-data-capture publisher for a transactional storage engine.
//!
//! The storage engine calls the [`publisher`] entry points for every row
//! change, sequence change and replicated statement of a live transaction.
//! The publisher turns them into an ordered logical change stream handed to
//! a pluggable downstream replicator, without disturbing the engine's own
//! transaction and savepoint semantics.
//!
//! This crate provides:
//! - Lazy attachment and transaction replication sessions
//! - Savepoint announcement before the first change inside a savepoint
//! - Record normalization to the relation's current format
//! - A read-only field reflector handed to replicators
//! - A configurable error policy (log, disable, report)
//! - A built-in replicator feeding a database-wide [`ReplicationManager`]
//!
//! ## Example
//!
//! ```rust
//! use replpub_core::prelude::*;
//! use std::sync::Arc;
//!
//! let database = ReplicationDatabase::new("sales.fdb").with_config(ReplicationConfig::default());
//! let format = Arc::new(Format::new(
//!     FormatVersion::new(1),
//!     vec![FieldDesc::new(DataType::Integer)],
//! ));
//! let orders = Relation::new(RelationId::new(128), "ORDERS", format.clone());
//!
//! let worker = WorkerState::new();
//! let mut attachment = Attachment::new(AttachmentId::new(1), "SYSDBA");
//! let mut transaction = Transaction::new(TransactionNumber::new(10), attachment.id());
//! let mut ctx = CaptureContext::new(&database, &mut attachment, &worker);
//!
//! publisher::attach(&mut ctx, false).unwrap();
//!
//! let mut record = Record::new(format);
//! record.set(0, &Value::int(1)).unwrap();
//! publisher::store(&mut ctx, &orders, &record, &mut transaction).unwrap();
//! publisher::trans_commit(&mut ctx, &mut transaction);
//!
//! let manager = database.replication_manager().unwrap();
//! assert_eq!(manager.history_len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attachment;
mod change;
mod config;
mod context;
mod database;
mod error;
mod filter;
mod log;
mod manager;
pub mod publisher;
pub mod record;
mod relation;
pub mod sequence;
pub mod session;
mod status;
mod transaction;
mod types;

pub use attachment::Attachment;
pub use change::{ChangeBlock, ChangeOp, FieldValue, RowImage};
pub use config::{ReplicationConfig, DEFAULT_BUFFER_SIZE};
pub use context::{CaptureContext, CaptureFlags, FlagGuard, WorkerState};
pub use database::ReplicationDatabase;
pub use error::{PublisherError, PublisherResult};
pub use filter::{TableFilter, TableMatcher};
pub use log::{LogKind, ReplicationLog, TracingLog};
pub use manager::{ReplicationManager, DEFAULT_MAX_HISTORY};
pub use publisher::SavepointAction;
pub use relation::{Relation, RelationFlags};
pub use sequence::{MetadataCatalog, StaticCatalog};
pub use session::{
    AttachmentInfo, PluginRegistry, ReplicatedSession, ReplicatedTransaction, SessionFactory,
    TransactionInfo,
};
pub use status::{SharedStatus, Status, LINE_SEPARATOR};
pub use transaction::{Savepoint, Transaction, TransactionFlags};
pub use types::{
    AttachmentId, CharSetId, FormatVersion, RelationId, SequenceId, TransactionNumber,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::publisher::{self, SavepointAction};
    pub use crate::record::{DataType, FieldDesc, Format, Record, ReplicatedRecord, Value};
    pub use crate::session::{ReplicatedSession, ReplicatedTransaction};
    pub use crate::{
        Attachment, AttachmentId, CaptureContext, CharSetId, FormatVersion, Relation,
        RelationId, ReplicationConfig, ReplicationDatabase, SequenceId, Transaction,
        TransactionNumber, WorkerState,
    };
}
