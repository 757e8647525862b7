//! # replpub Testkit
//!
//! Test utilities for the replpub publisher.
//!
//! This crate provides:
//! - A recording replicator session with failure injection
//! - Relation, record and capture environment fixtures
//! - Property-based test generators using proptest
//! - An in-memory replication log and test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replpub_testkit::prelude::*;
//!
//! #[test]
//! fn insert_reaches_replicator() {
//!     let mut env = TestEnv::recording();
//!     let mut txn = env.transaction(1);
//!     let relation = customers();
//!     let record = customer(relation.format(), 1, "ACME");
//!     publisher::store(&mut env.ctx(), &relation, &record, &mut txn).unwrap();
//!     assert_eq!(env.recorder.count(Operation::Insert), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod log;
pub mod recorder;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::log::*;
    pub use crate::recorder::*;
    pub use replpub_core::prelude::*;
}

pub use fixtures::*;
pub use generators::*;
pub use log::*;
pub use recorder::*;
