//! # isodb Core
//!
//! A single-process transactional key-value engine built to make
//! isolation levels observable.
//!
//! This crate provides:
//! - Row-versioned in-memory storage (no tombstone copies, full
//!   version chains per row)
//! - Strict two-phase locking with shared/exclusive row locks, FIFO
//!   wait queues, and lock upgrades
//! - The four classical isolation levels, each reproducing exactly the
//!   anomalies its SQL namesake admits
//! - Wait-for-graph deadlock detection with automatic victim rollback
//! - Predicate locks under `Serializable` that gate phantom-producing
//!   inserts
//!
//! ## Usage
//!
//! ```
//! use isodb_core::{IsolationLevel, RowId, TransactionManager, Value};
//!
//! let engine = TransactionManager::default();
//! let account = RowId::new("alice");
//!
//! let tx = engine.begin(IsolationLevel::ReadCommitted);
//! engine.write(tx, &account, Value::Integer(100))?;
//! engine.commit(tx)?;
//!
//! let reader = engine.begin_default();
//! assert_eq!(engine.read(reader, &account)?, Some(Value::Integer(100)));
//! # Ok::<(), isodb_core::EngineError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod isolation;
mod lock;
mod stats;
mod txn;
mod types;
mod value;
mod version;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use lock::Predicate;
pub use stats::StatsSnapshot;
pub use txn::{TransactionManager, TransactionStatus, TxHandle};
pub use types::{CommitSeq, IsolationLevel, LockMode, RowId, TxId};
pub use value::Value;
pub use version::RowVersion;
