//! Two-phase locking: the lock table, predicate locks, and deadlock
//! detection over the wait-for graph.

mod deadlock;
mod manager;
mod predicate;

pub use predicate::Predicate;

pub(crate) use manager::{Granted, LockManager, WaitAbort};
