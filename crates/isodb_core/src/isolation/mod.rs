//! Isolation levels as pluggable policies.
//!
//! A policy decides three things for its level: what a read locks, how
//! long statement locks survive, and which row version a read sees.
//! Everything else, including the write path and the predicate gate on
//! inserts, is common to all levels.

mod levels;
mod policy;

pub(crate) use levels::policy_for;
pub(crate) use policy::{IsolationPolicy, PolicyContext, StatementAbort};
