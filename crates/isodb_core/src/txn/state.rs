//! Transaction records and lifecycle state.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::{CommitSeq, IsolationLevel, RowId, TxId};

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting operations.
    Active,
    /// Terminal: every write is visible under one commit sequence.
    Committed,
    /// Terminal: every write has been discarded.
    RolledBack,
}

impl TransactionStatus {
    /// Whether the transaction has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

/// Why a transaction left the active state without committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbortReason {
    /// `rollback` was called on the handle.
    Requested,
    /// Chosen as the victim of a deadlock cycle.
    Deadlock,
    /// A lock wait exceeded the configured backstop timeout.
    Timeout,
}

/// A client's reference to a transaction.
///
/// Handles are cheap copyable tokens; every copy refers to the same
/// transaction, which is what lets one thread roll back a transaction
/// another thread is blocked inside. The manager's registry stays the
/// authority on transaction state, so a stale handle cannot resurrect
/// a finished transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHandle {
    id: TxId,
    level: IsolationLevel,
    snapshot: CommitSeq,
}

impl TxHandle {
    pub(crate) const fn new(id: TxId, level: IsolationLevel, snapshot: CommitSeq) -> Self {
        Self {
            id,
            level,
            snapshot,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub const fn id(self) -> TxId {
        self.id
    }

    /// Returns the isolation level the transaction runs at.
    #[must_use]
    pub const fn level(self) -> IsolationLevel {
        self.level
    }

    /// Returns the commit sequence the transaction's snapshot was
    /// taken at.
    #[must_use]
    pub const fn snapshot(self) -> CommitSeq {
        self.snapshot
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// The manager's record of one transaction.
#[derive(Debug)]
pub(crate) struct Transaction {
    level: IsolationLevel,
    snapshot: CommitSeq,
    status: TransactionStatus,
    abort: Option<AbortReason>,
    write_set: BTreeSet<RowId>,
}

impl Transaction {
    pub(crate) fn new(level: IsolationLevel, snapshot: CommitSeq) -> Self {
        Self {
            level,
            snapshot,
            status: TransactionStatus::Active,
            abort: None,
            write_set: BTreeSet::new(),
        }
    }

    pub(crate) fn level(&self) -> IsolationLevel {
        self.level
    }

    pub(crate) fn snapshot(&self) -> CommitSeq {
        self.snapshot
    }

    pub(crate) fn status(&self) -> TransactionStatus {
        self.status
    }

    pub(crate) fn abort(&self) -> Option<AbortReason> {
        self.abort
    }

    pub(crate) fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Records that the transaction created a version or a delete mark
    /// for `row`; commit and rollback sweep exactly this set.
    pub(crate) fn track_write(&mut self, row: RowId) {
        self.write_set.insert(row);
    }

    pub(crate) fn write_rows(&self) -> impl Iterator<Item = &RowId> {
        self.write_set.iter()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.status = TransactionStatus::Committed;
    }

    pub(crate) fn mark_rolled_back(&mut self, reason: AbortReason) {
        self.status = TransactionStatus::RolledBack;
        self.abort = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Transaction {
        Transaction::new(IsolationLevel::RepeatableRead, CommitSeq::ZERO)
    }

    #[test]
    fn new_record_is_active() {
        let txn = record();
        assert!(txn.is_active());
        assert_eq!(txn.status(), TransactionStatus::Active);
        assert!(txn.abort().is_none());
        assert_eq!(txn.write_rows().count(), 0);
    }

    #[test]
    fn write_set_deduplicates_rows() {
        let mut txn = record();
        txn.track_write(RowId::new("a"));
        txn.track_write(RowId::new("b"));
        txn.track_write(RowId::new("a"));
        assert_eq!(txn.write_rows().count(), 2);
    }

    #[test]
    fn rollback_records_the_reason() {
        let mut txn = record();
        txn.mark_rolled_back(AbortReason::Deadlock);
        assert_eq!(txn.status(), TransactionStatus::RolledBack);
        assert_eq!(txn.abort(), Some(AbortReason::Deadlock));
        assert!(txn.status().is_terminal());
    }

    #[test]
    fn status_displays_lowercase() {
        assert_eq!(TransactionStatus::Active.to_string(), "active");
        assert_eq!(TransactionStatus::Committed.to_string(), "committed");
        assert_eq!(TransactionStatus::RolledBack.to_string(), "rolled back");
    }

    #[test]
    fn handle_exposes_identity() {
        let handle = TxHandle::new(
            TxId::new(7),
            IsolationLevel::Serializable,
            CommitSeq::new(3),
        );
        assert_eq!(handle.id(), TxId::new(7));
        assert_eq!(handle.level(), IsolationLevel::Serializable);
        assert_eq!(handle.snapshot(), CommitSeq::new(3));
        assert_eq!(handle.to_string(), "tx:7");
    }
}
