//! The four isolation levels as policy implementations.

use crate::types::{CommitSeq, IsolationLevel, LockMode};
use crate::version::ReadView;

use super::policy::IsolationPolicy;

/// No read locks, latest version wherever it came from. Admits dirty
/// reads, non-repeatable reads, and phantoms.
pub(crate) struct ReadUncommitted;

/// Shared locks per statement, released as soon as the statement ends,
/// reading the latest committed version. Blocks dirty reads; admits
/// non-repeatable reads and phantoms.
pub(crate) struct ReadCommitted;

/// Shared locks held to commit over a snapshot fixed at transaction
/// start. Rows that existed at the snapshot stay stable; rows born
/// later fall through the snapshot, which is the phantom gap.
pub(crate) struct RepeatableRead;

/// Repeatable read plus predicate locks on scans, closing the phantom
/// gap by gating conflicting inserts until the scanner finishes.
pub(crate) struct Serializable;

impl IsolationPolicy for ReadUncommitted {
    fn level(&self) -> IsolationLevel {
        IsolationLevel::ReadUncommitted
    }

    fn read_lock(&self) -> Option<LockMode> {
        None
    }

    fn read_view(&self, _snapshot: CommitSeq) -> ReadView {
        ReadView::Latest
    }
}

impl IsolationPolicy for ReadCommitted {
    fn level(&self) -> IsolationLevel {
        IsolationLevel::ReadCommitted
    }

    fn read_lock(&self) -> Option<LockMode> {
        Some(LockMode::Shared)
    }

    fn releases_read_locks_eagerly(&self) -> bool {
        true
    }

    fn read_view(&self, _snapshot: CommitSeq) -> ReadView {
        ReadView::LatestCommitted
    }
}

impl IsolationPolicy for RepeatableRead {
    fn level(&self) -> IsolationLevel {
        IsolationLevel::RepeatableRead
    }

    fn read_lock(&self) -> Option<LockMode> {
        Some(LockMode::Shared)
    }

    fn read_view(&self, snapshot: CommitSeq) -> ReadView {
        ReadView::Snapshot(snapshot)
    }
}

impl IsolationPolicy for Serializable {
    fn level(&self) -> IsolationLevel {
        IsolationLevel::Serializable
    }

    fn read_lock(&self) -> Option<LockMode> {
        Some(LockMode::Shared)
    }

    fn registers_predicates(&self) -> bool {
        true
    }

    fn read_view(&self, snapshot: CommitSeq) -> ReadView {
        ReadView::Snapshot(snapshot)
    }
}

/// The policy singleton for a level.
pub(crate) fn policy_for(level: IsolationLevel) -> &'static dyn IsolationPolicy {
    match level {
        IsolationLevel::ReadUncommitted => &ReadUncommitted,
        IsolationLevel::ReadCommitted => &ReadCommitted,
        IsolationLevel::RepeatableRead => &RepeatableRead,
        IsolationLevel::Serializable => &Serializable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_report_their_level() {
        for level in [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            assert_eq!(policy_for(level).level(), level);
        }
    }

    #[test]
    fn lock_discipline_strengthens_with_the_level() {
        assert_eq!(policy_for(IsolationLevel::ReadUncommitted).read_lock(), None);
        for level in [
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            assert_eq!(policy_for(level).read_lock(), Some(LockMode::Shared));
        }

        assert!(policy_for(IsolationLevel::ReadCommitted).releases_read_locks_eagerly());
        assert!(!policy_for(IsolationLevel::RepeatableRead).releases_read_locks_eagerly());

        assert!(policy_for(IsolationLevel::Serializable).registers_predicates());
        assert!(!policy_for(IsolationLevel::RepeatableRead).registers_predicates());
    }

    #[test]
    fn views_follow_the_level_table() {
        let snapshot = CommitSeq::new(7);
        assert_eq!(
            policy_for(IsolationLevel::ReadUncommitted).read_view(snapshot),
            ReadView::Latest
        );
        assert_eq!(
            policy_for(IsolationLevel::ReadCommitted).read_view(snapshot),
            ReadView::LatestCommitted
        );
        assert_eq!(
            policy_for(IsolationLevel::RepeatableRead).read_view(snapshot),
            ReadView::Snapshot(snapshot)
        );
        assert_eq!(
            policy_for(IsolationLevel::Serializable).read_view(snapshot),
            ReadView::Snapshot(snapshot)
        );
    }
}
