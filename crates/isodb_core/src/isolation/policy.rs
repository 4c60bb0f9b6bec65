//! The policy trait: how each isolation level locks and reads.

use crate::lock::{Granted, LockManager, Predicate, WaitAbort};
use crate::types::{CommitSeq, IsolationLevel, LockMode, RowId, TxId};
use crate::value::Value;
use crate::version::{ReadView, VersionStore};

/// Everything a policy needs to run one statement for one transaction.
pub(crate) struct PolicyContext<'a> {
    pub(crate) tx: TxId,
    pub(crate) snapshot: CommitSeq,
    pub(crate) locks: &'a LockManager,
    pub(crate) versions: &'a VersionStore,
}

/// A scan that gave up, annotated with the row it failed on.
#[derive(Debug)]
pub(crate) struct StatementAbort {
    pub(crate) row: RowId,
    pub(crate) abort: WaitAbort,
}

/// Per-level locking and visibility rules.
///
/// The provided methods are the statement flows shared by all levels;
/// a level customizes them only through the small hooks. Writes are
/// identical everywhere (exclusive lock held to commit, predicate gate
/// on inserts); the levels differ in what a read locks, how long it
/// keeps the lock, and which version it sees.
pub(crate) trait IsolationPolicy: Send + Sync {
    fn level(&self) -> IsolationLevel;

    /// Lock mode a read takes, if any.
    fn read_lock(&self) -> Option<LockMode>;

    /// Whether shared locks taken by a statement are surrendered as
    /// soon as the statement completes.
    fn releases_read_locks_eagerly(&self) -> bool {
        false
    }

    /// Whether scans install predicate locks.
    fn registers_predicates(&self) -> bool {
        false
    }

    /// The view reads evaluate under.
    fn read_view(&self, snapshot: CommitSeq) -> ReadView;

    /// Reads one row: lock (per level), read under the level's view,
    /// then release statement locks if the level is eager.
    fn read(&self, ctx: &PolicyContext<'_>, row: &RowId) -> Result<Option<Value>, WaitAbort> {
        let granted = match self.read_lock() {
            Some(mode) => Some((mode, ctx.locks.acquire(ctx.tx, row, mode)?)),
            None => None,
        };
        let value = ctx.versions.read(row, ctx.tx, self.read_view(ctx.snapshot));
        if self.releases_read_locks_eagerly() {
            // Only locks this statement introduced, and never an
            // exclusive one protecting an earlier write.
            if let Some((LockMode::Shared, Granted::New)) = granted {
                ctx.locks.release(ctx.tx, row);
            }
        }
        Ok(value)
    }

    /// Scans every row, returning those whose current value matches.
    ///
    /// Under a predicate-registering level the predicate is installed
    /// before any row is examined, so an insert racing the scan is
    /// either visible to it or gated by it.
    fn scan(
        &self,
        ctx: &PolicyContext<'_>,
        predicate: &Predicate,
    ) -> Result<Vec<(RowId, Value)>, StatementAbort> {
        if self.registers_predicates() {
            ctx.locks.register_predicate(ctx.tx, predicate.clone());
        }
        let mut matches = Vec::new();
        for row in ctx.versions.row_ids() {
            let value = match self.read(ctx, &row) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(abort) => return Err(StatementAbort { row, abort }),
            };
            if predicate.matches(&row, &value) {
                matches.push((row, value));
            }
        }
        Ok(matches)
    }

    /// Upserts one row under an exclusive lock held to commit.
    ///
    /// A write that brings a row into existence is an insert and must
    /// wait out any other transaction's matching predicate lock,
    /// whatever level the writer runs at.
    fn write(&self, ctx: &PolicyContext<'_>, row: &RowId, value: Value) -> Result<(), WaitAbort> {
        ctx.locks.acquire(ctx.tx, row, LockMode::Exclusive)?;
        if ctx.versions.read(row, ctx.tx, ReadView::Latest).is_none() {
            ctx.locks.wait_predicates_clear(ctx.tx, row, &value)?;
        }
        ctx.versions.create_version(row.clone(), value, ctx.tx);
        Ok(())
    }

    /// Deletes one row under an exclusive lock held to commit.
    ///
    /// Returns whether a live version existed to delete; deleting an
    /// absent row is not a fault.
    fn delete(&self, ctx: &PolicyContext<'_>, row: &RowId) -> Result<bool, WaitAbort> {
        ctx.locks.acquire(ctx.tx, row, LockMode::Exclusive)?;
        Ok(ctx.versions.mark_pending_delete(row, ctx.tx))
    }
}

#[cfg(test)]
mod tests {
    use super::super::levels::policy_for;
    use super::*;
    use std::time::Duration;

    struct Fixture {
        locks: LockManager,
        versions: VersionStore,
    }

    impl Fixture {
        /// A short lock timeout turns "would block forever" into an
        /// observable error, keeping these tests single-threaded.
        fn new() -> Self {
            Self {
                locks: LockManager::new(Some(Duration::from_millis(50))),
                versions: VersionStore::new(),
            }
        }

        fn ctx(&self, tx: TxId, snapshot: CommitSeq) -> PolicyContext<'_> {
            PolicyContext {
                tx,
                snapshot,
                locks: &self.locks,
                versions: &self.versions,
            }
        }

        /// Installs a committed row outside any policy flow.
        fn seed(&self, key: &str, value: Value, tx: u64, seq: u64) {
            let row = RowId::new(key);
            self.versions.create_version(row.clone(), value, TxId::new(tx));
            self.versions
                .mark_committed(TxId::new(tx), CommitSeq::new(seq), [&row]);
        }
    }

    fn row(key: &str) -> RowId {
        RowId::new(key)
    }

    #[test]
    fn read_uncommitted_sees_pending_writes_without_locking() {
        let fixture = Fixture::new();
        let writer = fixture.ctx(TxId::new(1), CommitSeq::ZERO);
        policy_for(IsolationLevel::ReadUncommitted)
            .write(&writer, &row("acct"), Value::Integer(100))
            .unwrap();

        let reader = fixture.ctx(TxId::new(2), CommitSeq::ZERO);
        let policy = policy_for(IsolationLevel::ReadUncommitted);
        assert_eq!(
            policy.read(&reader, &row("acct")).unwrap(),
            Some(Value::Integer(100))
        );
        assert!(fixture.locks.locks_held(TxId::new(2)).is_empty());
    }

    #[test]
    fn read_committed_sees_only_committed_and_drops_its_lock() {
        let fixture = Fixture::new();
        fixture.seed("acct", Value::Integer(20), 1, 1);
        let writer = fixture.ctx(TxId::new(2), CommitSeq::new(1));
        policy_for(IsolationLevel::ReadCommitted)
            .write(&writer, &row("acct"), Value::Integer(120))
            .unwrap();
        fixture.locks.release_all(TxId::new(2));

        let reader = fixture.ctx(TxId::new(3), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::ReadCommitted);
        assert_eq!(
            policy.read(&reader, &row("acct")).unwrap(),
            Some(Value::Integer(20))
        );
        assert!(fixture.locks.locks_held(TxId::new(3)).is_empty());
    }

    #[test]
    fn eager_release_never_surrenders_a_write_lock() {
        let fixture = Fixture::new();
        fixture.seed("acct", Value::Integer(20), 1, 1);
        let ctx = fixture.ctx(TxId::new(2), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::ReadCommitted);
        policy.write(&ctx, &row("acct"), Value::Integer(30)).unwrap();
        policy.read(&ctx, &row("acct")).unwrap();
        assert_eq!(
            fixture.locks.locks_held(TxId::new(2)),
            vec![(row("acct"), LockMode::Exclusive)]
        );
    }

    #[test]
    fn repeatable_read_pins_rows_that_predate_the_snapshot() {
        let fixture = Fixture::new();
        fixture.seed("acct", Value::Integer(20), 1, 1);
        fixture.seed("acct", Value::Integer(99), 2, 2);

        let reader = fixture.ctx(TxId::new(3), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::RepeatableRead);
        assert_eq!(
            policy.read(&reader, &row("acct")).unwrap(),
            Some(Value::Integer(20))
        );
        // The shared lock stays until commit.
        assert_eq!(
            fixture.locks.locks_held(TxId::new(3)),
            vec![(row("acct"), LockMode::Shared)]
        );
    }

    #[test]
    fn repeatable_read_scan_picks_up_rows_born_after_the_snapshot() {
        let fixture = Fixture::new();
        fixture.seed("potatoes", Value::Integer(10), 1, 1);
        fixture.seed("raspberry", Value::Integer(100), 2, 2);

        let reader = fixture.ctx(TxId::new(3), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::RepeatableRead);
        let seen = policy.scan(&reader, &Predicate::any()).unwrap();
        assert_eq!(
            seen,
            vec![
                (row("potatoes"), Value::Integer(10)),
                (row("raspberry"), Value::Integer(100)),
            ]
        );
    }

    #[test]
    fn serializable_scan_installs_the_predicate_before_reading() {
        let fixture = Fixture::new();
        fixture.seed("potatoes", Value::Integer(10), 1, 1);

        let reader = fixture.ctx(TxId::new(2), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::Serializable);
        let seen = policy
            .scan(&reader, &Predicate::new("all stock", |_, _| true))
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(fixture.locks.predicate_count(), 1);
    }

    #[test]
    fn scan_filters_rows_and_skips_deleted_ones() {
        let fixture = Fixture::new();
        fixture.seed("potatoes", Value::Integer(10), 1, 1);
        fixture.seed("bread", Value::Integer(5), 1, 1);
        let deleter = fixture.ctx(TxId::new(2), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::ReadCommitted);
        policy.delete(&deleter, &row("bread")).unwrap();
        fixture.versions.mark_committed(
            TxId::new(2),
            CommitSeq::new(2),
            [&row("bread")],
        );
        fixture.locks.release_all(TxId::new(2));

        let reader = fixture.ctx(TxId::new(3), CommitSeq::new(2));
        let seen = policy
            .scan(
                &reader,
                &Predicate::new("small stock", |_, value| {
                    value.as_integer().is_some_and(|n| n <= 10)
                }),
            )
            .unwrap();
        assert_eq!(seen, vec![(row("potatoes"), Value::Integer(10))]);
    }

    #[test]
    fn insert_gate_consults_other_transactions_predicates() {
        let fixture = Fixture::new();
        fixture.seed("potatoes", Value::Integer(10), 1, 1);
        fixture.locks.register_predicate(
            TxId::new(2),
            Predicate::new("all stock", |_, _| true),
        );

        let writer = fixture.ctx(TxId::new(3), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::ReadCommitted);

        // Updating an existing row is not an insert; the gate is not
        // consulted and the write proceeds.
        assert!(policy
            .write(&writer, &row("potatoes"), Value::Integer(9))
            .is_ok());

        // A brand-new row is an insert and times out against the gate.
        assert_eq!(
            policy.write(&writer, &row("raspberry"), Value::Integer(100)),
            Err(WaitAbort::Timeout)
        );

        // The registering transaction itself is never gated.
        let owner = fixture.ctx(TxId::new(2), CommitSeq::new(1));
        assert!(policy.write(&owner, &row("beans"), Value::Integer(3)).is_ok());
    }

    #[test]
    fn delete_reports_whether_the_row_existed() {
        let fixture = Fixture::new();
        fixture.seed("acct", Value::Integer(20), 1, 1);
        let ctx = fixture.ctx(TxId::new(2), CommitSeq::new(1));
        let policy = policy_for(IsolationLevel::RepeatableRead);
        assert!(policy.delete(&ctx, &row("acct")).unwrap());
        assert!(!policy.delete(&ctx, &row("missing")).unwrap());
    }
}
