//! Transaction manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::isolation::{policy_for, IsolationPolicy, PolicyContext};
use crate::lock::{LockManager, Predicate, WaitAbort};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::types::{CommitSeq, IsolationLevel, LockMode, RowId, TxId};
use crate::value::Value;
use crate::version::{RowVersion, VersionStore};

use super::state::{AbortReason, Transaction, TransactionStatus, TxHandle};

/// The transaction engine: begin, operate, commit or roll back.
///
/// The manager owns the version store and the lock table and drives
/// both through the isolation policy of each transaction. It provides:
/// - transactions at any of the four isolation levels, concurrently
/// - strict two-phase locking with FIFO waits and deadlock victims
/// - commit ordering via a single commit sequence
/// - rollback of a blocked transaction from another thread
///
/// Handles are copyable tokens; all state lives here, guarded by the
/// internal registry. Methods take `&self`, so an `Arc` of the manager
/// is all concurrent callers need.
pub struct TransactionManager {
    versions: VersionStore,
    locks: LockManager,
    /// Every transaction ever begun; terminal records stay so that a
    /// stale handle still reports why it cannot be used.
    registry: RwLock<HashMap<TxId, Transaction>>,
    next_txid: AtomicU64,
    /// Published after a committer has stamped its versions, so a
    /// snapshot taken from it never sees a half-applied commit.
    committed_seq: AtomicU64,
    /// One committer at a time.
    commit_lock: Mutex<()>,
    stats: EngineStats,
    config: Config,
}

impl TransactionManager {
    /// Creates an empty engine with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            versions: VersionStore::new(),
            locks: LockManager::new(config.lock_wait_timeout),
            registry: RwLock::new(HashMap::new()),
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            stats: EngineStats::new(),
            config,
        }
    }

    /// Begins a transaction at `level`.
    ///
    /// The snapshot is fixed here, not at the first read.
    pub fn begin(&self, level: IsolationLevel) -> TxHandle {
        let txid = TxId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let snapshot = CommitSeq::new(self.committed_seq.load(Ordering::SeqCst));
        self.registry
            .write()
            .insert(txid, Transaction::new(level, snapshot));
        self.stats.record_begin();
        debug!(%txid, %level, %snapshot, "transaction begun");
        TxHandle::new(txid, level, snapshot)
    }

    /// Begins a transaction at the configured default level.
    pub fn begin_default(&self) -> TxHandle {
        self.begin(self.config.default_isolation)
    }

    /// Reads one row under the transaction's isolation level.
    ///
    /// Absent rows read as `None`; that is not a fault. Blocks while a
    /// conflicting lock is held.
    pub fn read(&self, tx: TxHandle, row: &RowId) -> EngineResult<Option<Value>> {
        let txid = tx.id();
        let (policy, ctx) = self.statement(txid)?;
        match policy.read(&ctx, row) {
            Ok(value) => self.finish_read(txid, value),
            Err(abort) => Err(self.statement_failed(txid, abort, row)),
        }
    }

    /// Writes one row (insert or update) under an exclusive lock held
    /// until commit.
    pub fn write(&self, tx: TxHandle, row: &RowId, value: Value) -> EngineResult<()> {
        let txid = tx.id();
        let (policy, ctx) = self.statement(txid)?;
        match policy.write(&ctx, row, value) {
            Ok(()) => self.record_write(txid, row),
            Err(abort) => Err(self.statement_failed(txid, abort, row)),
        }
    }

    /// Deletes one row, reporting whether it existed.
    pub fn delete(&self, tx: TxHandle, row: &RowId) -> EngineResult<bool> {
        let txid = tx.id();
        let (policy, ctx) = self.statement(txid)?;
        match policy.delete(&ctx, row) {
            Ok(existed) => self.record_write(txid, row).map(|()| existed),
            Err(abort) => Err(self.statement_failed(txid, abort, row)),
        }
    }

    /// Returns every row whose current value matches `predicate`, in
    /// key order.
    ///
    /// Under `Serializable` the predicate stays registered until the
    /// transaction finishes, gating conflicting inserts.
    pub fn scan(&self, tx: TxHandle, predicate: &Predicate) -> EngineResult<Vec<(RowId, Value)>> {
        let txid = tx.id();
        let (policy, ctx) = self.statement(txid)?;
        match policy.scan(&ctx, predicate) {
            Ok(rows) => self.finish_read(txid, rows),
            Err(failed) => Err(self.statement_failed(txid, failed.abort, &failed.row)),
        }
    }

    /// Commits the transaction, making all its writes visible as one
    /// unit under the returned commit sequence.
    pub fn commit(&self, tx: TxHandle) -> EngineResult<CommitSeq> {
        let txid = tx.id();
        let _commit_guard = self.commit_lock.lock();
        let mut registry = self.registry.write();
        let record = match registry.get_mut(&txid) {
            Some(record) if record.is_active() => record,
            Some(record) => return Err(terminal_error(txid, record)),
            None => return Err(unknown_handle(txid)),
        };

        // Stamp first, publish the sequence second: a snapshot taken
        // from `committed_seq` must never see part of this commit.
        let seq = CommitSeq::new(self.committed_seq.load(Ordering::SeqCst)).next();
        let rows: Vec<RowId> = record.write_rows().cloned().collect();
        self.versions.mark_committed(txid, seq, rows.iter());
        self.committed_seq.store(seq.as_u64(), Ordering::SeqCst);
        record.mark_committed();
        drop(registry);

        self.locks.release_all(txid);
        self.stats.record_commit();
        debug!(%txid, %seq, rows = rows.len(), "transaction committed");
        Ok(seq)
    }

    /// Rolls the transaction back, discarding all its writes.
    ///
    /// May be called from any thread; a transaction blocked in a lock
    /// wait is woken and its pending statement fails.
    pub fn rollback(&self, tx: TxHandle) -> EngineResult<()> {
        let txid = tx.id();
        {
            let registry = self.registry.read();
            match registry.get(&txid) {
                Some(record) if record.is_active() => {}
                Some(record) => return Err(terminal_error(txid, record)),
                None => return Err(unknown_handle(txid)),
            }
        }
        self.rollback_as(txid, AbortReason::Requested);
        Ok(())
    }

    /// Returns the current committed sequence.
    #[must_use]
    pub fn committed_seq(&self) -> CommitSeq {
        CommitSeq::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Returns the number of active transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry
            .read()
            .values()
            .filter(|record| record.is_active())
            .count()
    }

    /// Returns the transaction's current status.
    #[must_use]
    pub fn status(&self, tx: TxHandle) -> TransactionStatus {
        self.registry
            .read()
            .get(&tx.id())
            .map_or(TransactionStatus::RolledBack, Transaction::status)
    }

    /// Returns the row locks the transaction currently holds, in key
    /// order.
    #[must_use]
    pub fn locks_held(&self, tx: TxHandle) -> Vec<(RowId, LockMode)> {
        self.locks.locks_held(tx.id())
    }

    /// Whether the transaction is parked in a row or predicate wait.
    #[must_use]
    pub fn is_blocked(&self, tx: TxHandle) -> bool {
        self.locks.is_waiting(tx.id())
    }

    /// All row identifiers with any version, in key order.
    #[must_use]
    pub fn row_ids(&self) -> Vec<RowId> {
        self.versions.row_ids()
    }

    /// The full version chain of one row, oldest first.
    #[must_use]
    pub fn versions(&self, row: &RowId) -> Vec<RowVersion> {
        self.versions.versions(row)
    }

    /// Returns a snapshot of the engine counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drops version history no active snapshot can reach, returning
    /// the number of versions discarded.
    ///
    /// The horizon is the oldest active transaction's snapshot, or the
    /// current committed sequence when nothing is active.
    pub fn prune_versions(&self) -> usize {
        let registry = self.registry.read();
        let horizon = registry
            .values()
            .filter(|record| record.is_active())
            .map(Transaction::snapshot)
            .min()
            .unwrap_or_else(|| self.committed_seq());
        drop(registry);

        let pruned = self.versions.prune(horizon);
        if pruned > 0 {
            debug!(%horizon, pruned, "version history pruned");
        }
        pruned
    }

    /// Resolves an active transaction into its policy and statement
    /// context. The registry lock is not held in the returned context,
    /// so the statement may block freely.
    fn statement(
        &self,
        txid: TxId,
    ) -> EngineResult<(&'static dyn IsolationPolicy, PolicyContext<'_>)> {
        let registry = self.registry.read();
        let (level, snapshot) = match registry.get(&txid) {
            Some(record) if record.is_active() => (record.level(), record.snapshot()),
            Some(record) => return Err(terminal_error(txid, record)),
            None => return Err(unknown_handle(txid)),
        };
        Ok((
            policy_for(level),
            PolicyContext {
                tx: txid,
                snapshot,
                locks: &self.locks,
                versions: &self.versions,
            },
        ))
    }

    /// Admits a completed read, unless the transaction was rolled back
    /// from another thread while its statement ran.
    fn finish_read<T>(&self, txid: TxId, value: T) -> EngineResult<T> {
        let registry = self.registry.read();
        match registry.get(&txid) {
            Some(record) if record.is_active() => Ok(value),
            Some(record) => Err(terminal_error(txid, record)),
            None => Err(unknown_handle(txid)),
        }
    }

    /// Adds `row` to the write set after a successful write statement.
    ///
    /// When a concurrent rollback finished the transaction while the
    /// statement ran, its sweep predates the new version, so the
    /// version is undone here and the rollback error surfaces instead.
    fn record_write(&self, txid: TxId, row: &RowId) -> EngineResult<()> {
        let mut registry = self.registry.write();
        match registry.get_mut(&txid) {
            Some(record) if record.is_active() => {
                record.track_write(row.clone());
                Ok(())
            }
            other => {
                let error = match other {
                    Some(record) => terminal_error(txid, record),
                    None => unknown_handle(txid),
                };
                drop(registry);
                self.versions.mark_aborted(txid, [row]);
                self.locks.release_all(txid);
                Err(error)
            }
        }
    }

    /// Maps a failed wait to its engine error, rolling the transaction
    /// back when the failure demands it.
    fn statement_failed(&self, txid: TxId, abort: WaitAbort, row: &RowId) -> EngineError {
        match abort {
            WaitAbort::Deadlock => {
                warn!(victim = %txid, %row, "deadlock victim; rolling back");
                self.rollback_as(txid, AbortReason::Deadlock);
                EngineError::deadlock(txid)
            }
            WaitAbort::Timeout => {
                warn!(%txid, %row, "lock wait timed out; rolling back");
                self.rollback_as(txid, AbortReason::Timeout);
                EngineError::lock_timeout(txid, row.clone())
            }
            WaitAbort::Cancelled => {
                // The rollback that woke us has already cleaned up;
                // report the transaction's terminal state.
                let registry = self.registry.read();
                match registry.get(&txid) {
                    Some(record) => terminal_error(txid, record),
                    None => unknown_handle(txid),
                }
            }
        }
    }

    /// Rolls back unconditionally-active `txid` for `reason`; a no-op
    /// when the transaction is already terminal.
    fn rollback_as(&self, txid: TxId, reason: AbortReason) {
        let mut registry = self.registry.write();
        let Some(record) = registry.get_mut(&txid) else {
            return;
        };
        if !record.is_active() {
            return;
        }
        record.mark_rolled_back(reason);
        let rows: Vec<RowId> = record.write_rows().cloned().collect();
        drop(registry);

        // The status is terminal before the wakeup, so the woken
        // statement always observes a settled state.
        self.locks.cancel_waits(txid);
        self.versions.mark_aborted(txid, rows.iter());
        self.locks.release_all(txid);

        self.stats.record_rollback();
        if reason == AbortReason::Deadlock {
            self.stats.record_deadlock();
        }
        debug!(%txid, ?reason, rows = rows.len(), "transaction rolled back");
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}

fn terminal_error(txid: TxId, record: &Transaction) -> EngineError {
    if record.abort() == Some(AbortReason::Deadlock) {
        EngineError::aborted(txid)
    } else {
        EngineError::not_active(txid, record.status())
    }
}

/// Handles only come from `begin`, so a missing record means the
/// handle outlived an engine. Report it like any finished transaction.
fn unknown_handle(txid: TxId) -> EngineError {
    EngineError::not_active(txid, TransactionStatus::RolledBack)
}
