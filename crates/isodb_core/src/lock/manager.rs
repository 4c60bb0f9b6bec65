//! The lock table: row locks, wait queues, and predicate gating.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::types::{LockMode, RowId, TxId};
use crate::value::Value;

use super::deadlock::{choose_victim, WaitForGraph};
use super::predicate::{Predicate, PredicateLock};

/// Result of an acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Granted {
    /// The lock was granted (or upgraded) by this call. Statement-level
    /// release applies only to these.
    New,
    /// The transaction already held a covering lock; nothing to release
    /// at statement end.
    AlreadyHeld,
}

/// Why a blocking call gave up instead of proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitAbort {
    /// The waiter was chosen as the deadlock victim.
    Deadlock,
    /// The owning transaction was rolled back while it waited.
    Cancelled,
    /// The configured backstop timeout expired.
    Timeout,
}

/// A wound mark placed on a parked waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WoundReason {
    Deadlock,
    Cancelled,
}

impl From<WoundReason> for WaitAbort {
    fn from(reason: WoundReason) -> Self {
        match reason {
            WoundReason::Deadlock => Self::Deadlock,
            WoundReason::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedRequest {
    tx: TxId,
    mode: LockMode,
}

#[derive(Debug, Default)]
struct RowLockState {
    holders: HashMap<TxId, LockMode>,
    queue: VecDeque<QueuedRequest>,
}

#[derive(Debug)]
enum WaitTarget {
    Row { row: RowId, mode: LockMode },
    Predicate { row: RowId, value: Value },
}

#[derive(Debug)]
struct WaitRecord {
    target: WaitTarget,
    ticket: u64,
    wound: Option<WoundReason>,
}

#[derive(Debug, Default)]
struct LockState {
    rows: HashMap<RowId, RowLockState>,
    predicates: Vec<PredicateLock>,
    waits: HashMap<TxId, WaitRecord>,
    next_ticket: u64,
}

/// Row-level lock table with FIFO wait queues and predicate gating.
///
/// All state lives under one mutex; blocking callers park on a condvar
/// that releases it, so no internal lock is ever held across a wait.
/// Deadlock detection derives a wait-for graph from the table whenever
/// a caller is about to park, covering row waits and predicate waits
/// uniformly.
///
/// A transaction issues at most one blocking call at a time; handles
/// are not meant to be driven from two threads at once.
#[derive(Debug)]
pub(crate) struct LockManager {
    state: Mutex<LockState>,
    changed: Condvar,
    wait_timeout: Option<Duration>,
}

impl LockManager {
    pub(crate) fn new(wait_timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
            wait_timeout,
        }
    }

    /// Acquires `mode` on `row` for `tx`, blocking while conflicting
    /// locks are held.
    ///
    /// Returns `AlreadyHeld` when a covering lock was granted earlier;
    /// upgrades (Shared held, Exclusive wanted) wait ahead of the
    /// regular queue so they cannot starve behind requests that need
    /// their shared lock gone.
    pub(crate) fn acquire(
        &self,
        tx: TxId,
        row: &RowId,
        mode: LockMode,
    ) -> Result<Granted, WaitAbort> {
        let mut state = self.state.lock();

        if let Some(held) = state.rows.get(row).and_then(|entry| entry.holders.get(&tx)) {
            if held.covers(mode) {
                return Ok(Granted::AlreadyHeld);
            }
        }

        if Self::grantable(&state, tx, row, mode) {
            state
                .rows
                .entry(row.clone())
                .or_default()
                .holders
                .insert(tx, mode);
            return Ok(Granted::New);
        }

        let upgrading = state
            .rows
            .get(row)
            .is_some_and(|entry| entry.holders.contains_key(&tx));
        let entry = state.rows.entry(row.clone()).or_default();
        let request = QueuedRequest { tx, mode };
        if upgrading {
            entry.queue.push_front(request);
        } else {
            entry.queue.push_back(request);
        }

        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.waits.insert(
            tx,
            WaitRecord {
                target: WaitTarget::Row {
                    row: row.clone(),
                    mode,
                },
                ticket,
                wound: None,
            },
        );
        debug!(waiter = %tx, row = %row, mode = %mode, "blocked on row lock");
        self.detect(&mut state, tx);

        let deadline = self.wait_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(reason) = state.waits.get(&tx).and_then(|record| record.wound) {
                Self::abandon_wait(&mut state, tx, row);
                self.changed.notify_all();
                return Err(reason.into());
            }
            if state
                .rows
                .get(row)
                .and_then(|entry| entry.holders.get(&tx))
                .is_some_and(|held| held.covers(mode))
            {
                // A release sweep granted us and removed the wait record.
                return Ok(Granted::New);
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        Self::abandon_wait(&mut state, tx, row);
                        self.changed.notify_all();
                        return Err(WaitAbort::Timeout);
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    /// Releases one row lock (statement-level release).
    pub(crate) fn release(&self, tx: TxId, row: &RowId) {
        let mut state = self.state.lock();
        let removed = state
            .rows
            .get_mut(row)
            .and_then(|entry| entry.holders.remove(&tx))
            .is_some();
        if removed {
            trace!(holder = %tx, row = %row, "lock released");
            Self::grant_waiters(&mut state, row);
            Self::cleanup_row(&mut state, row);
            self.changed.notify_all();
        }
    }

    /// Releases every lock and predicate owned by `tx` and wakes
    /// whoever can now proceed.
    pub(crate) fn release_all(&self, tx: TxId) {
        let mut state = self.state.lock();
        let rows: Vec<RowId> = state
            .rows
            .iter()
            .filter(|(_, entry)| {
                entry.holders.contains_key(&tx)
                    || entry.queue.iter().any(|request| request.tx == tx)
            })
            .map(|(row, _)| row.clone())
            .collect();
        for row in &rows {
            if let Some(entry) = state.rows.get_mut(row) {
                entry.holders.remove(&tx);
                entry.queue.retain(|request| request.tx != tx);
            }
            Self::grant_waiters(&mut state, row);
            Self::cleanup_row(&mut state, row);
        }
        state.predicates.retain(|lock| lock.owner != tx);
        if !rows.is_empty() {
            trace!(owner = %tx, rows = rows.len(), "released all locks");
        }
        self.changed.notify_all();
    }

    /// Registers a predicate lock for `tx`, gating matching inserts
    /// until `release_all`.
    pub(crate) fn register_predicate(&self, tx: TxId, predicate: Predicate) {
        let mut state = self.state.lock();
        debug!(owner = %tx, filter = %predicate, "predicate lock registered");
        state.predicates.push(PredicateLock {
            owner: tx,
            predicate,
        });
    }

    /// Blocks an insertion of `row`/`value` while any live predicate
    /// lock of another transaction matches it.
    pub(crate) fn wait_predicates_clear(
        &self,
        tx: TxId,
        row: &RowId,
        value: &Value,
    ) -> Result<(), WaitAbort> {
        let mut state = self.state.lock();
        if !Self::predicate_blocked(&state, tx, row, value) {
            return Ok(());
        }

        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.waits.insert(
            tx,
            WaitRecord {
                target: WaitTarget::Predicate {
                    row: row.clone(),
                    value: value.clone(),
                },
                ticket,
                wound: None,
            },
        );
        debug!(waiter = %tx, row = %row, "insert blocked by predicate lock");
        self.detect(&mut state, tx);

        let deadline = self.wait_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(reason) = state.waits.get(&tx).and_then(|record| record.wound) {
                state.waits.remove(&tx);
                self.changed.notify_all();
                return Err(reason.into());
            }
            if !Self::predicate_blocked(&state, tx, row, value) {
                state.waits.remove(&tx);
                return Ok(());
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        state.waits.remove(&tx);
                        self.changed.notify_all();
                        return Err(WaitAbort::Timeout);
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    /// Wakes and fails whatever wait `tx` is parked in.
    ///
    /// Used by rollback: a blocked acquire must be interruptible from
    /// another thread.
    pub(crate) fn cancel_waits(&self, tx: TxId) {
        let mut state = self.state.lock();
        if let Some(record) = state.waits.get_mut(&tx) {
            if record.wound.is_none() {
                record.wound = Some(WoundReason::Cancelled);
            }
            self.changed.notify_all();
        }
    }

    /// The row locks `tx` currently holds, in key order.
    pub(crate) fn locks_held(&self, tx: TxId) -> Vec<(RowId, LockMode)> {
        let state = self.state.lock();
        let mut held: Vec<(RowId, LockMode)> = state
            .rows
            .iter()
            .filter_map(|(row, entry)| entry.holders.get(&tx).map(|&mode| (row.clone(), mode)))
            .collect();
        held.sort_by(|a, b| a.0.cmp(&b.0));
        held
    }

    /// Number of live predicate locks.
    pub(crate) fn predicate_count(&self) -> usize {
        self.state.lock().predicates.len()
    }

    /// Whether `tx` is currently parked in a row or predicate wait.
    pub(crate) fn is_waiting(&self, tx: TxId) -> bool {
        self.state.lock().waits.contains_key(&tx)
    }

    fn grantable(state: &LockState, tx: TxId, row: &RowId, mode: LockMode) -> bool {
        let Some(entry) = state.rows.get(row) else {
            return true;
        };
        let with_holders = entry
            .holders
            .iter()
            .all(|(&holder, &held)| holder == tx || mode.compatible_with(held));
        if !with_holders {
            return false;
        }
        if entry.holders.contains_key(&tx) {
            // Upgrade: compatible with every other holder, take it now.
            return true;
        }
        entry.queue.is_empty()
    }

    /// Sweeps a row's queue from the front, granting the head and any
    /// contiguous run of compatible requests behind it.
    fn grant_waiters(state: &mut LockState, row: &RowId) {
        let mut granted = Vec::new();
        if let Some(entry) = state.rows.get_mut(row) {
            while let Some(front) = entry.queue.front() {
                let (next, mode) = (front.tx, front.mode);
                let compatible = entry
                    .holders
                    .iter()
                    .all(|(&holder, &held)| holder == next || mode.compatible_with(held));
                if !compatible {
                    break;
                }
                entry.holders.insert(next, mode);
                entry.queue.pop_front();
                granted.push(next);
            }
        }
        for tx in granted {
            state.waits.remove(&tx);
            trace!(holder = %tx, row = %row, "lock granted from queue");
        }
    }

    fn cleanup_row(state: &mut LockState, row: &RowId) {
        if state
            .rows
            .get(row)
            .is_some_and(|entry| entry.holders.is_empty() && entry.queue.is_empty())
        {
            state.rows.remove(row);
        }
    }

    fn abandon_wait(state: &mut LockState, tx: TxId, row: &RowId) {
        if let Some(entry) = state.rows.get_mut(row) {
            entry.queue.retain(|request| request.tx != tx);
        }
        state.waits.remove(&tx);
        Self::grant_waiters(state, row);
        Self::cleanup_row(state, row);
    }

    fn predicate_blocked(state: &LockState, tx: TxId, row: &RowId, value: &Value) -> bool {
        state
            .predicates
            .iter()
            .any(|lock| lock.owner != tx && lock.predicate.matches(row, value))
    }

    /// Builds the wait-for graph and wounds the victim of any cycle
    /// reachable from `tx`.
    fn detect(&self, state: &mut LockState, tx: TxId) {
        let graph = Self::wait_graph(state);
        let Some(cycle) = graph.find_cycle(tx) else {
            return;
        };
        let tickets: HashMap<TxId, u64> = state
            .waits
            .iter()
            .map(|(&waiter, record)| (waiter, record.ticket))
            .collect();
        let Some(victim) = choose_victim(&cycle, &tickets) else {
            return;
        };
        debug!(%victim, members = ?cycle, "deadlock cycle detected");
        if let Some(record) = state.waits.get_mut(&victim) {
            if record.wound.is_none() {
                record.wound = Some(WoundReason::Deadlock);
            }
        }
        self.changed.notify_all();
    }

    fn wait_graph(state: &LockState) -> WaitForGraph {
        let mut graph = WaitForGraph::new();
        for (&waiter, record) in &state.waits {
            match &record.target {
                WaitTarget::Row { row, mode } => {
                    if let Some(entry) = state.rows.get(row) {
                        for (&holder, &held) in &entry.holders {
                            if holder != waiter && !mode.compatible_with(held) {
                                graph.add_edge(waiter, holder);
                            }
                        }
                        // FIFO also gates us behind earlier incompatible
                        // requests.
                        for request in &entry.queue {
                            if request.tx == waiter {
                                break;
                            }
                            if !mode.compatible_with(request.mode) {
                                graph.add_edge(waiter, request.tx);
                            }
                        }
                    }
                }
                WaitTarget::Predicate { row, value } => {
                    for lock in &state.predicates {
                        if lock.owner != waiter && lock.predicate.matches(row, value) {
                            graph.add_edge(waiter, lock.owner);
                        }
                    }
                }
            }
        }
        graph
    }
}

#[cfg(test)]
impl LockManager {
    fn queue_len(&self, row: &RowId) -> usize {
        self.state
            .lock()
            .rows
            .get(row)
            .map_or(0, |entry| entry.queue.len())
    }

    fn held_mode(&self, tx: TxId, row: &RowId) -> Option<LockMode> {
        self.state
            .lock()
            .rows
            .get(row)
            .and_then(|entry| entry.holders.get(&tx).copied())
    }
}
