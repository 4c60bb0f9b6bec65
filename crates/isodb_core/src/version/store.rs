//! The version store: per-row chains read through visibility views.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::types::{CommitSeq, RowId, TxId};
use crate::value::Value;

use super::row::RowVersion;

/// How a reader picks a version out of a chain.
///
/// The view encodes the visibility half of an isolation level; locking
/// is layered on top by the isolation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadView {
    /// Newest version regardless of commit status, including pending
    /// writes and pending deletes of live transactions.
    Latest,
    /// Current committed version at the instant of the call. Pending
    /// marks of live transactions are ignored.
    LatestCommitted,
    /// Rows that had committed at or before the snapshot are read at the
    /// snapshot, for the reader's whole lifetime. Rows whose first
    /// commit postdates the snapshot did not exist when it was taken
    /// and carry no stability promise: they are read at
    /// latest-committed, fresh per call. This is the phantom gap:
    /// snapshot reads guarantee stability of already-visible rows, not
    /// stability of result-set cardinality.
    Snapshot(CommitSeq),
}

/// One row's append-only version chain, newest last.
#[derive(Debug, Default)]
struct VersionChain {
    versions: Vec<RowVersion>,
}

impl VersionChain {
    fn latest(&self) -> Option<&RowVersion> {
        self.versions.last()
    }

    fn current_committed(&self) -> Option<&RowVersion> {
        self.versions.iter().rev().find(|v| v.is_current_committed())
    }

    fn visible_at(&self, seq: CommitSeq) -> Option<&RowVersion> {
        self.versions.iter().rev().find(|v| v.visible_at(seq))
    }

    /// The sequence at which this row first existed, if any version has
    /// committed. Versions commit in chain order, so the first
    /// committed version in the chain carries it.
    fn first_committed_seq(&self) -> Option<CommitSeq> {
        self.versions.iter().find_map(RowVersion::created_seq)
    }

    fn read(&self, reader: TxId, view: ReadView) -> Option<&Value> {
        // Read-your-own-writes comes before any view rule: a pending
        // version or pending delete owned by the reader is always
        // visible to it.
        if let Some(last) = self.latest() {
            if last.created_by() == reader && !last.is_committed() {
                return if last.deleted_by() == Some(reader) {
                    None
                } else {
                    Some(last.value())
                };
            }
            if last.deleted_by() == Some(reader) && last.deleted_seq().is_none() {
                return None;
            }
        }

        match view {
            ReadView::Latest => {
                let last = self.latest()?;
                if last.deleted_by().is_some() {
                    None
                } else {
                    Some(last.value())
                }
            }
            ReadView::LatestCommitted => self.current_committed().map(RowVersion::value),
            ReadView::Snapshot(seq) => match self.first_committed_seq() {
                Some(first) if first <= seq => self.visible_at(seq).map(RowVersion::value),
                _ => self.current_committed().map(RowVersion::value),
            },
        }
    }
}

/// Owns every row version in the store.
///
/// The store is the leaf of the engine: it knows nothing about locks or
/// transactions beyond the identifiers stamped into versions. All
/// methods take `&self`; the chain map is guarded by a single `RwLock`
/// so commit stamping flips a transaction's versions into visibility
/// atomically with respect to readers.
#[derive(Debug, Default)]
pub struct VersionStore {
    chains: RwLock<BTreeMap<RowId, VersionChain>>,
}

impl VersionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pending version of `row` owned by `tx`, marking the
    /// version it supersedes as pending-deleted by the same
    /// transaction.
    ///
    /// The caller must hold the row's exclusive lock.
    pub fn create_version(&self, row: RowId, value: Value, tx: TxId) {
        let mut chains = self.chains.write();
        let chain = chains.entry(row).or_default();
        if let Some(prev) = chain
            .versions
            .iter_mut()
            .rev()
            .find(|v| v.deleted_by().is_none())
        {
            prev.mark_deleted_by(tx);
        }
        chain.versions.push(RowVersion::pending(value, tx));
    }

    /// Marks the row's newest live version as pending-deleted by `tx`.
    ///
    /// Returns `false` when there is nothing to delete: the row has no
    /// versions, its newest version is already deleted (committed or
    /// pending), or absence is all the caller would observe. The caller
    /// must hold the row's exclusive lock.
    pub fn mark_pending_delete(&self, row: &RowId, tx: TxId) -> bool {
        let mut chains = self.chains.write();
        let Some(chain) = chains.get_mut(row) else {
            return false;
        };
        let Some(last) = chain.versions.last_mut() else {
            return false;
        };
        if last.deleted_by().is_some() {
            return false;
        }
        if last.is_committed() || last.created_by() == tx {
            last.mark_deleted_by(tx);
            true
        } else {
            false
        }
    }

    /// Reads the version of `row` that `reader` should see under
    /// `view`, applying read-your-own-writes first.
    #[must_use]
    pub fn read(&self, row: &RowId, reader: TxId, view: ReadView) -> Option<Value> {
        self.chains
            .read()
            .get(row)
            .and_then(|chain| chain.read(reader, view))
            .cloned()
    }

    /// All row identifiers with any version, in key order.
    ///
    /// Scans enumerate this set and then read each row under the
    /// caller's view; rows invisible under the view simply read as
    /// absent.
    #[must_use]
    pub fn row_ids(&self) -> Vec<RowId> {
        self.chains.read().keys().cloned().collect()
    }

    /// Stamps all of `tx`'s pending versions and pending deletes in the
    /// given rows with `seq`, making them visible as one committed
    /// state.
    pub fn mark_committed<'a>(
        &self,
        tx: TxId,
        seq: CommitSeq,
        rows: impl IntoIterator<Item = &'a RowId>,
    ) {
        let mut chains = self.chains.write();
        for row in rows {
            if let Some(chain) = chains.get_mut(row) {
                for version in &mut chain.versions {
                    version.stamp(tx, seq);
                }
            }
        }
    }

    /// Discards `tx`'s pending versions and clears its pending delete
    /// marks in the given rows, as if the transaction never ran.
    pub fn mark_aborted<'a>(&self, tx: TxId, rows: impl IntoIterator<Item = &'a RowId>) {
        let mut chains = self.chains.write();
        for row in rows {
            if let Some(chain) = chains.get_mut(row) {
                chain
                    .versions
                    .retain(|v| v.is_committed() || v.created_by() != tx);
                for version in &mut chain.versions {
                    version.clear_pending_delete(tx);
                }
                if chain.versions.is_empty() {
                    chains.remove(row);
                }
            }
        }
    }

    /// Drops versions deleted at or before `horizon`, which no snapshot
    /// at or after it can reach, and removes rows left with no
    /// versions. Returns the number of versions dropped.
    pub fn prune(&self, horizon: CommitSeq) -> usize {
        let mut chains = self.chains.write();
        let mut dropped = 0;
        chains.retain(|_, chain| {
            let before = chain.versions.len();
            chain
                .versions
                .retain(|v| v.deleted_seq().map_or(true, |seq| seq > horizon));
            dropped += before - chain.versions.len();
            !chain.versions.is_empty()
        });
        dropped
    }

    /// A copy of the version chain for `row`, oldest first.
    ///
    /// Intended for presentation layers that print version state, and
    /// for tests; not part of the transactional read path.
    #[must_use]
    pub fn versions(&self, row: &RowId) -> Vec<RowVersion> {
        self.chains
            .read()
            .get(row)
            .map(|chain| chain.versions.clone())
            .unwrap_or_default()
    }

    /// Total number of retained versions across all rows.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.chains.read().values().map(|c| c.versions.len()).sum()
    }
}
