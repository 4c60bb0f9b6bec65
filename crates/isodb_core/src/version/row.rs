//! Row version records.

use crate::types::{CommitSeq, TxId};
use crate::value::Value;

/// One immutable snapshot of a row's content at a point in the commit
/// order.
///
/// A version is created pending (`created_seq` unset) and stamped when
/// its creator commits. It is superseded or deleted by marking
/// `deleted_by`, pending at first, then stamped with `deleted_seq` at
/// the deleter's commit. Aborting a transaction removes its pending
/// versions and clears its pending delete marks; no other field ever
/// changes after creation.
///
/// Because writers hold an exclusive row lock until they finish, all
/// pending marks on one chain belong to a single live transaction.
#[derive(Debug, Clone)]
pub struct RowVersion {
    value: Value,
    created_by: TxId,
    created_seq: Option<CommitSeq>,
    deleted_by: Option<TxId>,
    deleted_seq: Option<CommitSeq>,
}

impl RowVersion {
    /// Creates a pending version owned by `tx`.
    #[must_use]
    pub(crate) fn pending(value: Value, tx: TxId) -> Self {
        Self {
            value,
            created_by: tx,
            created_seq: None,
            deleted_by: None,
            deleted_seq: None,
        }
    }

    /// The stored payload.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The transaction that produced this version.
    #[must_use]
    pub fn created_by(&self) -> TxId {
        self.created_by
    }

    /// The commit sequence at which this version became visible, if its
    /// creator has committed.
    #[must_use]
    pub fn created_seq(&self) -> Option<CommitSeq> {
        self.created_seq
    }

    /// The transaction that superseded or deleted this version, if any.
    #[must_use]
    pub fn deleted_by(&self) -> Option<TxId> {
        self.deleted_by
    }

    /// The commit sequence at which the supersede/delete became visible.
    #[must_use]
    pub fn deleted_seq(&self) -> Option<CommitSeq> {
        self.deleted_seq
    }

    /// Whether the creator has committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.created_seq.is_some()
    }

    /// Whether this is the current committed version: committed and not
    /// superseded by any committed delete.
    ///
    /// A pending delete mark does not count; the delete is not visible
    /// until its transaction commits.
    #[must_use]
    pub fn is_current_committed(&self) -> bool {
        self.created_seq.is_some() && self.deleted_seq.is_none()
    }

    /// Whether this version is visible to a snapshot taken at `seq`:
    /// committed at or before it, and not deleted at or before it.
    #[must_use]
    pub fn visible_at(&self, seq: CommitSeq) -> bool {
        match self.created_seq {
            Some(created) if created <= seq => match self.deleted_seq {
                Some(deleted) => deleted > seq,
                None => true,
            },
            _ => false,
        }
    }

    pub(crate) fn mark_deleted_by(&mut self, tx: TxId) {
        self.deleted_by = Some(tx);
    }

    pub(crate) fn clear_pending_delete(&mut self, tx: TxId) {
        if self.deleted_by == Some(tx) && self.deleted_seq.is_none() {
            self.deleted_by = None;
        }
    }

    pub(crate) fn stamp(&mut self, tx: TxId, seq: CommitSeq) {
        if self.created_by == tx && self.created_seq.is_none() {
            self.created_seq = Some(seq);
        }
        if self.deleted_by == Some(tx) && self.deleted_seq.is_none() {
            self.deleted_seq = Some(seq);
        }
    }
}
