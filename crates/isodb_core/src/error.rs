//! Error types for the isodb engine.

use thiserror::Error;

use crate::txn::TransactionStatus;
use crate::types::{RowId, TxId};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
///
/// Blocking is never an error: a lock wait or a predicate-clearance wait
/// suspends the calling thread. Only state-machine violations and
/// detected deadlocks surface here. Row absence is not an error either;
/// reads return `None` and deletes report `false`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation on a transaction that is no longer active.
    ///
    /// This is a programmer error (using a handle after commit or
    /// rollback) and is not retried.
    #[error("transaction {txid} is not active (status: {status})")]
    TransactionNotActive {
        /// The transaction the operation was issued against.
        txid: TxId,
        /// Its terminal status.
        status: TransactionStatus,
    },

    /// Operation on a transaction already taken as a deadlock victim.
    ///
    /// The transaction's work has been rolled back; the caller may retry
    /// with a fresh `begin`.
    #[error("transaction {txid} was aborted as a deadlock victim")]
    TransactionAborted {
        /// The victimized transaction.
        txid: TxId,
    },

    /// The engine chose this transaction as the cycle-breaking victim.
    ///
    /// The victim's partial work has already been rolled back when this
    /// error returns; the error names the victim so the caller can
    /// decide to retry.
    #[error("deadlock detected: {victim} aborted to break the cycle")]
    DeadlockDetected {
        /// The transaction that was aborted.
        victim: TxId,
    },

    /// A lock wait exceeded the configured backstop timeout.
    ///
    /// Only raised when `Config::lock_wait_timeout` is set. Treated like
    /// a deadlock victimization: the waiter is rolled back before the
    /// error returns.
    #[error("lock wait timed out: {txid} waiting for row '{row}'")]
    LockWaitTimeout {
        /// The transaction whose wait expired.
        txid: TxId,
        /// The row it was waiting for.
        row: RowId,
    },
}

impl EngineError {
    /// Creates a not-active error.
    #[must_use]
    pub fn not_active(txid: TxId, status: TransactionStatus) -> Self {
        Self::TransactionNotActive { txid, status }
    }

    /// Creates an aborted-transaction error.
    #[must_use]
    pub fn aborted(txid: TxId) -> Self {
        Self::TransactionAborted { txid }
    }

    /// Creates a deadlock error naming the victim.
    #[must_use]
    pub fn deadlock(victim: TxId) -> Self {
        Self::DeadlockDetected { victim }
    }

    /// Creates a lock-wait timeout error.
    #[must_use]
    pub fn lock_timeout(txid: TxId, row: RowId) -> Self {
        Self::LockWaitTimeout { txid, row }
    }
}
