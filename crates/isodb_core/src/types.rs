//! Core type definitions for isodb.

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub u64);

impl TxId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// Sequence number assigned at commit.
///
/// Commit sequences provide total ordering of committed transactions.
/// Higher sequence numbers indicate later commits. Sequence zero is the
/// floor: no transaction has committed at or before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitSeq(pub u64);

impl CommitSeq {
    /// The floor sequence, before any commit.
    pub const ZERO: Self = Self(0);

    /// Creates a new commit sequence.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next commit sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommitSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Stable identifier for a logical row.
///
/// Row IDs are caller-supplied primary-key values. They order
/// lexicographically, so scans enumerate rows deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(String);

impl RowId {
    /// Creates a row ID from a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RowId {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for RowId {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The isolation level a transaction runs under, chosen at begin.
///
/// Levels order from weakest to strongest. Each level is defined by the
/// anomalies it permits rather than by its mechanism: a weaker level is
/// not "broken", it trades consistency for concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IsolationLevel {
    /// No read locks, no snapshot. Reads observe the newest version even
    /// if its writer has not committed. Permits dirty reads,
    /// non-repeatable reads, and phantoms.
    ReadUncommitted,
    /// Reads take a shared lock for the duration of the statement and
    /// observe the latest committed version at that instant. Forbids
    /// dirty reads; permits non-repeatable reads and phantoms.
    ReadCommitted,
    /// Reads are served from a snapshot fixed when the transaction
    /// begins, and shared locks are held to transaction end. Forbids
    /// dirty and non-repeatable reads; permits phantoms (rows that did
    /// not exist at snapshot time carry no visibility promise).
    RepeatableRead,
    /// Snapshot reads plus predicate locks registered by every scan.
    /// Conflicting inserts block until the scanning transaction ends.
    /// Forbids all three anomalies; outcomes are equivalent to some
    /// serial order.
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL-style name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl Default for IsolationLevel {
    /// Defaults to `RepeatableRead`, the connection default of the
    /// engine this store models.
    fn default() -> Self {
        Self::RepeatableRead
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "readuncommitted" => Ok(Self::ReadUncommitted),
            "readcommitted" => Ok(Self::ReadCommitted),
            "repeatableread" => Ok(Self::RepeatableRead),
            "serializable" => Ok(Self::Serializable),
            _ => Err(format!("unknown isolation level: {s}")),
        }
    }
}

/// The mode of a row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Held by readers. Compatible with other shared locks.
    Shared,
    /// Held by writers. Incompatible with every other lock.
    Exclusive,
}

impl LockMode {
    /// Returns whether a lock in `self` mode can coexist with one held
    /// in `other` mode by a different transaction.
    #[must_use]
    pub const fn compatible_with(self, other: Self) -> bool {
        matches!((self, other), (Self::Shared, Self::Shared))
    }

    /// Returns whether this mode grants at least the access of `other`.
    #[must_use]
    pub const fn covers(self, other: Self) -> bool {
        match self {
            Self::Exclusive => true,
            Self::Shared => matches!(other, Self::Shared),
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("S"),
            Self::Exclusive => f.write_str("X"),
        }
    }
}
