//! Predicate locks: where-clauses held as locks.

use std::fmt;
use std::sync::Arc;

use crate::types::{RowId, TxId};
use crate::value::Value;

/// A caller-supplied row filter.
///
/// Scans evaluate the predicate against every visible row. Under
/// Serializable the predicate is also registered with the lock manager,
/// where it gates concurrent inserts: a new row that would match a live
/// predicate may not come into existence until the registering
/// transaction ends.
///
/// The label names the filter in logs and lock listings; it carries no
/// semantics.
#[derive(Clone)]
pub struct Predicate {
    label: Arc<str>,
    test: Arc<dyn Fn(&RowId, &Value) -> bool + Send + Sync>,
}

impl Predicate {
    /// Creates a predicate from a filter closure.
    pub fn new(
        label: impl Into<String>,
        test: impl Fn(&RowId, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into().into(),
            test: Arc::new(test),
        }
    }

    /// A predicate matching every row.
    #[must_use]
    pub fn any() -> Self {
        Self::new("*", |_, _| true)
    }

    /// Evaluates the predicate against one row.
    #[must_use]
    pub fn matches(&self, row: &RowId, value: &Value) -> bool {
        (self.test)(row, value)
    }

    /// The human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.label)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A predicate registered by a live transaction.
#[derive(Debug, Clone)]
pub(crate) struct PredicateLock {
    pub owner: TxId,
    pub predicate: Predicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_evaluates_closure() {
        let pred = Predicate::new("price >= 50", |_, v| {
            v.get_integer("price").is_some_and(|p| p >= 50)
        });
        let cheap = Value::map(vec![("price".into(), Value::Integer(10))]);
        let dear = Value::map(vec![("price".into(), Value::Integer(100))]);

        assert!(!pred.matches(&RowId::new("potatoes"), &cheap));
        assert!(pred.matches(&RowId::new("raspberry"), &dear));
        assert_eq!(pred.label(), "price >= 50");
    }

    #[test]
    fn any_matches_everything() {
        let pred = Predicate::any();
        assert!(pred.matches(&RowId::new("x"), &Value::Null));
        assert_eq!(format!("{pred:?}"), "Predicate(*)");
    }
}
