//! Property-based test generators for engine inputs.
//!
//! Keys are drawn from a small pool so generated scripts contend on
//! the same rows; isolation behavior only shows up under collision.

use proptest::prelude::*;

use isodb_core::{IsolationLevel, RowId, Value};

const ROW_POOL: [&str; 6] = ["alpha", "bravo", "carol", "delta", "echo", "fox"];

/// Strategy for row keys drawn from the colliding pool.
pub fn row_id_strategy() -> impl Strategy<Value = RowId> {
    (0..ROW_POOL.len()).prop_map(|i| RowId::new(ROW_POOL[i]))
}

/// Strategy for free-form row keys.
pub fn wide_row_id_strategy() -> impl Strategy<Value = RowId> {
    "[a-z]{1,8}".prop_map(RowId::new)
}

/// Strategy for scalar and small map values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        2 => any::<bool>().prop_map(Value::Bool),
        5 => any::<i64>().prop_map(Value::Integer),
        4 => "[a-z0-9 ]{0,12}".prop_map(Value::Text),
        2 => (any::<bool>(), 0..1000i64).prop_map(|(europe, points)| {
            Value::map(vec![
                ("europe".into(), Value::Bool(europe)),
                ("points".into(), Value::Integer(points)),
            ])
        }),
    ]
}

/// Strategy over all four isolation levels.
pub fn isolation_level_strategy() -> impl Strategy<Value = IsolationLevel> {
    prop_oneof![
        Just(IsolationLevel::ReadUncommitted),
        Just(IsolationLevel::ReadCommitted),
        Just(IsolationLevel::RepeatableRead),
        Just(IsolationLevel::Serializable),
    ]
}

/// One step of a generated transaction script.
#[derive(Debug, Clone)]
pub enum ScriptOp {
    /// Read a row.
    Read(RowId),
    /// Upsert a row.
    Write(RowId, Value),
    /// Delete a row.
    Delete(RowId),
    /// Scan every row.
    ScanAll,
}

/// Strategy for one script operation.
pub fn script_op_strategy() -> impl Strategy<Value = ScriptOp> {
    prop_oneof![
        4 => row_id_strategy().prop_map(ScriptOp::Read),
        4 => (row_id_strategy(), value_strategy())
            .prop_map(|(row, value)| ScriptOp::Write(row, value)),
        2 => row_id_strategy().prop_map(ScriptOp::Delete),
        1 => Just(ScriptOp::ScanAll),
    ]
}

/// Strategy for a whole transaction script.
pub fn script_strategy(max_ops: usize) -> impl Strategy<Value = Vec<ScriptOp>> {
    prop::collection::vec(script_op_strategy(), 1..=max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropTestConfig {
    /// Quick configuration for CI runs.
    pub fn quick() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 256,
        }
    }

    /// Thorough configuration for local soak runs.
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 2048,
        }
    }

    /// Convert to a proptest runner configuration.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn scripts_stay_in_bounds(script in script_strategy(12)) {
            prop_assert!(!script.is_empty());
            prop_assert!(script.len() <= 12);
        }

        #[test]
        fn pool_keys_collide(a in row_id_strategy(), b in row_id_strategy()) {
            prop_assert!(ROW_POOL.contains(&a.as_str()));
            prop_assert!(ROW_POOL.contains(&b.as_str()));
        }

        #[test]
        fn values_round_trip_their_accessors(value in value_strategy()) {
            match &value {
                Value::Null => prop_assert!(value.is_null()),
                Value::Bool(b) => prop_assert_eq!(value.as_bool(), Some(*b)),
                Value::Integer(n) => prop_assert_eq!(value.as_integer(), Some(*n)),
                Value::Text(s) => prop_assert_eq!(value.as_text(), Some(s.as_str())),
                Value::Map(_) => prop_assert!(value.get_bool("europe").is_some()),
            }
        }
    }
}
