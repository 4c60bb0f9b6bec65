//! Property tests driving generated scripts through the engine.

use std::collections::BTreeMap;

use isodb_core::{Predicate, RowId, TransactionManager, Value};
use isodb_testkit::prelude::*;
use proptest::prelude::*;

fn committed_state(engine: &TransactionManager) -> Vec<(RowId, Value)> {
    let tx = engine.begin_default();
    let state = engine.scan(tx, &Predicate::any()).expect("scan");
    engine.commit(tx).expect("commit");
    state
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn serial_scripts_match_a_map_model(
        level in isolation_level_strategy(),
        script in script_strategy(16),
    ) {
        let engine = engine();
        let tx = engine.begin(level);
        let mut model: BTreeMap<RowId, Value> = BTreeMap::new();
        for op in script {
            match op {
                ScriptOp::Read(key) => {
                    let got = engine.read(tx, &key).expect("read");
                    prop_assert_eq!(got.as_ref(), model.get(&key));
                }
                ScriptOp::Write(key, value) => {
                    engine.write(tx, &key, value.clone()).expect("write");
                    model.insert(key, value);
                }
                ScriptOp::Delete(key) => {
                    let existed = engine.delete(tx, &key).expect("delete");
                    prop_assert_eq!(existed, model.remove(&key).is_some());
                }
                ScriptOp::ScanAll => {
                    let state = engine.scan(tx, &Predicate::any()).expect("scan");
                    let expected: Vec<(RowId, Value)> =
                        model.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    prop_assert_eq!(state, expected);
                }
            }
        }
        engine.commit(tx).expect("commit");
        let expected: Vec<(RowId, Value)> = model.into_iter().collect();
        prop_assert_eq!(committed_state(&engine), expected);
    }

    #[test]
    fn committed_writes_are_visible_later(
        level in isolation_level_strategy(),
        writes in prop::collection::vec((row_id_strategy(), value_strategy()), 1..12),
    ) {
        let engine = engine();
        let writer = engine.begin_default();
        let mut last: BTreeMap<RowId, Value> = BTreeMap::new();
        for (key, value) in writes {
            engine.write(writer, &key, value.clone()).expect("write");
            last.insert(key, value);
        }
        engine.commit(writer).expect("commit");

        let reader = engine.begin(level);
        for (key, value) in &last {
            let got = engine.read(reader, key).expect("read");
            prop_assert_eq!(got.as_ref(), Some(value));
        }
        engine.commit(reader).expect("commit");
    }

    #[test]
    fn rolled_back_scripts_leave_no_trace(
        level in isolation_level_strategy(),
        script in script_strategy(16),
    ) {
        let engine = engine();
        seed(&engine, vec![
            (row("alpha"), Value::Integer(1)),
            (row("bravo"), Value::Integer(2)),
            (row("carol"), Value::Integer(3)),
        ]);
        let before = committed_state(&engine);

        let tx = engine.begin(level);
        for op in script {
            match op {
                ScriptOp::Read(key) => {
                    engine.read(tx, &key).expect("read");
                }
                ScriptOp::Write(key, value) => {
                    engine.write(tx, &key, value).expect("write");
                }
                ScriptOp::Delete(key) => {
                    engine.delete(tx, &key).expect("delete");
                }
                ScriptOp::ScanAll => {
                    engine.scan(tx, &Predicate::any()).expect("scan");
                }
            }
        }
        engine.rollback(tx).expect("rollback");
        prop_assert_eq!(committed_state(&engine), before);
    }
}
