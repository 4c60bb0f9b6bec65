//! Predicate locking at the serializable level.

use std::sync::Arc;

use isodb_core::IsolationLevel::{ReadCommitted, Serializable};
use isodb_core::{EngineError, Predicate, TransactionStatus, Value};
use isodb_testkit::prelude::*;

fn eu_members() -> Predicate {
    Predicate::new("europe", |_, value| value.get_bool("europe") == Some(true))
}

#[test]
fn predicate_gates_only_matching_inserts() {
    let engine = directory_engine();

    let reader = engine.begin(Serializable);
    let eu_board = engine.scan(reader, &eu_members()).expect("scan");
    assert_eq!(eu_board.len(), 2);

    // An insert outside the predicate sails through.
    let outsider = engine.begin(ReadCommitted);
    engine
        .write(outsider, &row("Zorin"), user(false, 10))
        .expect("non-matching insert");
    engine.commit(outsider).expect("commit");

    // A matching insert parks until the predicate is dropped.
    let insider = engine.begin(ReadCommitted);
    let via = Arc::clone(&engine);
    let job = Job::spawn(move || {
        via.write(insider, &row("Eorin"), user(true, 10))?;
        via.commit(insider).map(|_| ())
    });
    await_blocked(&engine, insider);
    job.assert_pending();

    // Membership cannot change while the reader lives.
    let again = engine.scan(reader, &eu_members()).expect("rescan");
    assert_eq!(again.len(), 2);
    engine.commit(reader).expect("commit");

    job.finish().expect("matching insert");
    let eorin = committed_value(&engine, "Eorin").expect("Eorin row");
    assert_eq!(eorin.get_bool("europe"), Some(true));
}

#[test]
fn competing_predicate_inserts_pick_the_newest_victim() {
    let engine = directory_engine();

    let first = engine.begin(Serializable);
    let second = engine.begin(Serializable);
    engine.scan(first, &eu_members()).expect("first scan");
    engine.scan(second, &eu_members()).expect("second scan");

    // First parks on the predicate registered by second.
    let via = Arc::clone(&engine);
    let job = Job::spawn(move || via.write(first, &row("Aorin"), user(true, 1)));
    await_blocked(&engine, first);

    // Closing the cycle from this thread makes this caller the victim.
    let outcome = engine.write(second, &row("Corin"), user(true, 2));
    match outcome {
        Err(EngineError::DeadlockDetected { victim }) => assert_eq!(victim, second.id()),
        other => panic!("expected a deadlock, got {other:?}"),
    }
    assert_eq!(engine.status(second), TransactionStatus::RolledBack);

    // The survivor's insert proceeds once the victim is gone.
    job.finish().expect("survivor insert");
    engine.commit(first).expect("commit");
    let aorin = committed_value(&engine, "Aorin").expect("Aorin row");
    assert_eq!(aorin.get_integer("points"), Some(1));
}

#[test]
fn predicate_covers_rows_that_were_deleted_and_pruned() {
    let engine = cart_engine();

    let sweep = engine.begin(ReadCommitted);
    engine.delete(sweep, &row("bread")).expect("delete");
    engine.commit(sweep).expect("commit");
    assert!(engine.prune_versions() >= 1);

    let shopper = engine.begin(Serializable);
    let basket = engine.scan(shopper, &Predicate::any()).expect("scan");
    assert_eq!(basket.len(), 2);

    // Re-creating the pruned key is an insert and hits the predicate.
    let seller = engine.begin(ReadCommitted);
    let via = Arc::clone(&engine);
    let job = Job::spawn(move || via.write(seller, &row("bread"), Value::Integer(7)));
    await_blocked(&engine, seller);
    job.assert_pending();

    engine.commit(shopper).expect("commit");
    job.finish().expect("reinsert");
    engine.commit(seller).expect("commit");
    assert_eq!(committed_value(&engine, "bread"), Some(Value::Integer(7)));
}
