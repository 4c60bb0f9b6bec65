//! Deadlock demo: two writers cross and the newest waiter dies.

use std::sync::Arc;
use std::time::Duration;

use isodb_core::{EngineError, IsolationLevel, Predicate, RowId, TransactionManager, Value};

use super::{await_blocked, seed, spawn_worker};
use crate::render;

/// Runs the crossed-transfer walkthrough.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(TransactionManager::default());
    seed(
        &engine,
        vec![
            ("checking", Value::Integer(100)),
            ("savings", Value::Integer(250)),
        ],
    )?;

    render::heading("Deadlock: two transfers cross on the same accounts");

    let alice = engine.begin(IsolationLevel::ReadCommitted);
    let bob = engine.begin(IsolationLevel::ReadCommitted);

    engine.write(alice, &RowId::new("checking"), Value::Integer(90))?;
    render::step("alice", &format!("{alice} locked checking"));
    engine.write(bob, &RowId::new("savings"), Value::Integer(260))?;
    render::step("bob", &format!("{bob} locked savings"));

    let via = Arc::clone(&engine);
    let pending =
        spawn_worker(move || via.write(alice, &RowId::new("savings"), Value::Integer(80)));
    await_blocked(&engine, alice)?;
    render::step("alice", "waiting for savings, held by bob");

    render::step("bob", "now asking for checking, held by alice");
    match engine.write(bob, &RowId::new("checking"), Value::Integer(270)) {
        Err(EngineError::DeadlockDetected { victim }) => {
            render::step(
                "engine",
                &format!("cycle found; rolled back the newest waiter, {victim}"),
            );
        }
        other => return Err(format!("expected a deadlock, got {other:?}").into()),
    }

    pending.recv_timeout(Duration::from_secs(2))??;
    render::step("alice", "acquired savings once the victim let go");
    engine.commit(alice)?;
    render::step("alice", "committed both writes");

    println!();
    let audit = engine.begin(IsolationLevel::ReadCommitted);
    let rows = engine.scan(audit, &Predicate::any())?;
    engine.commit(audit)?;
    render::print_table("Final balances:", &rows);
    println!();
    println!("Bob's transfer was rolled back whole and can simply be retried.");
    Ok(())
}
