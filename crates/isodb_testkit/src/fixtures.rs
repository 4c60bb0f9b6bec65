//! Pre-seeded engines for exercising transaction behavior.
//!
//! The datasets mirror the classic isolation walkthroughs: a payroll
//! table for dirty reads, a user directory for non-repeatable reads, a
//! purchase cart for phantom reads, and an inventory whose balances sit
//! near a credit cap for the atomicity demo.

use std::sync::Arc;

use isodb_core::{Config, IsolationLevel, RowId, TransactionManager, TxHandle, Value};

/// Create an empty engine with the default configuration.
#[must_use]
pub fn engine() -> Arc<TransactionManager> {
    Arc::new(TransactionManager::default())
}

/// Create an empty engine with the given configuration.
#[must_use]
pub fn engine_with(config: Config) -> Arc<TransactionManager> {
    Arc::new(TransactionManager::new(config))
}

/// Shorthand for building a row key.
#[must_use]
pub fn row(key: &str) -> RowId {
    RowId::new(key)
}

/// Seed rows through a single committed transaction.
pub fn seed(engine: &TransactionManager, rows: Vec<(RowId, Value)>) {
    let tx = engine.begin(IsolationLevel::ReadCommitted);
    for (key, value) in rows {
        engine.write(tx, &key, value).expect("seed write");
    }
    engine.commit(tx).expect("seed commit");
}

/// Monthly payroll for the dirty-read walkthrough.
///
/// `Dorin` starts at zero; the canonical interleaving gives Dorin a
/// raise that rolls back while a report reads the paycheck.
#[must_use]
pub fn payroll_engine() -> Arc<TransactionManager> {
    let engine = engine();
    seed(
        &engine,
        vec![
            (row("RichieRich"), Value::Integer(1000)),
            (row("RichieNotRich"), Value::Integer(20)),
            (row("Dorin"), Value::Integer(0)),
        ],
    );
    engine
}

/// User directory for the non-repeatable-read walkthrough.
///
/// Each row carries a `europe` flag and a `points` score; the
/// walkthrough relocates `Dorin` between two scans of the directory.
#[must_use]
pub fn directory_engine() -> Arc<TransactionManager> {
    let engine = engine();
    seed(
        &engine,
        vec![
            (row("Dorin"), user(true, 100)),
            (row("Porin"), user(true, 5)),
            (row("Xorin"), user(false, 100)),
            (row("Borin"), user(false, 100)),
        ],
    );
    engine
}

/// Build a user-directory row.
#[must_use]
pub fn user(europe: bool, points: i64) -> Value {
    Value::map(vec![
        ("europe".into(), Value::Bool(europe)),
        ("points".into(), Value::Integer(points)),
    ])
}

/// Purchase cart for the phantom-read walkthrough.
///
/// The phantom is a `RaspberryPI` row inserted between two totals of
/// the same cart.
#[must_use]
pub fn cart_engine() -> Arc<TransactionManager> {
    let engine = engine();
    seed(
        &engine,
        vec![
            (row("potatoes"), Value::Integer(10)),
            (row("bread"), Value::Integer(5)),
            (row("battery"), Value::Integer(40)),
        ],
    );
    engine
}

/// Account credits capped at `i32::MAX`.
///
/// A transfer into the larger balance overflows the cap, which is the
/// mid-transaction failure the atomicity demo rolls back from.
pub const CREDIT_CAP: i64 = i32::MAX as i64;

/// Inventory for the atomicity walkthrough.
#[must_use]
pub fn inventory_engine() -> Arc<TransactionManager> {
    let engine = engine();
    seed(
        &engine,
        vec![
            (row("Margot Robbie"), Value::Integer(214_748_370)),
            (row("Julius Caesar"), Value::Integer(2_147_483_640)),
        ],
    );
    engine
}

/// Read one row as an integer inside an open transaction.
pub fn read_integer(engine: &TransactionManager, tx: TxHandle, key: &str) -> Option<i64> {
    engine
        .read(tx, &row(key))
        .expect("read")
        .and_then(|value| value.as_integer())
}

/// Read one row in a fresh read-committed transaction.
pub fn committed_value(engine: &TransactionManager, key: &str) -> Option<Value> {
    let tx = engine.begin(IsolationLevel::ReadCommitted);
    let value = engine.read(tx, &row(key)).expect("read");
    engine.commit(tx).expect("commit");
    value
}
