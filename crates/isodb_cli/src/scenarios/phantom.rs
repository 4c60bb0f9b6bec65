//! Phantom read demo: a rescan grows a row nobody locked.

use std::sync::Arc;
use std::time::Duration;

use isodb_core::{IsolationLevel, Predicate, RowId, TransactionManager, TxHandle, Value};

use super::{seed, settle_or_block, spawn_worker, Progress};
use crate::render;

/// Runs the purchase-cart walkthrough with the shopper at `isolation`.
pub fn run(isolation: IsolationLevel) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(TransactionManager::default());
    seed(
        &engine,
        vec![
            ("potatoes", Value::Integer(10)),
            ("bread", Value::Integer(5)),
            ("battery", Value::Integer(40)),
        ],
    )?;

    render::heading(&format!("Purchase cart with the shopper at {isolation}"));

    let shopper = engine.begin(isolation);
    let total = cart_total(&engine, shopper)?;
    render::step("shopper", &format!("cart total = {total}"));

    let seller = engine.begin(IsolationLevel::ReadCommitted);
    let via = Arc::clone(&engine);
    let pending = spawn_worker(move || {
        via.write(seller, &RowId::new("RaspberryPI"), Value::Integer(100))?;
        via.commit(seller).map(|_| ())
    });

    match settle_or_block(&engine, seller, pending)? {
        Progress::Done(result) => {
            result?;
            render::step("seller", "slipped a RaspberryPI into the cart and committed");
            let again = cart_total(&engine, shopper)?;
            render::step("shopper", &format!("cart total again = {again}"));
            engine.commit(shopper)?;
            println!();
            println!("Phantom read: no existing row changed, yet the total did.");
        }
        Progress::Blocked(receiver) => {
            render::step("seller", "blocked: the cart scan registered a predicate lock");
            let again = cart_total(&engine, shopper)?;
            render::step("shopper", &format!("cart total again = {again}"));
            engine.commit(shopper)?;
            receiver.recv_timeout(Duration::from_secs(2))??;
            render::step("seller", "insert landed after the shopper committed");
            println!();
            println!("No phantom: the predicate lock held the insert at the door.");
        }
    }

    println!();
    render::print_versions(&engine, &RowId::new("RaspberryPI"));
    Ok(())
}

fn cart_total(
    engine: &TransactionManager,
    tx: TxHandle,
) -> Result<i64, Box<dyn std::error::Error>> {
    let rows = engine.scan(tx, &Predicate::any())?;
    Ok(rows.iter().filter_map(|(_, value)| value.as_integer()).sum())
}
