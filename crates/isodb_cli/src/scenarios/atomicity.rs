//! All-or-nothing transfer demo.

use isodb_core::{IsolationLevel, Predicate, RowId, TransactionManager, TxHandle, Value};

use super::seed;
use crate::render;

const CREDIT_CAP: i64 = i32::MAX as i64;

/// Runs the atomicity walkthrough.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let engine = TransactionManager::default();
    seed(
        &engine,
        vec![
            ("Margot Robbie", Value::Integer(214_748_370)),
            ("Julius Caesar", Value::Integer(2_147_483_640)),
        ],
    )?;

    render::heading("Atomicity: a transfer commits whole or not at all");
    print_balances(&engine)?;
    println!();
    println!("Transferring 10 credits from Margot Robbie to Julius Caesar...");

    let margot = RowId::new("Margot Robbie");
    let caesar = RowId::new("Julius Caesar");
    let tx = engine.begin(IsolationLevel::ReadCommitted);

    let from = read_balance(&engine, tx, &margot)?;
    engine.write(tx, &margot, Value::Integer(from - 10))?;
    render::step("transfer", &format!("debited Margot Robbie down to {}", from - 10));

    let to = read_balance(&engine, tx, &caesar)?;
    if to + 10 > CREDIT_CAP {
        render::step(
            "transfer",
            &format!("crediting up to {} would pass the cap of {CREDIT_CAP}", to + 10),
        );
        render::step("transfer", "rolling back; the debit above must vanish too");
        engine.rollback(tx)?;
    } else {
        engine.write(tx, &caesar, Value::Integer(to + 10))?;
        engine.commit(tx)?;
        render::step("transfer", "committed both legs");
    }

    println!();
    print_balances(&engine)?;
    println!();
    println!("Both balances are untouched; the half-done debit never escaped.");
    Ok(())
}

fn read_balance(
    engine: &TransactionManager,
    tx: TxHandle,
    key: &RowId,
) -> Result<i64, Box<dyn std::error::Error>> {
    let value = engine.read(tx, key)?.ok_or("missing account")?;
    value
        .as_integer()
        .ok_or_else(|| "balance is not an integer".into())
}

fn print_balances(engine: &TransactionManager) -> Result<(), Box<dyn std::error::Error>> {
    let tx = engine.begin(IsolationLevel::ReadCommitted);
    let rows = engine.scan(tx, &Predicate::any())?;
    engine.commit(tx)?;
    render::print_table("Account balances:", &rows);
    Ok(())
}
