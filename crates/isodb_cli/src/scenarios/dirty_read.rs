//! Dirty read demo: an uncommitted raise leaks into a report.

use std::sync::Arc;
use std::time::Duration;

use isodb_core::{IsolationLevel, RowId, TransactionManager, Value};

use super::{seed, settle_or_block, spawn_worker, Progress};
use crate::render;

/// Runs the dirty-read walkthrough with the report at `isolation`.
pub fn run(isolation: IsolationLevel) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(TransactionManager::default());
    seed(
        &engine,
        vec![
            ("RichieRich", Value::Integer(1000)),
            ("RichieNotRich", Value::Integer(20)),
            ("Dorin", Value::Integer(0)),
        ],
    )?;

    render::heading(&format!("Dirty read with the report at {isolation}"));

    let dorin = RowId::new("Dorin");
    let raise = engine.begin(IsolationLevel::ReadCommitted);
    engine.write(raise, &dorin, Value::Integer(100))?;
    render::step("raise", "wrote Dorin = 100, not committed yet");

    let report = engine.begin(isolation);
    let viewer = Arc::clone(&engine);
    let pending = spawn_worker(move || viewer.read(report, &RowId::new("Dorin")));

    match settle_or_block(&engine, report, pending)? {
        Progress::Done(result) => {
            let first = result?;
            render::step("report", &format!("read Dorin = {}", render::show(&first)));
            render::step("raise", "rolling the raise back; the 100 never happened");
            engine.rollback(raise)?;
            let second = engine.read(report, &dorin)?;
            render::step("report", &format!("read Dorin again = {}", render::show(&second)));
            println!();
            println!("Dirty read: the first answer was money that was never committed.");
        }
        Progress::Blocked(receiver) => {
            render::step("report", "blocked behind the uncommitted raise");
            render::step("raise", "rolling the raise back");
            engine.rollback(raise)?;
            let first = receiver.recv_timeout(Duration::from_secs(2))??;
            render::step("report", &format!("read Dorin = {}", render::show(&first)));
            println!();
            println!("No dirty read at this level: the report waited out the writer.");
        }
    }
    engine.commit(report)?;

    println!();
    render::print_versions(&engine, &dorin);
    Ok(())
}
