//! Non-repeatable read demo: one report, two answers.

use std::sync::Arc;
use std::time::Duration;

use isodb_core::{IsolationLevel, Predicate, RowId, TransactionManager, Value};

use super::{seed, settle_or_block, spawn_worker, Progress};
use crate::render;

fn user(europe: bool, points: i64) -> Value {
    Value::map(vec![
        ("europe".into(), Value::Bool(europe)),
        ("points".into(), Value::Integer(points)),
    ])
}

/// Runs the leaderboard walkthrough with the report at `isolation`.
pub fn run(isolation: IsolationLevel) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(TransactionManager::default());
    seed(
        &engine,
        vec![
            ("Dorin", user(true, 100)),
            ("Porin", user(true, 5)),
            ("Xorin", user(false, 100)),
            ("Borin", user(false, 100)),
        ],
    )?;

    render::heading(&format!("Leaderboards with the report at {isolation}"));

    let eu = Predicate::new("europe", |_, value| value.get_bool("europe") == Some(true));
    let world = Predicate::new("outside-europe", |_, value| {
        value.get_bool("europe") == Some(false)
    });

    let boards = engine.begin(isolation);
    let eu_rows = engine.scan(boards, &eu)?;
    render::print_table("EU leaderboard:", &eu_rows);

    // Dorin relocates between the report's two scans.
    let mover = engine.begin(IsolationLevel::ReadCommitted);
    let via = Arc::clone(&engine);
    let pending = spawn_worker(move || {
        via.write(mover, &RowId::new("Dorin"), user(false, 100))?;
        via.commit(mover).map(|_| ())
    });

    match settle_or_block(&engine, mover, pending)? {
        Progress::Done(result) => {
            result?;
            render::step("mover", "relocated Dorin out of the EU and committed");
            let world_rows = engine.scan(boards, &world)?;
            render::print_table("World leaderboard:", &world_rows);
            check_boards(&eu_rows, &world_rows);
            engine.commit(boards)?;
        }
        Progress::Blocked(receiver) => {
            render::step("mover", "blocked: the report still holds shared locks from its scan");
            let world_rows = engine.scan(boards, &world)?;
            render::print_table("World leaderboard:", &world_rows);
            check_boards(&eu_rows, &world_rows);
            engine.commit(boards)?;
            receiver.recv_timeout(Duration::from_secs(2))??;
            render::step("mover", "relocated Dorin after the report committed");
        }
    }
    Ok(())
}

fn check_boards(eu: &[(RowId, Value)], world: &[(RowId, Value)]) {
    let twice: Vec<&str> = eu
        .iter()
        .map(|(key, _)| key.as_str())
        .filter(|key| world.iter().any(|(other, _)| other.as_str() == *key))
        .collect();
    println!();
    if twice.is_empty() {
        println!("Every player appears on exactly one board.");
    } else {
        println!(
            "Non-repeatable read: {} landed on both boards.",
            twice.join(", ")
        );
    }
}
