//! Scripted interleavings of two transactions.
//!
//! Each scenario seeds its own dataset, narrates every step on stdout,
//! and drives a fixed interleaving so a run is reproducible.

pub mod atomicity;
pub mod deadlock;
pub mod dirty_read;
pub mod non_repeatable;
pub mod phantom;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use isodb_core::{IsolationLevel, RowId, TransactionManager, TxHandle, Value};

/// Seed rows through one committed transaction.
fn seed(
    engine: &TransactionManager,
    rows: Vec<(&str, Value)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tx = engine.begin(IsolationLevel::ReadCommitted);
    for (key, value) in rows {
        engine.write(tx, &RowId::new(key), value)?;
    }
    engine.commit(tx)?;
    Ok(())
}

/// Run `work` on a helper thread, reporting its result over a channel.
fn spawn_worker<R, F>(work: F) -> mpsc::Receiver<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(work());
    });
    receiver
}

/// Wait until the engine parks `tx` in a lock wait.
fn await_blocked(
    engine: &TransactionManager,
    tx: TxHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..2000 {
        if engine.is_blocked(tx) {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(1));
    }
    Err("worker never reached its lock wait".into())
}

/// Outcome of letting a worker's statement either finish or park.
enum Progress<R> {
    Done(R),
    Blocked(mpsc::Receiver<R>),
}

/// Watch a worker until its statement completes or the engine parks it.
fn settle_or_block<R: Send + 'static>(
    engine: &TransactionManager,
    tx: TxHandle,
    receiver: mpsc::Receiver<R>,
) -> Result<Progress<R>, Box<dyn std::error::Error>> {
    for _ in 0..2000 {
        match receiver.try_recv() {
            Ok(result) => return Ok(Progress::Done(result)),
            Err(mpsc::TryRecvError::Empty) => {
                if engine.is_blocked(tx) {
                    return Ok(Progress::Blocked(receiver));
                }
                thread::sleep(Duration::from_millis(1));
            }
            Err(error) => return Err(error.into()),
        }
    }
    Err("worker neither finished nor blocked".into())
}
