//! Thread coordination for interleaving tests.
//!
//! Blocking is the behavior under test in most concurrency scenarios,
//! so these helpers turn "that thread is parked" and "that thread
//! finished" into assertions with bounded budgets instead of bare
//! sleeps.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use isodb_core::{TransactionManager, TxHandle};

/// How long a probe loop runs before declaring a condition unreachable.
pub const BUDGET: Duration = Duration::from_secs(2);

/// How long an assertion watches a job before calling it still blocked.
pub const HOLD: Duration = Duration::from_millis(50);

/// A worker thread whose completion the test observes through a channel.
pub struct Job<R> {
    receiver: mpsc::Receiver<R>,
    thread: Option<thread::JoinHandle<()>>,
}

impl<R: Send + 'static> Job<R> {
    /// Run `work` on a new thread.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let thread = thread::spawn(move || {
            let _ = sender.send(work());
        });
        Self {
            receiver,
            thread: Some(thread),
        }
    }

    /// Assert the job is still running after watching it for [`HOLD`].
    pub fn assert_pending(&self) {
        assert!(
            matches!(
                self.receiver.recv_timeout(HOLD),
                Err(mpsc::RecvTimeoutError::Timeout)
            ),
            "job completed while it was expected to stay blocked"
        );
    }

    /// Wait for the job to finish and return its result.
    pub fn finish(mut self) -> R {
        let result = self
            .receiver
            .recv_timeout(BUDGET)
            .expect("job did not complete within the budget");
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        result
    }
}

/// Poll `probe` until it holds, panicking when [`BUDGET`] runs out.
pub fn eventually(what: &str, probe: impl Fn() -> bool) {
    let step = Duration::from_millis(1);
    let mut spent = Duration::ZERO;
    while spent < BUDGET {
        if probe() {
            return;
        }
        thread::sleep(step);
        spent += step;
    }
    panic!("condition never became true: {what}");
}

/// Wait until the engine reports `tx` parked in a lock wait.
pub fn await_blocked(engine: &TransactionManager, tx: TxHandle) {
    eventually("transaction parked in a lock wait", || engine.is_blocked(tx));
}
