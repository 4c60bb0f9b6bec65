//! Stress utilities for concurrent engine workloads.
//!
//! Workers hammer a small key space from every isolation level at
//! once. Deadlock victims and expired waits are expected outcomes of
//! such a run and are counted, not failed; what must hold afterwards
//! is that the engine is quiescent and fully readable.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use isodb_core::{
    EngineError, IsolationLevel, Predicate, RowId, TransactionManager, TxHandle, Value,
};

/// Shape of a mixed concurrent workload.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Worker thread count.
    pub threads: usize,
    /// Transactions attempted per worker.
    pub transactions_per_thread: usize,
    /// Number of distinct rows the workload contends on.
    pub rows: usize,
    /// Operations per transaction.
    pub ops_per_transaction: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            transactions_per_thread: 50,
            rows: 8,
            ops_per_transaction: 4,
        }
    }
}

/// Outcome counts from a stress run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StressReport {
    /// Transactions that committed.
    pub committed: u64,
    /// Transactions rolled back as deadlock victims.
    pub deadlock_victims: u64,
    /// Transactions rolled back after a lock wait expired.
    pub timeouts: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl StressReport {
    /// Total transactions the run attempted.
    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.committed + self.deadlock_victims + self.timeouts
    }
}

/// Run a mixed workload against the engine and audit it afterwards.
///
/// The audit asserts that no transaction was left open, that the
/// lifecycle counters balance, and that a fresh transaction can scan
/// the whole store without blocking.
pub fn run_mixed_workload(engine: &Arc<TransactionManager>, config: &StressConfig) -> StressReport {
    let started = Instant::now();
    let mut workers = Vec::with_capacity(config.threads);
    for worker in 0..config.threads {
        let engine = Arc::clone(engine);
        let config = config.clone();
        workers.push(thread::spawn(move || run_worker(&engine, &config, worker)));
    }
    let mut report = StressReport::default();
    for worker in workers {
        let outcome = worker.join().expect("stress worker panicked");
        report.committed += outcome.0;
        report.deadlock_victims += outcome.1;
        report.timeouts += outcome.2;
    }
    report.duration = started.elapsed();
    audit_engine(engine, &report);
    report
}

fn run_worker(
    engine: &TransactionManager,
    config: &StressConfig,
    worker: usize,
) -> (u64, u64, u64) {
    let levels = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];
    let mut mixer = Mixer::new(worker as u64);
    let (mut committed, mut victims, mut timeouts) = (0, 0, 0);
    for attempt in 0..config.transactions_per_thread {
        let level = levels[(worker + attempt) % levels.len()];
        let tx = engine.begin(level);
        match run_script(engine, tx, config, &mut mixer) {
            Ok(()) => {
                engine.commit(tx).expect("commit after a clean script");
                committed += 1;
            }
            // Statement failures have already rolled the victim back.
            Err(EngineError::DeadlockDetected { .. }) => victims += 1,
            Err(EngineError::LockWaitTimeout { .. }) => timeouts += 1,
            Err(error) => panic!("unexpected workload failure: {error}"),
        }
    }
    (committed, victims, timeouts)
}

fn run_script(
    engine: &TransactionManager,
    tx: TxHandle,
    config: &StressConfig,
    mixer: &mut Mixer,
) -> Result<(), EngineError> {
    for _ in 0..config.ops_per_transaction {
        let key = RowId::new(format!("row{}", mixer.next() % config.rows.max(1) as u64));
        match mixer.next() % 10 {
            0..=3 => {
                engine.read(tx, &key)?;
            }
            4..=7 => {
                engine.write(tx, &key, Value::Integer((mixer.next() % 1000) as i64))?;
            }
            8 => {
                engine.delete(tx, &key)?;
            }
            _ => {
                engine.scan(tx, &Predicate::any())?;
            }
        }
    }
    Ok(())
}

fn audit_engine(engine: &Arc<TransactionManager>, report: &StressReport) {
    assert_eq!(engine.active_count(), 0, "workers left transactions open");
    let audit = engine.begin(IsolationLevel::ReadCommitted);
    engine.scan(audit, &Predicate::any()).expect("post-run scan");
    engine.commit(audit).expect("post-run commit");
    let stats = engine.stats();
    assert_eq!(
        stats.transactions_begun,
        stats.transactions_committed + stats.transactions_rolled_back,
        "lifecycle counters out of balance"
    );
    assert!(
        stats.transactions_committed > report.committed,
        "audit commit missing from the counters"
    );
    assert!(stats.deadlocks_detected >= report.deadlock_victims);
}

// splitmix64 update, seeded per worker.
struct Mixer(u64);

impl Mixer {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(1))
    }

    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}
