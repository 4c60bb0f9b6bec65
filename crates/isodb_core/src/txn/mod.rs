//! Transaction lifecycle: handles, records, and the manager facade.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{TransactionStatus, TxHandle};
