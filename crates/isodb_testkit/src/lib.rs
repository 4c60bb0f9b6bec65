//! # isodb Testkit
//!
//! Test utilities for isodb.
//!
//! This crate provides:
//! - Pre-seeded engine fixtures for the classic isolation walkthroughs
//! - Thread coordination helpers for deterministic interleaving tests
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent workloads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isodb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_accounts() {
//!     let engine = payroll_engine();
//!     let tx = engine.begin_default();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod sync;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::sync::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use sync::*;
