//! Multi-version row storage.
//!
//! Every logical row is a chain of immutable versions ordered by
//! creation. Writers append pending versions that become visible when
//! their transaction commits; readers pick a version through a
//! [`ReadView`] without ever blocking writers.

mod row;
mod store;

pub use row::RowVersion;
pub use store::{ReadView, VersionStore};
