//! Transactional storage for the storefront.
//!
//! All writes go through a [`UnitOfWork`]: a scoped transaction that is
//! either committed as a whole or rolled back. Dropping a unit of work
//! without committing discards everything it staged.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStore, InMemoryUnitOfWork, RowCounts};
pub use postgres::{PostgresStore, PostgresUnitOfWork};
pub use store::{Store, UnitOfWork};
