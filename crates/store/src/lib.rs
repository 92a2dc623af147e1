//! Store of record for the online store.
//!
//! The [`Store`] trait exposes committed reads and opens transactions
//! ([`StoreTx`]) with explicit row-level locking. Two implementations are
//! provided: [`InMemoryStore`] for tests and local runs, and
//! [`PostgresStore`] backed by `sqlx`.

pub mod error;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError, constraint};
pub use filter::{
    CategoryFilter, OrderFilter, OrderListing, OrderRow, OrderSort, OrderSortField, ProductFilter,
};
pub use memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PgTx, PostgresStore};
pub use store::{Store, StoreTx};
