//! Relational persistence for the fulfillment pipeline.
//!
//! Exposes [`OrderStore`] and [`PaymentStore`] traits with two
//! implementations: [`InMemoryStore`] for tests and [`PostgresStore`]
//! backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{OrderStore, PaymentStore};
