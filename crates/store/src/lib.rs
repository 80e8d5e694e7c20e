//! PostgreSQL implementation of the domain store ports.

mod postgres;

pub use postgres::PostgresStore;
