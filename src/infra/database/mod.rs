//! Database-backed record source implementations.

pub mod postgres;

pub use postgres::{PostgresConfig, PostgresRecordSource};
