//! Infrastructure layer: concrete adapters behind the domain traits.

pub mod database;

pub use database::{PostgresConfig, PostgresRecordSource};
