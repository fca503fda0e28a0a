//! Shared test doubles, gated behind the `test-utils` feature.

pub mod mocks;

pub use mocks::{MockCallRecorder, MockRecordSource};
