//! Trade export gateway: a shared pipeline that turns regulatory trade
//! records (FX rates, customs declarations, quality certificates, lot
//! verifications) into downloadable CSV, JSON, and PDF artifacts behind
//! authorization, validation, and a stable error taxonomy.

pub mod api;
pub mod app;
pub mod domain;
pub mod export;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
