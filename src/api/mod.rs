//! The API layer, containing web handlers and routing.

pub mod auth;
pub mod extract;
pub mod handlers;
pub mod router;

pub use handlers::{
    ApiDoc, GENERATED_AT_HEADER, RECORD_COUNT_HEADER, SKIPPED_COUNT_HEADER,
};
pub use router::create_router;
