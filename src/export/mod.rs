//! Export pipeline core: predicate translation, field mapping, encoding.

pub mod encoder;
pub mod mapper;
pub mod predicate;

pub use encoder::{EncodeContext, EncodeError, FormatEncoder, encode_all, encoder_for};
pub use mapper::map_record;
pub use predicate::translate;
