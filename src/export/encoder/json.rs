//! JSON encoder: array of objects keyed by canonical field name.
//!
//! Objects are written field by field rather than through a map type so the
//! key order always matches the domain schema.

use std::io::Write;

use crate::domain::CanonicalRecord;

use super::{EncodeContext, EncodeError, FormatEncoder, check_shape};

pub struct JsonEncoder {
    ctx: Option<EncodeContext>,
    written: usize,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            ctx: None,
            written: 0,
        }
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatEncoder for JsonEncoder {
    fn begin(&mut self, ctx: &EncodeContext, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.ctx = Some(*ctx);
        self.written = 0;
        out.push(b'[');
        Ok(())
    }

    fn record(&mut self, record: &CanonicalRecord, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let ctx = self
            .ctx
            .ok_or_else(|| EncodeError::Malformed("record() before begin()".to_string()))?;
        check_shape(&ctx, record)?;

        if self.written > 0 {
            out.push(b',');
        }
        self.written += 1;

        out.push(b'{');
        let mut first = true;
        for (name, value) in record.fields() {
            if !first {
                out.push(b',');
            }
            first = false;
            let key = serde_json::to_string(name)
                .map_err(|e| EncodeError::Malformed(e.to_string()))?;
            let rendered = serde_json::to_string(&value.to_json())
                .map_err(|e| EncodeError::Malformed(e.to_string()))?;
            write!(out, "{}:{}", key, rendered)?;
        }
        out.push(b'}');
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        out.push(b']');
        Ok(())
    }
}
