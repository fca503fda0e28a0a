//! CSV encoder with RFC 4180 quoting.

use std::io::Write;

use crate::domain::CanonicalRecord;

use super::{EncodeContext, EncodeError, FormatEncoder, check_shape};

/// Streams one header row plus one row per record; `null` encodes as an
/// empty field.
pub struct CsvEncoder {
    ctx: Option<EncodeContext>,
}

impl CsvEncoder {
    pub fn new() -> Self {
        Self { ctx: None }
    }
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatEncoder for CsvEncoder {
    fn begin(&mut self, ctx: &EncodeContext, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.ctx = Some(*ctx);
        let header: Vec<String> = ctx.schema.field_names().map(escape_field).collect();
        writeln!(out, "{}", header.join(","))?;
        Ok(())
    }

    fn record(&mut self, record: &CanonicalRecord, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let ctx = self
            .ctx
            .ok_or_else(|| EncodeError::Malformed("record() before begin()".to_string()))?;
        check_shape(&ctx, record)?;

        let mut first = true;
        for (_, value) in record.fields() {
            if !first {
                out.push(b',');
            }
            first = false;
            out.extend_from_slice(escape_field(value.to_plain()).as_bytes());
        }
        out.push(b'\n');
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> Result<(), EncodeError> {
        Ok(())
    }
}

/// Quote a field when it contains the delimiter, the quote character, or a
/// line break; embedded quotes are doubled.
fn escape_field(raw: impl AsRef<str>) -> String {
    let raw = raw.as_ref();
    if raw.contains([',', '"', '\n', '\r']) {
        let mut quoted = String::with_capacity(raw.len() + 2);
        quoted.push('"');
        for ch in raw.chars() {
            if ch == '"' {
                quoted.push('"');
            }
            quoted.push(ch);
        }
        quoted.push('"');
        quoted
    } else {
        raw.to_string()
    }
}
