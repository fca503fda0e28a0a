//! PDF summary encoder.
//!
//! Produces a minimal, self-contained PDF: a header block (domain label,
//! generation timestamp, record count) followed by the same row data as the
//! CSV output, paginated onto as many pages as needed. The document embeds
//! the generation timestamp, so two renderings of the same data are
//! structurally but not byte identical.

use std::io::Write;

use crate::domain::CanonicalRecord;

use super::{EncodeContext, EncodeError, FormatEncoder, check_shape};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const LINE_HEIGHT: f32 = 12.0;
const BODY_FONT_SIZE: f32 = 9.0;
const TITLE_FONT_SIZE: f32 = 14.0;

/// Buffers rows and assembles the document in `finish`; the header needs
/// the total count, so this encoder does not stream.
pub struct PdfSummaryEncoder {
    ctx: Option<EncodeContext>,
    rows: Vec<String>,
}

impl PdfSummaryEncoder {
    pub fn new() -> Self {
        Self {
            ctx: None,
            rows: Vec::new(),
        }
    }
}

impl Default for PdfSummaryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatEncoder for PdfSummaryEncoder {
    fn begin(&mut self, ctx: &EncodeContext, _out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.ctx = Some(*ctx);
        self.rows.clear();
        Ok(())
    }

    fn record(&mut self, record: &CanonicalRecord, _out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let ctx = self
            .ctx
            .ok_or_else(|| EncodeError::Malformed("record() before begin()".to_string()))?;
        check_shape(&ctx, record)?;
        let cells: Vec<String> = record.fields().iter().map(|(_, v)| v.to_plain()).collect();
        self.rows.push(cells.join(" | "));
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let ctx = self
            .ctx
            .ok_or_else(|| EncodeError::Malformed("finish() before begin()".to_string()))?;

        let column_header: Vec<&str> = ctx.schema.field_names().collect();
        let mut lines: Vec<(String, f32)> = vec![
            (
                format!("{} Export", ctx.schema.domain.label()),
                TITLE_FONT_SIZE,
            ),
            (
                format!(
                    "Generated: {}",
                    ctx.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
                ),
                BODY_FONT_SIZE,
            ),
            (format!("Records: {}", ctx.record_count), BODY_FONT_SIZE),
            (String::new(), BODY_FONT_SIZE),
            (column_header.join(" | "), BODY_FONT_SIZE),
        ];
        for row in &self.rows {
            lines.push((row.clone(), BODY_FONT_SIZE));
        }

        let pages = paginate(&lines);
        write_document(out, &pages)?;
        Ok(())
    }
}

/// Split lines into pages by vertical capacity
fn paginate(lines: &[(String, f32)]) -> Vec<Vec<(String, f32)>> {
    let capacity = ((PAGE_HEIGHT - 2.0 * MARGIN) / LINE_HEIGHT) as usize;
    let capacity = capacity.max(1);
    let mut pages: Vec<Vec<(String, f32)>> = Vec::new();
    for chunk in lines.chunks(capacity) {
        pages.push(chunk.to_vec());
    }
    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

/// Escape characters with special meaning inside a PDF literal string
fn escape_pdf_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '(' => escaped.push_str("\\("),
            ')' => escaped.push_str("\\)"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn page_content(lines: &[(String, f32)]) -> Vec<u8> {
    let mut content = Vec::new();
    let _ = write!(content, "BT\n");
    let mut y = PAGE_HEIGHT - MARGIN;
    for (text, size) in lines {
        let _ = write!(content, "/F1 {} Tf\n", size);
        let _ = write!(
            content,
            "1 0 0 1 {} {} Tm ({}) Tj\n",
            MARGIN,
            y,
            escape_pdf_text(text)
        );
        y -= LINE_HEIGHT;
    }
    let _ = write!(content, "ET\n");
    content
}

/// Emit the object graph: catalog, page tree, font, then one page and one
/// content stream per rendered page.
fn write_document(out: &mut Vec<u8>, pages: &[Vec<(String, f32)>]) -> Result<(), EncodeError> {
    out.extend_from_slice(b"%PDF-1.4\n");

    let page_object_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
    let kids: Vec<String> = page_object_ids.iter().map(|id| format!("{} 0 R", id)).collect();

    let mut offsets: Vec<usize> = Vec::new();
    let mut write_object = |out: &mut Vec<u8>, id: usize, body: &[u8]| -> std::io::Result<()> {
        offsets.push(out.len());
        write!(out, "{} 0 obj\n", id)?;
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
        Ok(())
    };

    write_object(out, 1, b"<< /Type /Catalog /Pages 2 0 R >>")?;
    write_object(
        out,
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .as_bytes(),
    )?;
    write_object(
        out,
        3,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>",
    )?;

    for (i, lines) in pages.iter().enumerate() {
        let page_id = 4 + 2 * i;
        let content_id = page_id + 1;
        write_object(
            out,
            page_id,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH, PAGE_HEIGHT, content_id
            )
            .as_bytes(),
        )?;

        let content = page_content(lines);
        let mut stream = Vec::new();
        write!(stream, "<< /Length {} >>\nstream\n", content.len())?;
        stream.extend_from_slice(&content);
        stream.extend_from_slice(b"endstream");
        write_object(out, content_id, &stream)?;
    }

    let object_count = offsets.len();
    let xref_start = out.len();
    write!(out, "xref\n0 {}\n", object_count + 1)?;
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        write!(out, "{:010} 00000 n \n", offset)?;
    }
    write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        object_count + 1,
        xref_start
    )?;
    Ok(())
}
