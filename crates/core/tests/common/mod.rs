//! In-memory document builder for integration tests.
//!
//! Writes objects with real byte offsets and appends one classic xref
//! section per revision, so incremental updates can be produced without
//! fixture files.

#![allow(dead_code)]

use std::collections::BTreeMap;

use bytes::Bytes;

enum Row {
    InUse(usize),
    Free(u16),
}

pub struct PdfBuilder {
    buf: Vec<u8>,
    pending: BTreeMap<u32, Row>,
    max_number: u32,
    last_xref: Option<usize>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            buf: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            pending: BTreeMap::new(),
            max_number: 0,
            last_xref: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Writes `N 0 obj body endobj`.
    pub fn object(&mut self, number: u32, body: &str) -> &mut Self {
        self.record(number);
        self.buf
            .extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
        self
    }

    /// Writes a stream object with a direct `/Length`.
    pub fn stream(&mut self, number: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        let dict = format!("/Length {} {dict_entries}", data.len());
        self.stream_with_dict(number, &dict, data)
    }

    /// Writes a stream object whose dictionary is given verbatim.
    pub fn stream_with_dict(&mut self, number: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        self.record(number);
        self.buf
            .extend_from_slice(format!("{number} 0 obj\n<< {dict_entries} >>\nstream\n").as_bytes());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    /// Marks `number` free in the next xref section.
    pub fn free(&mut self, number: u32, next_generation: u16) -> &mut Self {
        self.max_number = self.max_number.max(number);
        self.pending.insert(number, Row::Free(next_generation));
        self
    }

    /// Appends raw bytes, for damaging a file on purpose.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Ends a revision: xref rows for objects written since the last one,
    /// trailer, `startxref` and `%%EOF`. Returns the section's offset.
    pub fn revision(&mut self, trailer_entries: &str) -> usize {
        let xref_at = self.buf.len();
        let mut section = String::from("xref\n");
        if self.last_xref.is_none() {
            section.push_str("0 1\n0000000000 65535 f \n");
        }
        for (number, row) in std::mem::take(&mut self.pending) {
            let line = match row {
                Row::InUse(offset) => format!("{offset:010} 00000 n \n"),
                Row::Free(generation) => format!("0000000000 {generation:05} f \n"),
            };
            section.push_str(&format!("{number} 1\n{line}"));
        }
        let prev = self
            .last_xref
            .map(|p| format!(" /Prev {p}"))
            .unwrap_or_default();
        section.push_str(&format!(
            "trailer\n<< /Size {}{prev} {trailer_entries} >>\nstartxref\n{xref_at}\n%%EOF\n",
            self.max_number + 1
        ));
        self.buf.extend_from_slice(section.as_bytes());
        self.last_xref = Some(xref_at);
        xref_at
    }

    pub fn bytes(&self) -> Bytes {
        Bytes::from(self.buf.clone())
    }

    fn record(&mut self, number: u32) {
        self.max_number = self.max_number.max(number);
        self.pending.insert(number, Row::InUse(self.buf.len()));
    }
}

/// A one-page document whose page draws `content`.
pub fn single_page(content: &[u8]) -> PdfBuilder {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << >> >>",
        )
        .stream(4, "", content);
    pdf
}
