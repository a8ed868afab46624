//! Document loading: byte source to resolved object graph.
//!
//! Reads every cross-reference section reachable from `startxref` (classic
//! tables, xref streams and hybrid files), hands them to the
//! [`XrefResolver`], and wraps the result in an [`ObjectGraph`]. When the
//! primary section cannot be read, every section found by scanning the file
//! is registered so the resolver falls back to a full merge.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use regex::bytes::Regex;
use rustc_hash::FxHashSet;

use super::graph::ObjectGraph;
use super::scratch::ScratchStore;
use super::source::ByteSource;
use super::xref::{Location, RevisionFragment, XrefEntry, XrefResolver};
use crate::codec::{self, FlateDecoder, StreamDecoder};
use crate::config::ParseParams;
use crate::diagnostics::Diagnostics;
use crate::error::{PdfError, Result};
use crate::model::object::{Dictionary, ObjectKey, Value};
use crate::parser::lexer::{Keyword, Lexer, Token, is_whitespace};
use crate::parser::object_parser::{ObjectParser, parse_object_at};

/// A loaded document.
#[derive(Debug)]
pub struct Document {
    graph: ObjectGraph,
}

impl Document {
    /// Loads a document with the default Flate decoder.
    pub fn load<S: ByteSource + ?Sized>(source: &S, params: &ParseParams) -> Result<Self> {
        Self::load_with_decoder(source, params, Arc::new(FlateDecoder))
    }

    /// Loads a document, decoding streams through `decoder`.
    pub fn load_with_decoder<S: ByteSource + ?Sized>(
        source: &S,
        params: &ParseParams,
        decoder: Arc<dyn StreamDecoder>,
    ) -> Result<Self> {
        let data = read_source(source, params)?;
        Self::from_bytes(data, params, decoder)
    }

    /// Loads a document already held in memory, without copying it.
    pub fn from_bytes(
        data: Bytes,
        params: &ParseParams,
        decoder: Arc<dyn StreamDecoder>,
    ) -> Result<Self> {
        if let Some(limit) = params.max_document_bytes
            && data.len() > limit
        {
            return Err(PdfError::ScratchExhausted { retained: 0 });
        }

        let mut diags = Diagnostics::new();
        let mut resolver = XrefResolver::new();
        let startxref = find_startxref(&data);

        let primary_read = match startxref {
            Some(start) => load_chain(&data, start, &mut resolver, decoder.as_ref(), &mut diags),
            None => {
                tracing::debug!("no startxref pointer found");
                false
            }
        };
        if !primary_read {
            scan_sections(&data, &mut resolver, decoder.as_ref(), &mut diags)?;
        }

        // A missing pointer cannot match any section, which selects the full merge.
        let table = resolver.resolve(startxref.unwrap_or(data.len()), &mut diags)?;
        let graph = ObjectGraph::new(data, table, params, decoder);
        graph.absorb(diags);
        Ok(Self { graph })
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> ObjectGraph {
        self.graph
    }

    pub fn trailer(&self) -> &Dictionary {
        self.graph.trailer()
    }

    /// The resolved `/Root` dictionary, or `Null`.
    pub fn catalog(&self) -> Value {
        self.graph.resolve_opt(self.trailer().get("Root"))
    }

    /// Drains diagnostics recorded while loading and reading objects.
    pub fn take_diagnostics(&self) -> Diagnostics {
        self.graph.take_diagnostics()
    }
}

/// Reads the source block by block into the scratch store, which enforces
/// `max_document_bytes` as it grows, then hands its blocks over as one
/// buffer.
fn read_source<S: ByteSource + ?Sized>(source: &S, params: &ParseParams) -> Result<Bytes> {
    let len = source.len();
    let mut scratch =
        ScratchStore::new(params.scratch_block_size).with_limit(params.max_document_bytes);
    let mut buf = vec![0u8; scratch.block_size()];
    let mut pos = 0;
    while pos < len {
        let n = source.read_at(pos, &mut buf)?;
        if n == 0 {
            break;
        }
        scratch.append(&buf[..n])?;
        pos += n;
    }
    scratch.into_bytes()
}

/// Offset named by the last `startxref` in the file.
pub fn find_startxref(data: &[u8]) -> Option<usize> {
    const NEEDLE: &[u8] = b"startxref";
    let tail_start = data.len().saturating_sub(1024);
    let find_last = |from: usize| {
        data.get(from..)?
            .windows(NEEDLE.len())
            .rposition(|w| w == NEEDLE)
            .map(|p| from + p)
    };
    let at = find_last(tail_start).or_else(|| find_last(0))?;

    let mut lexer = Lexer::new(data, at + NEEDLE.len());
    match lexer.next_token()? {
        (_, Token::Int(n)) => usize::try_from(n).ok(),
        _ => None,
    }
}

/// Reads the section at `start` and every section its trailers point to.
/// Returns whether the section at `start` itself was readable.
fn load_chain(
    data: &Bytes,
    start: usize,
    resolver: &mut XrefResolver,
    decoder: &dyn StreamDecoder,
    diags: &mut Diagnostics,
) -> bool {
    let mut pending = vec![start];
    let mut visited = FxHashSet::default();
    let mut primary_read = false;

    while let Some(pos) = pending.pop() {
        if !visited.insert(pos) {
            continue;
        }
        match read_section(data, pos, decoder, diags) {
            Ok(fragment) => {
                if pos == start {
                    primary_read = true;
                }
                if let Some(prev) = fragment.prev() {
                    pending.push(prev);
                }
                resolver.add_fragment(pos, fragment.entries, fragment.trailer);
            }
            Err(err) => {
                tracing::debug!(offset = pos, error = %err, "unreadable xref section");
            }
        }
    }

    primary_read
}

/// Reads a classic table or an xref stream at `pos`.
pub fn read_section(
    data: &Bytes,
    pos: usize,
    decoder: &dyn StreamDecoder,
    diags: &mut Diagnostics,
) -> Result<RevisionFragment> {
    let mut at = pos;
    while data.get(at).is_some_and(|&b| is_whitespace(b)) {
        at += 1;
    }
    if data.get(at..).is_some_and(|rest| rest.starts_with(b"xref")) {
        let mut fragment = read_classic_table(data, at)?;
        fragment.offset = pos;
        fold_hybrid_stream(data, &mut fragment, decoder, diags);
        Ok(fragment)
    } else {
        let mut fragment = read_xref_stream(data, at, decoder, diags)?;
        fragment.offset = pos;
        Ok(fragment)
    }
}

/// Parses `xref` subsections and the trailer dictionary that follows.
fn read_classic_table(data: &[u8], pos: usize) -> Result<RevisionFragment> {
    let mut parser = ObjectParser::new(data, pos);
    match parser.next_token() {
        Some((_, Token::Keyword(Keyword::Xref))) => {}
        _ => return Err(PdfError::syntax(pos, "expected 'xref'")),
    }

    let mut entries = BTreeMap::new();
    loop {
        let (at, token) = parser.next_token().ok_or(PdfError::UnexpectedEof)?;
        let first = match token {
            Token::Keyword(Keyword::Trailer) => break,
            Token::Int(n) => n,
            _ => return Err(PdfError::syntax(at, "expected subsection header")),
        };
        let count = match parser.next_token() {
            Some((_, Token::Int(n))) => n,
            _ => return Err(PdfError::syntax(at, "expected subsection count")),
        };

        let mut base = first;
        for i in 0..count.max(0) {
            let (row, offset, generation, marker) = match (
                parser.next_token(),
                parser.next_token(),
                parser.next_token(),
            ) {
                (
                    Some((row, Token::Int(offset))),
                    Some((_, Token::Int(generation))),
                    Some((_, Token::Keyword(Keyword::Other(marker)))),
                ) => (row, offset, generation, marker),
                _ => return Err(PdfError::syntax(at, "malformed xref entry")),
            };

            // Some writers start the first subsection at 1 but still include
            // the free entry for object 0.
            if i == 0 && base > 0 && marker.as_str() == "f" && offset == 0 && generation == 65535 {
                base -= 1;
            }
            let number = base
                .checked_add(i)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| PdfError::syntax(row, "object number out of range"))?;
            let generation = u16::try_from(generation).unwrap_or(u16::MAX);
            let entry = match marker.as_str() {
                "n" => XrefEntry::InUse(Location::Offset {
                    offset: usize::try_from(offset)
                        .map_err(|_| PdfError::syntax(row, "negative offset"))?,
                    generation,
                }),
                "f" => XrefEntry::Free {
                    next: u32::try_from(offset).unwrap_or(0),
                    generation,
                },
                other => {
                    return Err(PdfError::syntax(row, format!("bad xref marker '{other}'")));
                }
            };
            entries.insert(number, entry);
        }
    }

    let trailer = match parser.parse_value()? {
        Value::Dictionary(d) => d,
        other => {
            return Err(PdfError::syntax(
                parser.tell(),
                format!("trailer is a {}", other.type_name()),
            ));
        }
    };

    Ok(RevisionFragment {
        offset: pos,
        entries,
        trailer: Some(trailer),
    })
}

/// Folds a hybrid file's `/XRefStm` entries into the classic fragment.
/// Entries already in the table take precedence.
fn fold_hybrid_stream(
    data: &Bytes,
    fragment: &mut RevisionFragment,
    decoder: &dyn StreamDecoder,
    diags: &mut Diagnostics,
) {
    let Some(Value::Int(stm)) = fragment.trailer.as_ref().and_then(|t| t.get("XRefStm")) else {
        return;
    };
    let Ok(stm) = usize::try_from(*stm) else {
        return;
    };
    match read_xref_stream(data, stm, decoder, diags) {
        Ok(hidden) => {
            for (number, entry) in hidden.entries {
                fragment.entries.entry(number).or_insert(entry);
            }
        }
        Err(err) => {
            tracing::debug!(offset = stm, error = %err, "unreadable XRefStm");
        }
    }
}

/// Parses a cross-reference stream object.
fn read_xref_stream(
    data: &Bytes,
    pos: usize,
    decoder: &dyn StreamDecoder,
    diags: &mut Diagnostics,
) -> Result<RevisionFragment> {
    let (_, value) = parse_object_at(data, pos, diags)?;
    let stream = value.as_stream()?;

    let widths = stream
        .get("W")
        .ok_or_else(|| PdfError::syntax(pos, "missing W in xref stream"))?
        .as_numbers()?;
    let &[w0, w1, w2] = widths.as_slice() else {
        return Err(PdfError::syntax(pos, "W must have 3 elements"));
    };
    let (w0, w1, w2) = (field_width(pos, w0)?, field_width(pos, w1)?, field_width(pos, w2)?);
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(PdfError::syntax(pos, "W describes empty entries"));
    }

    let size = stream.get("Size").and_then(|v| v.as_int().ok()).unwrap_or(0);
    let index: Vec<(i64, i64)> = match stream.get("Index") {
        Some(idx) => idx
            .as_array()?
            .chunks_exact(2)
            .map(|pair| -> Result<(i64, i64)> { Ok((pair[0].as_int()?, pair[1].as_int()?)) })
            .collect::<Result<_>>()?,
        None => vec![(0, size)],
    };

    // Xref streams cannot use indirect filter parameters.
    let rows = codec::decode_stream(stream, decoder, &|v| v.clone())?;

    let mut entries = BTreeMap::new();
    let mut chunks = rows.chunks_exact(entry_size);
    'sections: for (first, count) in index {
        for i in 0..count.max(0) {
            let Some(row) = chunks.next() else {
                break 'sections;
            };
            let kind = if w0 > 0 { read_be(&row[..w0]) } else { 1 };
            let f1 = read_be(&row[w0..w0 + w1]);
            let f2 = read_be(&row[w0 + w1..]);
            let Some(number) = first.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                continue;
            };
            let entry = match kind {
                0 => XrefEntry::Free {
                    next: f1 as u32,
                    generation: f2 as u16,
                },
                1 => XrefEntry::InUse(Location::Offset {
                    offset: f1 as usize,
                    generation: f2 as u16,
                }),
                2 => XrefEntry::InUse(Location::Compressed {
                    container: ObjectKey::new(f1 as u32, 0),
                    index: f2 as u32,
                }),
                // Unknown types are references to null.
                _ => continue,
            };
            entries.insert(number, entry);
        }
    }

    let mut trailer = stream.dict.clone();
    for key in ["Length", "Filter", "DecodeParms", "W", "Index"] {
        trailer.shift_remove(key);
    }

    Ok(RevisionFragment {
        offset: pos,
        entries,
        trailer: Some(trailer),
    })
}

/// One `/W` entry. Fields are read into a `u64`, so eight bytes at most.
fn field_width(pos: usize, width: f64) -> Result<usize> {
    if width.fract() == 0.0 && (0.0..=8.0).contains(&width) {
        Ok(width as usize)
    } else {
        Err(PdfError::syntax(pos, format!("xref stream field width {width}")))
    }
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Registers every classic table and xref stream found anywhere in the file.
fn scan_sections(
    data: &Bytes,
    resolver: &mut XrefResolver,
    decoder: &dyn StreamDecoder,
    diags: &mut Diagnostics,
) -> Result<()> {
    let table_re = Regex::new(r"(?-u)\bxref\b").map_err(|e| PdfError::syntax(0, e.to_string()))?;
    let stream_re =
        Regex::new(r"(?-u)/Type\s*/XRef\b").map_err(|e| PdfError::syntax(0, e.to_string()))?;
    let header_re =
        Regex::new(r"(?-u)\d+\s+\d+\s+obj\b").map_err(|e| PdfError::syntax(0, e.to_string()))?;

    let mut candidates: Vec<usize> = table_re.find_iter(data).map(|m| m.start()).collect();
    for m in stream_re.find_iter(data) {
        let window_start = m.start().saturating_sub(4096);
        if let Some(header) = header_re.find_iter(&data[window_start..m.start()]).last() {
            candidates.push(window_start + header.start());
        }
    }
    candidates.sort_unstable();
    candidates.dedup();

    for pos in candidates {
        if resolver.contains(pos) {
            continue;
        }
        match read_section(data, pos, decoder, diags) {
            Ok(fragment) => resolver.add_fragment(pos, fragment.entries, fragment.trailer),
            Err(err) => tracing::debug!(offset = pos, error = %err, "skipping scanned section"),
        }
    }
    tracing::debug!(
        sections = resolver.fragment_count(),
        "registered sections by scanning"
    );
    Ok(())
}
