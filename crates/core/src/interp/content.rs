//! Content stream parser.
//!
//! Groups operand tokens under the operator keyword that follows them and
//! handles inline images (`BI ... ID <data> EI`), whose data is not
//! tokenizable and has to be delimited by length or by a plausible `EI`.

use std::mem;

use bytes::Bytes;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::codec::canonical_filter_name;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::model::color::{ColorSpace, INLINE_COLORSPACE_ABBREV};
use crate::model::object::{Dictionary, Name, Value};
use crate::parser::lexer::{Delimiter, Keyword, Lexer, Token, is_delimiter, is_whitespace};
use crate::parser::object_parser::{MAX_NESTING, ObjectParser};

/// Bytes after a candidate `EI` that must look like content.
const EI_LOOKAHEAD: usize = 32;

/// Operand lists rarely exceed six entries (`cm`, `c`, `d1`).
pub type Operands = SmallVec<[Value; 6]>;

/// Parameters and raw samples of an inline image.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Image dictionary with abbreviated keys and names expanded.
    pub params: Dictionary,
    pub data: Bytes,
}

/// One operator with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: SmolStr,
    pub operands: Operands,
    /// Set only for `BI`.
    pub inline_image: Option<InlineImage>,
    /// Offset of the operator keyword in the content bytes.
    pub offset: usize,
}

/// Context frame for array/dict/proc construction.
enum Frame {
    Array(Vec<Value>),
    Dict(Vec<Value>),
    Proc(Vec<Value>),
}

/// Streaming parser over decoded content bytes.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    operands: Operands,
    frames: Vec<Frame>,
    /// Openers dropped past `MAX_NESTING`, awaiting their closers.
    overflow: usize,
    diagnostics: Diagnostics,
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data, 0),
            operands: SmallVec::new(),
            frames: Vec::new(),
            overflow: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Malformed input skipped so far.
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        mem::take(&mut self.diagnostics)
    }

    fn malformed(&mut self, offset: usize, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(DiagnosticKind::MalformedToken, message).at(offset));
    }

    fn push_value(&mut self, value: Value) {
        match self.frames.last_mut() {
            Some(Frame::Array(items) | Frame::Dict(items) | Frame::Proc(items)) => {
                items.push(value);
            }
            None => self.operands.push(value),
        }
    }

    fn open_frame(&mut self, offset: usize, frame: Frame) {
        if self.frames.len() < MAX_NESTING {
            self.frames.push(frame);
            return;
        }
        if self.overflow == 0 {
            self.malformed(offset, format!("nesting deeper than {MAX_NESTING} levels"));
        }
        self.overflow += 1;
    }

    fn close_frame(&mut self, offset: usize, delim: Delimiter) {
        if self.overflow > 0 {
            self.overflow -= 1;
            return;
        }
        let frame = self.frames.pop();
        match (frame, delim) {
            (Some(Frame::Array(items)), Delimiter::ArrayClose)
            | (Some(Frame::Proc(items)), Delimiter::BraceClose) => {
                self.push_value(Value::Array(items));
            }
            (Some(Frame::Dict(items)), Delimiter::DictClose) => {
                let dict = self.build_dict(offset, items);
                self.push_value(Value::Dictionary(dict));
            }
            (frame, delim) => {
                if let Some(frame) = frame {
                    self.frames.push(frame);
                }
                self.malformed(offset, format!("unbalanced {delim:?}"));
            }
        }
    }

    fn build_dict(&mut self, offset: usize, items: Vec<Value>) -> Dictionary {
        let mut dict = Dictionary::new();
        let mut iter = items.into_iter();
        while let Some(key) = iter.next() {
            let value = iter.next().unwrap_or(Value::Null);
            match key {
                Value::Name(name) => {
                    dict.insert(name, value);
                }
                other => self.malformed(
                    offset,
                    format!("dictionary key is {}, not a name", other.type_name()),
                ),
            }
        }
        dict
    }

    /// Folds unterminated arrays and dicts into the operand list.
    fn collapse_frames(&mut self, offset: usize) {
        self.overflow = 0;
        if self.frames.is_empty() {
            return;
        }
        self.malformed(offset, "operator inside an unterminated array or dictionary");
        while let Some(frame) = self.frames.pop() {
            let value = match frame {
                Frame::Array(items) | Frame::Proc(items) => Value::Array(items),
                Frame::Dict(items) => Value::Dictionary(self.build_dict(offset, items)),
            };
            self.push_value(value);
        }
    }

    /// Reads `... ID <data> EI` after a `BI` keyword at `offset`.
    fn inline_image(&mut self, offset: usize) -> Operation {
        let data = self.lexer.data();
        let operands = mem::take(&mut self.operands);
        let mut parser = ObjectParser::new(data, self.lexer.tell());
        let mut params = Dictionary::new();
        let mut damaged = false;

        let id_end = loop {
            match parser.next_token() {
                None => break None,
                Some((pos, Token::Keyword(Keyword::Other(kw)))) if kw == "ID" => {
                    break Some(pos + 2);
                }
                Some((pos, Token::Name(key))) => match parser.parse_value() {
                    Ok(value) => {
                        let key = expand_key(&key);
                        let value = expand_value(&key, value);
                        params.insert(key, value);
                    }
                    Err(err) => {
                        self.malformed(pos, format!("inline image parameter: {err}"));
                        damaged = true;
                    }
                },
                // The rest of a rejected parameter.
                Some(_) if damaged => {}
                Some((pos, token)) => {
                    self.malformed(pos, format!("unexpected {token:?} in inline image"));
                }
            }
        };

        let Some(id_end) = id_end else {
            self.malformed(offset, "BI without ID");
            self.lexer.set_pos(data.len());
            return Operation {
                operator: SmolStr::new_static("BI"),
                operands,
                inline_image: Some(InlineImage {
                    params,
                    data: Bytes::new(),
                }),
                offset,
            };
        };

        // A single whitespace byte separates ID from the data.
        let start = match data.get(id_end) {
            Some(&b) if is_whitespace(b) => id_end + 1,
            _ => id_end,
        }
        .min(data.len());

        let (end, resume) = match inline_data_end(data, start, &params) {
            Some(found) => found,
            None => {
                self.malformed(offset, "inline image data runs to the end of the stream");
                (data.len(), data.len())
            }
        };
        self.lexer.set_pos(resume);
        tracing::trace!(offset, len = end - start, "inline image");

        Operation {
            operator: SmolStr::new_static("BI"),
            operands,
            inline_image: Some(InlineImage {
                params,
                data: Bytes::copy_from_slice(&data[start..end]),
            }),
            offset,
        }
    }
}

impl Iterator for ContentParser<'_> {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        loop {
            let Some((pos, token)) = self.lexer.next_token() else {
                if !self.operands.is_empty() || !self.frames.is_empty() {
                    let at = self.lexer.tell();
                    self.malformed(at, "operands without an operator at end of stream");
                    self.operands.clear();
                    self.frames.clear();
                }
                self.overflow = 0;
                return None;
            };
            match token {
                Token::Int(n) => self.push_value(Value::Int(n)),
                Token::Real(n) => self.push_value(Value::Real(n)),
                Token::String(s) | Token::HexString(s) => self.push_value(Value::String(s)),
                Token::Name(n) => self.push_value(Value::Name(n)),
                Token::Delim(Delimiter::ArrayOpen) => self.open_frame(pos, Frame::Array(Vec::new())),
                Token::Delim(Delimiter::DictOpen) => self.open_frame(pos, Frame::Dict(Vec::new())),
                Token::Delim(Delimiter::BraceOpen) => self.open_frame(pos, Frame::Proc(Vec::new())),
                Token::Delim(delim) => self.close_frame(pos, delim),
                Token::Keyword(Keyword::True) => self.push_value(Value::Bool(true)),
                Token::Keyword(Keyword::False) => self.push_value(Value::Bool(false)),
                Token::Keyword(Keyword::Null) => self.push_value(Value::Null),
                Token::Keyword(kw) => {
                    self.collapse_frames(pos);
                    if kw.as_str() == "BI" {
                        return Some(self.inline_image(pos));
                    }
                    return Some(Operation {
                        operator: SmolStr::new(kw.as_str()),
                        operands: mem::take(&mut self.operands),
                        inline_image: None,
                        offset: pos,
                    });
                }
                Token::Unknown(b) => self.malformed(pos, format!("unexpected byte 0x{b:02x}")),
            }
        }
    }
}

/// Parses a whole content stream. Malformed tokens are skipped.
pub fn parse_content_stream(data: &[u8]) -> Vec<Operation> {
    ContentParser::new(data).collect()
}

fn expand_key(key: &str) -> Name {
    let full = match key {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "W" => "Width",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        other => other,
    };
    Name::new(full)
}

fn expand_value(key: &str, value: Value) -> Value {
    match (key, value) {
        ("ColorSpace", Value::Name(name)) => Value::Name(expand_colorspace(&name)),
        ("ColorSpace", Value::Array(mut items)) => {
            for item in &mut items {
                if let Value::Name(name) = item {
                    *name = expand_colorspace(name);
                }
            }
            Value::Array(items)
        }
        ("Filter", Value::Name(name)) => Value::name(canonical_filter_name(&name)),
        ("Filter", Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Name(name) => Value::name(canonical_filter_name(&name)),
                    other => other,
                })
                .collect(),
        ),
        (_, value) => value,
    }
}

fn expand_colorspace(name: &str) -> Name {
    INLINE_COLORSPACE_ABBREV
        .get(name)
        .map_or_else(|| Name::new(name), |full| Name::new_static(*full))
}

fn filter_names(params: &Dictionary) -> Vec<&str> {
    match params.get("Filter") {
        Some(Value::Name(name)) => vec![name.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_name().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Exact byte size of unfiltered samples, when every input is known.
fn unfiltered_size(params: &Dictionary) -> Option<usize> {
    let int = |key: &str| match params.get(key) {
        Some(Value::Int(n)) if *n > 0 => usize::try_from(*n).ok(),
        _ => None,
    };
    let width = int("Width")?;
    let height = int("Height")?;
    let mask = matches!(params.get("ImageMask"), Some(Value::Bool(true)));
    let (bpc, components) = if mask {
        (1, 1)
    } else {
        let space = ColorSpace::from_value(params.get("ColorSpace")?, &|v: &Value| v.clone())?;
        (int("BitsPerComponent")?, space.ncomponents())
    };
    if components == 0 {
        return None;
    }
    let row = width.checked_mul(bpc)?.checked_mul(components)?.div_ceil(8);
    row.checked_mul(height)
}

/// `(data_end, resume_pos)` for inline data starting at `start`.
fn inline_data_end(data: &[u8], start: usize, params: &Dictionary) -> Option<(usize, usize)> {
    if let Some(Value::Int(len)) = params.get("Length")
        && let Ok(len) = usize::try_from(*len)
    {
        let end = start.saturating_add(len).min(data.len());
        if let Some(resume) = ei_after(data, end) {
            return Some((end, resume));
        }
    }

    let filters = filter_names(params);
    match filters.first().copied() {
        Some("ASCII85Decode") => {
            if let Some(pos) = find(data, start, b"~>") {
                let end = pos + 2;
                if let Some(resume) = ei_after(data, end) {
                    return Some((end, resume));
                }
            }
        }
        Some("ASCIIHexDecode") => {
            if let Some(pos) = find(data, start, b">") {
                let end = pos + 1;
                if let Some(resume) = ei_after(data, end) {
                    return Some((end, resume));
                }
            }
        }
        Some(_) => {}
        None => {
            if let Some(size) = unfiltered_size(params)
                && let Some(end) = start.checked_add(size)
                && end <= data.len()
                && let Some(resume) = ei_after(data, end)
            {
                return Some((end, resume));
            }
        }
    }

    scan_for_ei(data, start)
}

fn find(data: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    data.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

/// Position after an `EI` that follows `pos` across whitespace.
fn ei_after(data: &[u8], mut pos: usize) -> Option<usize> {
    while data.get(pos).is_some_and(|&b| is_whitespace(b)) {
        pos += 1;
    }
    let rest = data.get(pos..)?;
    if !rest.starts_with(b"EI") {
        return None;
    }
    match rest.get(2) {
        None => Some(pos + 2),
        Some(&b) if is_whitespace(b) || is_delimiter(b) => Some(pos + 2),
        Some(_) => None,
    }
}

/// Finds the first `EI` that is whitespace-delimited and followed by
/// bytes that read as content.
fn scan_for_ei(data: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut from = start;
    while let Some(pos) = find(data, from, b"EI") {
        if plausible_ei(data, start, pos) {
            let end = if pos > start && is_whitespace(data[pos - 1]) {
                pos - 1
            } else {
                pos
            };
            return Some((end, pos + 2));
        }
        from = pos + 1;
    }
    None
}

const fn is_text_byte(b: u8) -> bool {
    b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c')
}

fn plausible_ei(data: &[u8], start: usize, pos: usize) -> bool {
    let before = pos == start || is_whitespace(data[pos - 1]);
    let after = pos + 2;
    let delimited = data.get(after).is_none_or(|&b| is_whitespace(b));
    if !before || !delimited {
        return false;
    }

    let window_end = (after + EI_LOOKAHEAD).min(data.len());
    if !data[after..window_end].iter().all(|&b| is_text_byte(b)) {
        return false;
    }
    let mut lexer = Lexer::new(data, after);
    while let Some((tok_pos, token)) = lexer.next_token() {
        if tok_pos >= window_end {
            break;
        }
        match token {
            Token::Unknown(_) => return false,
            Token::Keyword(Keyword::Other(op)) if op.len() > 3 => return false,
            Token::Keyword(Keyword::Other(_) | Keyword::True | Keyword::False | Keyword::Null) => {}
            Token::Keyword(_) => return false,
            _ => {}
        }
    }
    true
}
