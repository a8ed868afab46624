//! Object parser: tokens to `Value`s, and `N G obj ... endobj` framing.

use std::collections::VecDeque;

use bytes::Bytes;

use super::lexer::{Delimiter, Keyword, Lexer, Token};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{PdfError, Result};
use crate::model::object::{Dictionary, ObjectKey, Stream, Value};

/// Deepest array/dictionary nesting accepted before parsing gives up.
pub const MAX_NESTING: usize = 256;

/// Builds values from the token stream, with the pushback needed to
/// recognize `N G R`.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    pending: VecDeque<(usize, Token)>,
    depth: usize,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            lexer: Lexer::new(data, pos),
            pending: VecDeque::new(),
            depth: 0,
        }
    }

    /// Position of the next unread token.
    pub fn tell(&self) -> usize {
        self.pending
            .front()
            .map_or_else(|| self.lexer.tell(), |(pos, _)| *pos)
    }

    pub fn next_token(&mut self) -> Option<(usize, Token)> {
        self.pending.pop_front().or_else(|| self.lexer.next_token())
    }

    fn push_back(&mut self, tok: (usize, Token)) {
        self.pending.push_front(tok);
    }

    /// Parses one value.
    pub fn parse_value(&mut self) -> Result<Value> {
        let (pos, token) = self.next_token().ok_or(PdfError::UnexpectedEof)?;
        self.token_to_value(pos, token)
    }

    fn token_to_value(&mut self, pos: usize, token: Token) -> Result<Value> {
        match token {
            Token::Int(n) => Ok(self.maybe_reference(n)),
            Token::Real(n) => Ok(Value::Real(n)),
            Token::String(s) | Token::HexString(s) => Ok(Value::String(s)),
            Token::Name(n) => Ok(Value::Name(n)),
            Token::Keyword(Keyword::True) => Ok(Value::Bool(true)),
            Token::Keyword(Keyword::False) => Ok(Value::Bool(false)),
            Token::Keyword(Keyword::Null) => Ok(Value::Null),
            Token::Delim(Delimiter::ArrayOpen) => self.nested(pos, Self::parse_array),
            Token::Delim(Delimiter::DictOpen) => self.nested(pos, Self::parse_dict),
            Token::Keyword(kw) => Err(PdfError::syntax(
                pos,
                format!("unexpected keyword: {}", kw.as_str()),
            )),
            Token::Delim(d) => Err(PdfError::syntax(pos, format!("unexpected {d:?}"))),
            Token::Unknown(b) => Err(PdfError::syntax(
                pos,
                format!("unexpected byte 0x{b:02x}"),
            )),
        }
    }

    fn nested(&mut self, pos: usize, parse: fn(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth >= MAX_NESTING {
            return Err(PdfError::syntax(
                pos,
                format!("nesting deeper than {MAX_NESTING} levels"),
            ));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    /// `n` alone, or the start of `n g R`.
    fn maybe_reference(&mut self, n: i64) -> Value {
        let Some(second) = self.next_token() else {
            return Value::Int(n);
        };
        if let Token::Int(g) = second.1 {
            match self.next_token() {
                Some((_, Token::Keyword(Keyword::R))) => {
                    if let (Ok(number), Ok(generation)) = (u32::try_from(n), u16::try_from(g)) {
                        return Value::Reference(ObjectKey::new(number, generation));
                    }
                    // Out-of-range keys address nothing.
                    return Value::Null;
                }
                Some(third) => self.push_back(third),
                None => {}
            }
        }
        self.push_back(second);
        Value::Int(n)
    }

    fn parse_array(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        loop {
            let (pos, token) = self.next_token().ok_or(PdfError::UnexpectedEof)?;
            match token {
                Token::Delim(Delimiter::ArrayClose) => break,
                Token::Unknown(_) => continue,
                other => items.push(self.token_to_value(pos, other)?),
            }
        }
        Ok(Value::Array(items))
    }

    fn parse_dict(&mut self) -> Result<Value> {
        let mut dict = Dictionary::new();
        loop {
            let (pos, token) = self.next_token().ok_or(PdfError::UnexpectedEof)?;
            let key = match token {
                Token::Delim(Delimiter::DictClose) => break,
                Token::Name(name) => name,
                _ => return Err(PdfError::syntax(pos, "expected name as dict key")),
            };
            // `/Key >>` reads as a null entry.
            match self.next_token() {
                Some((_, Token::Delim(Delimiter::DictClose))) => {
                    dict.insert(key, Value::Null);
                    break;
                }
                Some(tok) => self.push_back(tok),
                None => return Err(PdfError::UnexpectedEof),
            }
            let value = self.parse_value()?;
            dict.insert(key, value);
        }
        Ok(Value::Dictionary(dict))
    }
}

/// Parses a single direct value starting at `pos`.
pub fn parse_value_at(data: &[u8], pos: usize) -> Result<Value> {
    ObjectParser::new(data, pos).parse_value()
}

/// Parses an indirect object at `offset`.
///
/// Indirect `/Length` entries are left to the `endstream` scan.
pub fn parse_object_at(
    data: &Bytes,
    offset: usize,
    diags: &mut Diagnostics,
) -> Result<(ObjectKey, Value)> {
    parse_object_at_with(data, offset, &|_| None, diags)
}

/// Parses an indirect object at `offset`, resolving an indirect stream
/// `/Length` through `resolve_length`.
pub fn parse_object_at_with(
    data: &Bytes,
    offset: usize,
    resolve_length: &dyn Fn(ObjectKey) -> Option<i64>,
    diags: &mut Diagnostics,
) -> Result<(ObjectKey, Value)> {
    let mut parser = ObjectParser::new(data, offset);

    let key = match (
        parser.next_token(),
        parser.next_token(),
        parser.next_token(),
    ) {
        (
            Some((_, Token::Int(num))),
            Some((_, Token::Int(generation))),
            Some((_, Token::Keyword(Keyword::Obj))),
        ) => {
            let number = u32::try_from(num)
                .map_err(|_| PdfError::syntax(offset, format!("bad object number {num}")))?;
            let generation = u16::try_from(generation).map_err(|_| {
                PdfError::syntax(offset, format!("bad generation {generation}"))
            })?;
            ObjectKey::new(number, generation)
        }
        _ => return Err(PdfError::syntax(offset, "expected 'N G obj'")),
    };

    let value = parser.parse_value()?;

    let Value::Dictionary(dict) = value else {
        return Ok((key, value));
    };
    match parser.next_token() {
        Some((pos, Token::Keyword(Keyword::Stream))) => {
            let data_start = stream_data_start(data, pos + b"stream".len());
            let declared = match dict.get("Length") {
                Some(Value::Int(n)) => Some(*n),
                Some(Value::Reference(k)) => resolve_length(*k),
                _ => None,
            };
            let end = stream_data_end(data, data_start, declared, key, diags);
            let stream = Stream::new(dict, data.slice(data_start..end));
            Ok((key, Value::Stream(Box::new(stream))))
        }
        _ => Ok((key, Value::Dictionary(dict))),
    }
}

/// Skips the EOL after the `stream` keyword.
fn stream_data_start(data: &[u8], mut pos: usize) -> usize {
    while data.get(pos) == Some(&b' ') {
        pos += 1;
    }
    match (data.get(pos), data.get(pos + 1)) {
        (Some(b'\r'), Some(b'\n')) => pos + 2,
        (Some(b'\r' | b'\n'), _) => pos + 1,
        _ => pos,
    }
}

/// Trusts `/Length` when `endstream` follows it; otherwise scans.
fn stream_data_end(
    data: &[u8],
    start: usize,
    declared: Option<i64>,
    key: ObjectKey,
    diags: &mut Diagnostics,
) -> usize {
    if let Some(len) = declared
        && let Ok(len) = usize::try_from(len)
        && let Some(end) = start.checked_add(len)
        && end <= data.len()
        && followed_by_endstream(data, end)
    {
        return end;
    }

    let scanned = find_endstream(data, start).map(|pos| trim_eol(data, start, pos));
    let end = scanned.unwrap_or(data.len());
    diags.push(
        Diagnostic::new(
            DiagnosticKind::StreamLengthMismatch,
            format!(
                "stream {key}: declared length {declared:?}, endstream found after {} bytes",
                end - start
            ),
        )
        .at(start),
    );
    end
}

fn followed_by_endstream(data: &[u8], mut pos: usize) -> bool {
    while let Some(&b) = data.get(pos) {
        if !super::lexer::is_whitespace(b) {
            break;
        }
        pos += 1;
    }
    data[pos.min(data.len())..].starts_with(b"endstream")
}

pub(crate) fn find_endstream(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(b"endstream".len())
        .position(|w| w == b"endstream")
        .map(|p| from + p)
}

/// Drops one EOL marker before `end`.
fn trim_eol(data: &[u8], start: usize, end: usize) -> usize {
    if end >= start + 2 && &data[end - 2..end] == b"\r\n" {
        end - 2
    } else if end > start && matches!(data[end - 1], b'\r' | b'\n') {
        end - 1
    } else {
        end
    }
}
