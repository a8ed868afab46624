//! Token lexer for the object and content syntax.
//!
//! Works over one contiguous byte slice and never fails: malformed input
//! yields `Token::Unknown` and the caller decides whether to skip or stop.

use smol_str::SmolStr;

/// Structural delimiters that are tokens of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    ArrayOpen,
    ArrayClose,
    DictOpen,
    DictClose,
    BraceOpen,
    BraceClose,
}

/// Bare words. Everything outside the fixed set is `Other`, which is how
/// content-stream operators arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    Null,
    Obj,
    EndObj,
    Stream,
    EndStream,
    R,
    Xref,
    Trailer,
    StartXref,
    Other(SmolStr),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"true" => Self::True,
            b"false" => Self::False,
            b"null" => Self::Null,
            b"obj" => Self::Obj,
            b"endobj" => Self::EndObj,
            b"stream" => Self::Stream,
            b"endstream" => Self::EndStream,
            b"R" => Self::R,
            b"xref" => Self::Xref,
            b"trailer" => Self::Trailer,
            b"startxref" => Self::StartXref,
            other => Self::Other(SmolStr::new(String::from_utf8_lossy(other))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Obj => "obj",
            Self::EndObj => "endobj",
            Self::Stream => "stream",
            Self::EndStream => "endstream",
            Self::R => "R",
            Self::Xref => "xref",
            Self::Trailer => "trailer",
            Self::StartXref => "startxref",
            Self::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Real(f64),
    /// `( ... )` with escapes already applied.
    String(Vec<u8>),
    /// `< ... >` decoded to bytes.
    HexString(Vec<u8>),
    /// `/Name` with `#XX` escapes decoded.
    Name(SmolStr),
    Delim(Delimiter),
    Keyword(Keyword),
    /// A byte that cannot start any token (stray `)` or `>`).
    Unknown(u8),
}

impl Token {
    pub fn is_keyword(&self, kw: &Keyword) -> bool {
        matches!(self, Self::Keyword(k) if k == kw)
    }
}

pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

const fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Name bytes are usually UTF-8; anything else maps byte-per-char.
fn name_from_bytes(bytes: Vec<u8>) -> SmolStr {
    match String::from_utf8(bytes) {
        Ok(s) => SmolStr::new(s),
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

/// Restartable tokenizer. Yields `(offset, token)` pairs.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8], start: usize) -> Self {
        Self {
            data,
            pos: start.min(data.len()),
        }
    }

    pub const fn tell(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub const fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Skips whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'%' {
                while let Some(c) = self.advance() {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                }
                continue;
            }
            if !is_whitespace(b) {
                return;
            }
            self.pos += 1;
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&self) -> Option<(usize, Token)> {
        self.clone().next_token()
    }

    pub fn next_token(&mut self) -> Option<(usize, Token)> {
        self.skip_whitespace();
        let start = self.pos;
        let b = self.peek()?;

        let token = match b {
            b'/' => self.lex_name(),
            b'(' => self.lex_string(),
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                Token::Delim(Delimiter::DictOpen)
            }
            b'<' => self.lex_hex_string(),
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                Token::Delim(Delimiter::DictClose)
            }
            b'[' => self.single(Token::Delim(Delimiter::ArrayOpen)),
            b']' => self.single(Token::Delim(Delimiter::ArrayClose)),
            b'{' => self.single(Token::Delim(Delimiter::BraceOpen)),
            b'}' => self.single(Token::Delim(Delimiter::BraceClose)),
            b')' | b'>' => self.single(Token::Unknown(b)),
            b'+' | b'-' if self.starts_number(1) => self.lex_number(),
            b'.' if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) => self.lex_number(),
            c if c.is_ascii_digit() => self.lex_number(),
            _ => self.lex_keyword(),
        };

        Some((start, token))
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn starts_number(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some(c) if c.is_ascii_digit() => true,
            Some(b'.') => matches!(self.peek_at(offset + 1), Some(c) if c.is_ascii_digit()),
            _ => false,
        }
    }

    fn lex_name(&mut self) -> Token {
        self.pos += 1;
        let mut name = Vec::new();

        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            if b == b'#'
                && let (Some(h1), Some(h2)) = (
                    self.peek_at(1).and_then(hex_value),
                    self.peek_at(2).and_then(hex_value),
                )
            {
                self.pos += 3;
                name.push((h1 << 4) | h2);
                continue;
            }
            // A lone '#' is kept literally.
            name.push(b);
            self.pos += 1;
        }

        Token::Name(name_from_bytes(name))
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        let mut has_dot = false;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else if b == b'.' && !has_dot {
                has_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        // Only ASCII digits, sign and '.' were consumed.
        let text = String::from_utf8_lossy(&self.data[start..self.pos]);
        if !has_dot && let Ok(n) = text.parse::<i64>() {
            return Token::Int(n);
        }
        // Reals, and integers too large for i64.
        match text.parse::<f64>() {
            Ok(n) => Token::Real(n),
            Err(_) => Token::Keyword(Keyword::Other(SmolStr::new(text))),
        }
    }

    fn lex_string(&mut self) -> Token {
        self.pos += 1;
        let mut result = Vec::new();
        let mut depth = 1;

        // Unterminated strings yield what was read.
        while let Some(c) = self.advance() {
            match c {
                b'(' => {
                    depth += 1;
                    result.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(c);
                }
                b'\\' => self.lex_escape(&mut result),
                b'\r' => {
                    // End-of-line markers inside strings read as LF.
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    result.push(b'\n');
                }
                _ => result.push(c),
            }
        }

        Token::String(result)
    }

    fn lex_escape(&mut self, out: &mut Vec<u8>) {
        match self.advance() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'b') => out.push(0x08),
            Some(b'f') => out.push(0x0c),
            Some(b'\r') => {
                // Line continuation
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => {}
            Some(c @ b'0'..=b'7') => {
                let mut octal = u32::from(c - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            self.pos += 1;
                            octal = octal * 8 + u32::from(d - b'0');
                        }
                        _ => break,
                    }
                }
                out.push((octal & 0xff) as u8);
            }
            // Unknown escapes keep the character; this covers `\(`, `\)`, `\\`.
            Some(c) => out.push(c),
            None => {}
        }
    }

    fn lex_hex_string(&mut self) -> Token {
        self.pos += 1;
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        while let Some(c) = self.peek() {
            if c == b'>' {
                self.pos += 1;
                break;
            }
            if let Some(nibble) = hex_value(c) {
                match pending.take() {
                    Some(high) => result.push((high << 4) | nibble),
                    None => pending = Some(nibble),
                }
            } else if !is_whitespace(c) {
                // Invalid character ends the string without consuming it.
                break;
            }
            self.pos += 1;
        }

        // An odd final digit is followed by an implied 0.
        if let Some(high) = pending {
            result.push(high << 4);
        }

        Token::HexString(result)
    }

    fn lex_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            // Only reachable for delimiters handled above; never loop.
            self.pos += 1;
            return Token::Unknown(self.data[start]);
        }
        Token::Keyword(Keyword::from_bytes(&self.data[start..self.pos]))
    }
}

impl Iterator for Lexer<'_> {
    type Item = (usize, Token);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(data: &[u8]) -> Vec<Token> {
        Lexer::new(data, 0).map(|(_, t)| t).collect()
    }

    #[test]
    fn test_keyword_from_bytes() {
        assert_eq!(Keyword::from_bytes(b"obj"), Keyword::Obj);
        assert_eq!(Keyword::from_bytes(b"endstream"), Keyword::EndStream);
        assert_eq!(Keyword::from_bytes(b"R"), Keyword::R);
        assert_eq!(Keyword::from_bytes(b"BT"), Keyword::Other("BT".into()));
        assert_eq!(Keyword::Other("Tj".into()).as_str(), "Tj");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens(b"1 -2 +3 .5 -.5 4. 0.25"),
            vec![
                Token::Int(1),
                Token::Int(-2),
                Token::Int(3),
                Token::Real(0.5),
                Token::Real(-0.5),
                Token::Real(4.0),
                Token::Real(0.25),
            ]
        );
    }

    #[test]
    fn test_offsets() {
        let toks: Vec<_> = Lexer::new(b"  12 /A", 0).collect();
        assert_eq!(toks[0].0, 2);
        assert_eq!(toks[1], (5, Token::Name("A".into())));
    }

    #[test]
    fn test_hex_odd_digit_padded() {
        assert_eq!(tokens(b"<41 4>"), vec![Token::HexString(vec![0x41, 0x40])]);
    }

    #[test]
    fn test_name_hex_escape() {
        assert_eq!(tokens(b"/A#42C"), vec![Token::Name("ABC".into())]);
        assert_eq!(tokens(b"/A#zz"), vec![Token::Name("A#zz".into())]);
    }

    #[test]
    fn test_comment_skipped() {
        assert_eq!(
            tokens(b"1 % comment\n2"),
            vec![Token::Int(1), Token::Int(2)]
        );
    }

    #[test]
    fn test_stray_delimiters_are_unknown() {
        assert_eq!(
            tokens(b") > q"),
            vec![
                Token::Unknown(b')'),
                Token::Unknown(b'>'),
                Token::Keyword(Keyword::Other("q".into()))
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(tokens(b"(abc"), vec![Token::String(b"abc".to_vec())]);
    }

    #[test]
    fn test_set_pos_restarts() {
        let mut lexer = Lexer::new(b"1 2 3", 0);
        lexer.next_token();
        lexer.next_token();
        lexer.set_pos(0);
        assert_eq!(lexer.next_token(), Some((0, Token::Int(1))));
    }
}
