//! Document object types.
//!
//! `Value` is the in-memory form of every object the format can express.
//! References are plain keys; following them is the graph's job, never
//! equality's or clone's.

use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::{PdfError, Result};

/// Name object text (without the leading `/`).
pub type Name = SmolStr;

/// Dictionary storage. Equality ignores insertion order.
pub type Dictionary = IndexMap<Name, Value>;

/// Address of an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub number: u32,
    pub generation: u16,
}

impl ObjectKey {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// Dictionary plus raw, still-encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    data: Bytes,
}

impl Stream {
    pub fn new(dict: Dictionary, data: impl Into<Bytes>) -> Self {
        Self {
            dict,
            data: data.into(),
        }
    }

    /// Raw (undecoded) data.
    pub fn raw_data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Raw data as a shared slice of the source buffer.
    pub fn raw_bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.dict.get(key)
    }

    /// Looks up the first key present, for entries with abbreviations.
    pub fn get_any(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.dict.get(*k))
    }
}

/// A document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Byte string (literal or hex form; the distinction is not kept).
    String(Vec<u8>),
    Name(Name),
    Array(Vec<Self>),
    Dictionary(Dictionary),
    Stream(Box<Stream>),
    Reference(ObjectKey),
}

impl Value {
    pub fn name(s: &str) -> Self {
        Self::Name(SmolStr::new(s))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Real(_))
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Numeric value; integers are widened.
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[Self]> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    /// Dictionary, or the dictionary of a stream.
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Self::Dictionary(d) => Ok(d),
            Self::Stream(s) => Ok(&s.dict),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_reference(&self) -> Result<ObjectKey> {
        match self {
            Self::Reference(k) => Ok(*k),
            _ => Err(self.type_error("ref")),
        }
    }

    /// Reads an array of numbers.
    pub fn as_numbers(&self) -> Result<Vec<f64>> {
        self.as_array()?.iter().map(Self::as_num).collect()
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::String(_) => "string",
            Self::Name(_) => "name",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Reference(_) => "ref",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }

    /// Serializes into the file syntax. Reals always carry a decimal point
    /// so they lex back as reals.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => out.extend_from_slice(b"null"),
            Self::Bool(true) => out.extend_from_slice(b"true"),
            Self::Bool(false) => out.extend_from_slice(b"false"),
            Self::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
            Self::Real(n) => write_real(*n, out),
            Self::String(s) => write_literal_string(s, out),
            Self::Name(n) => write_name(n, out),
            Self::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            }
            Self::Dictionary(d) => write_dict(d, out),
            Self::Stream(s) => {
                write_dict(&s.dict, out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(s.raw_data());
                out.extend_from_slice(b"\nendstream");
            }
            Self::Reference(k) => {
                out.extend_from_slice(format!("{} {} R", k.number, k.generation).as_bytes());
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Real(n)
    }
}

impl From<ObjectKey> for Value {
    fn from(k: ObjectKey) -> Self {
        Self::Reference(k)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Self::Dictionary(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

fn write_real(n: f64, out: &mut Vec<u8>) {
    if !n.is_finite() {
        out.extend_from_slice(b"0.0");
        return;
    }
    let text = n.to_string();
    out.extend_from_slice(text.as_bytes());
    if !text.contains('.') {
        out.extend_from_slice(b".0");
    }
}

fn write_literal_string(s: &[u8], out: &mut Vec<u8>) {
    out.push(b'(');
    for &b in s {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x20..=0x7e => out.push(b),
            _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
        }
    }
    out.push(b')');
}

fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    for &b in name.as_bytes() {
        if b > b' ' && b < 0x7f && b != b'#' && !crate::parser::lexer::is_delimiter(b) {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        }
    }
}

fn write_dict(d: &Dictionary, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (key, value) in d {
        write_name(key, out);
        out.push(b' ');
        value.write_to(out);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_ordering() {
        let mut keys = vec![
            ObjectKey::new(5, 1),
            ObjectKey::new(2, 0),
            ObjectKey::new(5, 0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ObjectKey::new(2, 0),
                ObjectKey::new(5, 0),
                ObjectKey::new(5, 1)
            ]
        );
    }

    #[test]
    fn test_dictionary_equality_ignores_order() {
        let mut a = Dictionary::new();
        a.insert("Type".into(), Value::name("Page"));
        a.insert("Count".into(), Value::Int(3));
        let mut b = Dictionary::new();
        b.insert("Count".into(), Value::Int(3));
        b.insert("Type".into(), Value::name("Page"));
        assert_eq!(Value::Dictionary(a), Value::Dictionary(b));
    }

    #[test]
    fn test_reference_equality_does_not_dereference() {
        assert_ne!(
            Value::Reference(ObjectKey::new(1, 0)),
            Value::Reference(ObjectKey::new(2, 0))
        );
    }

    #[test]
    fn test_type_error() {
        let err = Value::Int(3).as_name().unwrap_err();
        assert!(matches!(
            err,
            PdfError::TypeError {
                expected: "name",
                got: "int"
            }
        ));
        assert_eq!(Value::Int(3).as_num().unwrap(), 3.0);
    }

    #[test]
    fn test_serialize_forms() {
        assert_eq!(Value::Real(2.0).to_bytes(), b"2.0");
        assert_eq!(Value::Real(-0.5).to_bytes(), b"-0.5");
        assert_eq!(Value::String(b"a(b)\\".to_vec()).to_bytes(), b"(a\\(b\\)\\\\)");
        assert_eq!(Value::String(vec![0]).to_bytes(), b"(\\000)");
        assert_eq!(Value::name("A B").to_bytes(), b"/A#20B");
        assert_eq!(
            Value::Reference(ObjectKey::new(12, 0)).to_bytes(),
            b"12 0 R"
        );
    }

    #[test]
    fn test_stream_dict_via_as_dict() {
        let mut dict = Dictionary::new();
        dict.insert("Length".into(), Value::Int(3));
        let v = Value::Stream(Box::new(Stream::new(dict, &b"abc"[..])));
        assert_eq!(v.as_dict().unwrap().get("Length"), Some(&Value::Int(3)));
        assert_eq!(v.as_stream().unwrap().raw_data(), b"abc");
    }
}
