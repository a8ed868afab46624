//! Lexing and object parsing.
//!
//! - `lexer`: byte-level tokenizer shared by file structure and content streams
//! - `object_parser`: values and indirect-object framing

pub mod lexer;
pub mod object_parser;

pub use lexer::{Delimiter, Keyword, Lexer, Token};
pub use object_parser::{ObjectParser, parse_object_at, parse_object_at_with, parse_value_at};
