//! Error types for folio.
//!
//! Only conditions with no sensible fallback surface as `PdfError`.
//! Everything a real-world file routinely gets wrong is recorded as a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) instead.

use thiserror::Error;

use crate::model::object::ObjectKey;

/// Primary error type for document loading and object access.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(ObjectKey),

    #[error("no valid xref section found")]
    NoValidXRef,

    #[error("cross-reference table was already resolved")]
    XrefAlreadyResolved,

    #[error("PDF syntax error at offset {offset}: {msg}")]
    SyntaxError { offset: usize, msg: String },

    #[error("decode error in filter {filter}: {msg}")]
    Decode { filter: String, msg: String },

    #[error("scratch store exhausted after {retained} bytes")]
    ScratchExhausted { retained: usize },

    #[error("scratch access at {pos} outside retained range {start}..{end}")]
    ScratchOutOfRange { pos: usize, start: usize, end: usize },
}

impl PdfError {
    pub(crate) fn syntax(offset: usize, msg: impl Into<String>) -> Self {
        Self::SyntaxError {
            offset,
            msg: msg.into(),
        }
    }

    pub(crate) fn decode(filter: &str, msg: impl Into<String>) -> Self {
        Self::Decode {
            filter: filter.to_string(),
            msg: msg.into(),
        }
    }

    /// True for errors that must abort the current document load.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ScratchExhausted { .. } | Self::NoValidXRef
        )
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
