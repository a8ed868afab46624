//! Recoverable-condition reporting.
//!
//! Real documents are frequently non-conformant, so most problems are
//! recovered locally. Every recovery is recorded here so callers can see
//! what was skipped or repaired.

use std::fmt;

/// Category of a recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The lexer produced an unknown token that was skipped.
    MalformedToken,
    /// `startxref` pointed at no known cross-reference section.
    XrefPrimaryMissing,
    /// A `Prev` pointer led nowhere or back into the chain.
    XrefChainBroken,
    /// A reference chain revisited an object.
    ReferenceCycle,
    /// A reference chain was longer than the configured bound.
    ReferenceDepthExceeded,
    /// A reference named an object absent from the table.
    MissingObject,
    /// A stream's `/Length` disagreed with its `endstream` position.
    StreamLengthMismatch,
    /// A stream could not be decoded.
    DecodeFailed,
    /// `Q` with nothing left to restore.
    StackUnderflow,
    /// `q` without a matching `Q` at the end of a content stream.
    UnbalancedSave,
    /// Too few operands for an operator.
    MissingOperands,
    /// Operand of the wrong type, or a resource that did not resolve.
    BadOperand,
    /// Operator name not present in the dispatch table.
    UnknownOperator,
    /// Text operator used outside `BT`/`ET`, or nested `BT`.
    TextObjectMisuse,
    /// Nested form invocation exceeded the depth bound.
    RecursionLimit,
    /// Execution stopped by the cancel token or operator budget.
    Cancelled,
}

/// One recorded recoverable condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Byte offset (in the file or content stream) when known.
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
        }
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(pos) => write!(f, "{:?} at {}: {}", self.kind, pos, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Ordered collection of diagnostics.
///
/// Pushing also logs through `tracing`: structural problems at `warn`,
/// content-stream leniency (which is routine) at `debug`.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        match diag.kind {
            DiagnosticKind::MissingOperands
            | DiagnosticKind::BadOperand
            | DiagnosticKind::UnknownOperator
            | DiagnosticKind::TextObjectMisuse
            | DiagnosticKind::MalformedToken => {
                tracing::debug!(kind = ?diag.kind, offset = ?diag.offset, "{}", diag.message);
            }
            _ => {
                tracing::warn!(kind = ?diag.kind, offset = ?diag.offset, "{}", diag.message);
            }
        }
        self.items.push(diag);
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, message));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticKind::StackUnderflow, "Q with empty stack");
        diags.push(Diagnostic::new(DiagnosticKind::UnknownOperator, "zz").at(12));
        diags.report(DiagnosticKind::StackUnderflow, "again");

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(DiagnosticKind::StackUnderflow), 2);
        assert_eq!(diags.iter().nth(1).and_then(|d| d.offset), Some(12));
    }

    #[test]
    fn display_includes_offset() {
        let diag = Diagnostic::new(DiagnosticKind::XrefChainBroken, "dangling Prev").at(500);
        assert_eq!(diag.to_string(), "XrefChainBroken at 500: dangling Prev");
    }
}
