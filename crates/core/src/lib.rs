//! folio - PDF object graph, revision merging and content stream
//! interpretation.
//!
//! The crate reads a document's cross-reference chain into an
//! [`ObjectGraph`], then runs page content streams through an [`Engine`]
//! that reports paths, glyph runs and images to a [`Device`].

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod interp;
pub mod model;
pub mod parser;
pub mod utils;

pub use config::ParseParams;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use document::{Document, ObjectGraph};
pub use error::{PdfError, Result};
pub use interp::{Device, Engine, OperatorTable, RecordingDevice, RunReport, run_content_stream};
pub use model::{GraphicsState, ObjectKey, Value};
