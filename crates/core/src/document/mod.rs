//! Document structure: byte access, cross-reference resolution and the
//! object graph.
//!
//! This module contains:
//! - `source` - random access to document bytes (memory map or seekable reader)
//! - `scratch` - bounded retention of streamed bytes
//! - `xref` - cross-reference sections and revision merging
//! - `graph` - object lookup and reference resolution
//! - `loader` - locating and reading the xref chain of a file (Document)

pub mod graph;
pub mod loader;
pub mod scratch;
pub mod source;
pub mod xref;

// Re-export main types for convenience
pub use graph::ObjectGraph;
pub use loader::Document;
pub use scratch::ScratchStore;
pub use source::{ByteSource, SeekSource};
pub use xref::{Location, ResolvedTable, RevisionFragment, XrefEntry, XrefResolver};
