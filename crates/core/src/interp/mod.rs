//! Content stream interpretation and device output.
//!
//! This module contains:
//! - `content`: content stream tokenizer, inline images included
//! - `engine`: the interpreter and its graphics state machine
//! - `device`: output device trait and a recording implementation
//! - `ops`: operator implementations by category

pub mod content;
pub mod device;
pub mod engine;
pub mod ops;

// Re-export main types for convenience
pub use content::{ContentParser, InlineImage, Operation, parse_content_stream};
pub use device::{
    Device, DeviceCall, FillRule, FormInfo, GlyphOutlines, GlyphRun, ImageXObject, PaintOp, Path,
    PathSegment, RecordingDevice,
};
pub use engine::{
    CancelToken, Engine, OpHandler, OpResult, RunReport, TextMode, run_content_stream,
};
pub use ops::OperatorTable;
