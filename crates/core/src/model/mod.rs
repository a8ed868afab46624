//! PDF model types - objects, state, and color definitions.
//!
//! - `object` - values, dictionaries, streams and object keys
//! - `state` - graphics and text state
//! - `color` - color spaces and color values

pub mod color;
pub mod object;
pub mod state;

// Re-export main types for convenience
pub use color::{Color, ColorSpace};
pub use object::{Dictionary, Name, ObjectKey, Stream, Value};
pub use state::{GraphicsState, TextObject, TextState};
