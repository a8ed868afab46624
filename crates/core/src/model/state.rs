//! Graphics and text state.
//!
//! [`GraphicsState`] is what `q`/`Q` push and pop as a unit. The text
//! matrices live apart in [`TextObject`], which only exists between `BT`
//! and `ET`.

use crate::interp::device::{FillRule, Path};
use crate::model::color::{Color, ColorSpace};
use crate::model::object::Name;
use crate::utils::{MATRIX_IDENTITY, Matrix};

/// Text parameters set by `Tc Tw Tz TL Tf Tr Ts`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Horizontal scale in percent (`Tz`), 100 by default.
    pub horizontal_scale: f64,
    pub leading: f64,
    /// Font resource name selected by `Tf`.
    pub font: Option<Name>,
    pub font_size: f64,
    pub rise: f64,
    pub render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 100.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

impl TextState {
    /// `Tz` as a factor.
    pub fn scale_factor(&self) -> f64 {
        self.horizontal_scale / 100.0
    }
}

/// Text matrix and text line matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextObject {
    pub matrix: Matrix,
    pub line_matrix: Matrix,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            matrix: MATRIX_IDENTITY,
            line_matrix: MATRIX_IDENTITY,
        }
    }
}

/// One entry of the clipping region, in device space.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPath {
    pub path: Path,
    pub rule: FillRule,
}

/// Line dash pattern set by `d`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashPattern {
    pub array: Vec<f64>,
    pub phase: f64,
}

/// The device-independent graphics state.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub stroke_color: Color,
    pub stroke_space: ColorSpace,
    pub fill_color: Color,
    pub fill_space: ColorSpace,
    pub line_width: f64,
    pub line_cap: i64,
    pub line_join: i64,
    pub miter_limit: f64,
    pub dash: DashPattern,
    pub rendering_intent: Name,
    pub flatness: f64,
    /// Intersection of these paths is the clipping region. Empty means
    /// unclipped.
    pub clip: Vec<ClipPath>,
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    pub text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::with_ctm(MATRIX_IDENTITY)
    }
}

impl GraphicsState {
    /// Initial state for a page whose user space maps to device space by `ctm`.
    pub fn with_ctm(ctm: Matrix) -> Self {
        Self {
            ctm,
            stroke_color: Color::Gray(0.0),
            stroke_space: ColorSpace::DeviceGray,
            fill_color: Color::Gray(0.0),
            fill_space: ColorSpace::DeviceGray,
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash: DashPattern::default(),
            rendering_intent: Name::new_static("RelativeColorimetric"),
            flatness: 1.0,
            clip: Vec::new(),
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            text: TextState::default(),
        }
    }

    /// Selects a stroking space and resets the stroking color.
    pub fn set_stroke_space(&mut self, space: ColorSpace) {
        self.stroke_color = space.initial_color();
        self.stroke_space = space;
    }

    /// Selects a non-stroking space and resets the fill color.
    pub fn set_fill_space(&mut self, space: ColorSpace) {
        self.fill_color = space.initial_color();
        self.fill_space = space;
    }
}
