//! Drawing sink - output interface for content stream execution.
//!
//! The engine reports every mark it would make to a [`Device`]. All
//! coordinates handed to a device are already in device space.

use bytes::Bytes;
use smallvec::{SmallVec, smallvec};

use crate::model::object::{Dictionary, Name, ObjectKey, Value};
use crate::model::state::GraphicsState;
use crate::utils::{Matrix, Point, Rect, apply_matrix_pt};

/// Path segment for graphics operations, in device space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    /// Cubic bezier: two control points, then the end point.
    CurveTo(Point, Point, Point),
    ClosePath,
}

/// A sequence of subpaths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Closed rectangle through the four transformed corners.
    pub fn rect(ctm: Matrix, x: f64, y: f64, w: f64, h: f64) -> Self {
        let mut path = Self::new();
        path.push(PathSegment::MoveTo(apply_matrix_pt(ctm, (x, y))));
        path.push(PathSegment::LineTo(apply_matrix_pt(ctm, (x + w, y))));
        path.push(PathSegment::LineTo(apply_matrix_pt(ctm, (x + w, y + h))));
        path.push(PathSegment::LineTo(apply_matrix_pt(ctm, (x, y + h))));
        path.push(PathSegment::ClosePath);
        path
    }

    /// Every point the path touches, control points included.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.segments.iter().flat_map(|seg| -> SmallVec<[Point; 3]> {
            match seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => smallvec![*p],
                PathSegment::CurveTo(a, b, c) => smallvec![*a, *b, *c],
                PathSegment::ClosePath => SmallVec::new(),
            }
        })
    }

    /// Axis-aligned box over all points. `None` for an empty path.
    pub fn bounding_box(&self) -> Option<Rect> {
        self.points().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// How a path is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOp {
    Stroke,
    Fill(FillRule),
    FillStroke(FillRule),
}

/// One string shown by `Tj`, `TJ`, `'` or `"`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub font: Option<Name>,
    pub font_size: f64,
    /// Raw character codes; decoding them is the font layer's job.
    pub codes: Vec<u8>,
    /// Text rendering matrix at the start of the run.
    pub matrix: Matrix,
    pub render_mode: i64,
}

/// Image painted by `Do` or an inline `BI ... EI`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageXObject {
    /// Resource name for XObjects, `None` for inline images.
    pub name: Option<Name>,
    pub key: Option<ObjectKey>,
    /// Image dictionary, abbreviations expanded for inline images.
    pub dict: Dictionary,
    /// Undecoded sample data.
    pub data: Bytes,
    /// Where the unit square lands in device space.
    pub ctm: Matrix,
}

/// Form XObject about to be executed.
#[derive(Debug, Clone, PartialEq)]
pub struct FormInfo {
    pub name: Name,
    pub key: Option<ObjectKey>,
    /// `/BBox` in form space.
    pub bbox: Rect,
    /// `/Matrix` of the form.
    pub matrix: Matrix,
}

/// Sink for everything the engine draws.
///
/// Every method has a no-op default so devices only implement what they
/// care about.
pub trait Device {
    /// Paint a graphics path.
    fn paint_path(&mut self, _state: &GraphicsState, _path: &Path, _paint: PaintOp) {}

    /// Intersect the clip with a path. Called after painting when `W`/`W*`
    /// was pending.
    fn clip_path(&mut self, _state: &GraphicsState, _path: &Path, _rule: FillRule) {}

    /// Show a run of glyphs and return the summed horizontal glyph
    /// displacement in glyph space (thousandths of text space). Returning
    /// 0 advances the text matrix by spacing only.
    fn show_glyphs(&mut self, _state: &GraphicsState, _run: &GlyphRun) -> f64 {
        0.0
    }

    /// Render an inline or XObject image.
    fn draw_image(&mut self, _state: &GraphicsState, _image: &ImageXObject) {}

    /// Begin a Form XObject. `state` is the form's starting state.
    fn begin_form(&mut self, _state: &GraphicsState, _form: &FormInfo) {}

    /// End the form most recently begun.
    fn end_form(&mut self) {}

    /// Paint a shading resource with `sh`.
    fn shade(&mut self, _state: &GraphicsState, _name: &str) {}

    fn begin_marked_content(&mut self, _tag: &str, _props: Option<&Value>) {}

    fn end_marked_content(&mut self) {}

    fn mark_point(&mut self, _tag: &str, _props: Option<&Value>) {}
}

/// Glyph outline lookup, supplied by a font layer.
///
/// The engine never calls this; text rendering layers built on top of it
/// consume [`GlyphRun`]s and ask for outlines here.
pub trait GlyphOutlines {
    fn outline_for(&self, font: &str, code: u32) -> Option<Path>;
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    PaintPath {
        path: Path,
        paint: PaintOp,
        ctm: Matrix,
    },
    ClipPath {
        path: Path,
        rule: FillRule,
    },
    ShowGlyphs(GlyphRun),
    DrawImage(ImageXObject),
    BeginForm(FormInfo),
    EndForm,
    Shade(Name),
    BeginMarkedContent {
        tag: Name,
        props: Option<Value>,
    },
    EndMarkedContent,
    MarkPoint {
        tag: Name,
        props: Option<Value>,
    },
}

/// Device that keeps a display list of every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    pub calls: Vec<DeviceCall>,
    /// Displacement reported per glyph code, in glyph space.
    pub glyph_width: f64,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports every glyph as `width` thousandths of text space wide.
    pub fn with_glyph_width(width: f64) -> Self {
        Self {
            calls: Vec::new(),
            glyph_width: width,
        }
    }

    /// Painted paths in call order.
    pub fn paths(&self) -> impl Iterator<Item = (&Path, PaintOp)> {
        self.calls.iter().filter_map(|call| match call {
            DeviceCall::PaintPath { path, paint, .. } => Some((path, *paint)),
            _ => None,
        })
    }

    pub fn glyph_runs(&self) -> impl Iterator<Item = &GlyphRun> {
        self.calls.iter().filter_map(|call| match call {
            DeviceCall::ShowGlyphs(run) => Some(run),
            _ => None,
        })
    }
}

impl Device for RecordingDevice {
    fn paint_path(&mut self, state: &GraphicsState, path: &Path, paint: PaintOp) {
        self.calls.push(DeviceCall::PaintPath {
            path: path.clone(),
            paint,
            ctm: state.ctm,
        });
    }

    fn clip_path(&mut self, _state: &GraphicsState, path: &Path, rule: FillRule) {
        self.calls.push(DeviceCall::ClipPath {
            path: path.clone(),
            rule,
        });
    }

    fn show_glyphs(&mut self, _state: &GraphicsState, run: &GlyphRun) -> f64 {
        self.calls.push(DeviceCall::ShowGlyphs(run.clone()));
        self.glyph_width * run.codes.len() as f64
    }

    fn draw_image(&mut self, _state: &GraphicsState, image: &ImageXObject) {
        self.calls.push(DeviceCall::DrawImage(image.clone()));
    }

    fn begin_form(&mut self, _state: &GraphicsState, form: &FormInfo) {
        self.calls.push(DeviceCall::BeginForm(form.clone()));
    }

    fn end_form(&mut self) {
        self.calls.push(DeviceCall::EndForm);
    }

    fn shade(&mut self, _state: &GraphicsState, name: &str) {
        self.calls.push(DeviceCall::Shade(name.into()));
    }

    fn begin_marked_content(&mut self, tag: &str, props: Option<&Value>) {
        self.calls.push(DeviceCall::BeginMarkedContent {
            tag: tag.into(),
            props: props.cloned(),
        });
    }

    fn end_marked_content(&mut self) {
        self.calls.push(DeviceCall::EndMarkedContent);
    }

    fn mark_point(&mut self, tag: &str, props: Option<&Value>) {
        self.calls.push(DeviceCall::MarkPoint {
            tag: tag.into(),
            props: props.cloned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MATRIX_IDENTITY;

    #[test]
    fn test_rect_path_corners() {
        let path = Path::rect((1.0, 0.0, 0.0, 1.0, 10.0, 20.0), 0.0, 0.0, 100.0, 50.0);
        assert_eq!(path.segments.len(), 5);
        assert_eq!(path.segments[0], PathSegment::MoveTo((10.0, 20.0)));
        assert_eq!(path.segments[2], PathSegment::LineTo((110.0, 70.0)));
        assert_eq!(path.bounding_box(), Some((10.0, 20.0, 110.0, 70.0)));
    }

    #[test]
    fn test_bbox_includes_control_points() {
        let mut path = Path::new();
        path.push(PathSegment::MoveTo((0.0, 0.0)));
        path.push(PathSegment::CurveTo((5.0, 10.0), (6.0, -3.0), (8.0, 0.0)));
        assert_eq!(path.bounding_box(), Some((0.0, -3.0, 8.0, 10.0)));
        assert_eq!(Path::new().bounding_box(), None);
    }

    #[test]
    fn test_recording_device_advance() {
        let mut dev = RecordingDevice::with_glyph_width(500.0);
        let run = GlyphRun {
            font: Some("F1".into()),
            font_size: 12.0,
            codes: b"abc".to_vec(),
            matrix: MATRIX_IDENTITY,
            render_mode: 0,
        };
        let advance = dev.show_glyphs(&GraphicsState::default(), &run);
        assert_eq!(advance, 1500.0);
        assert_eq!(dev.glyph_runs().count(), 1);
    }
}
