//! Path construction and painting operators.
//!
//! Handles: m, l, c, v, y, h, re, S, s, f, F, f*, B, B*, b, b*, n, W, W*
//!
//! Path construction:
//! - m: Move to
//! - l: Line to
//! - c, v, y: Bezier curves (cubic variants)
//! - h: Close subpath
//! - re: Rectangle shorthand
//!
//! Path painting:
//! - S/s: Stroke (s closes first)
//! - f/F/f*: Fill (F is legacy, f* uses even-odd rule)
//! - B/B*/b/b*: Fill then stroke
//! - n: End path (no-op, often with clipping)
//!
//! Clipping:
//! - W/W*: Set clipping path (non-zero/even-odd), applied when the path
//!   is next painted or ended
//!
//! Points are transformed to device space as they are added.

use super::{bad_operand, numbers};
use crate::interp::device::{FillRule, PaintOp, Path, PathSegment};
use crate::interp::engine::{Engine, OpResult};
use crate::model::object::Value;
use crate::utils::{Point, apply_matrix_pt};

#[allow(non_snake_case)]
impl Engine<'_> {
    fn to_device(&self, x: f64, y: f64) -> Point {
        apply_matrix_pt(self.state.ctm, (x, y))
    }

    /// Current point, or an error naming the operator that needed it.
    fn require_current_point(&self, op: &str) -> Result<Point, crate::diagnostics::Diagnostic> {
        self.current_point
            .ok_or_else(|| bad_operand(op, "no current point"))
    }

    // ========================================================================
    // Path Construction Operators
    // ========================================================================

    /// Begins a new subpath at the given point.
    ///
    /// PDF operator: `m`
    pub fn do_m(&mut self, operands: &[Value]) -> OpResult {
        let [x, y] = numbers::<2>("m", operands)?;
        let p = self.to_device(x, y);
        self.path.push(PathSegment::MoveTo(p));
        self.current_point = Some(p);
        self.subpath_start = Some(p);
        Ok(())
    }

    /// Appends a straight line segment from the current point. Without a
    /// current point the segment starts a new subpath instead.
    ///
    /// PDF operator: `l`
    pub fn do_l(&mut self, operands: &[Value]) -> OpResult {
        let [x, y] = numbers::<2>("l", operands)?;
        let p = self.to_device(x, y);
        let started = self.require_current_point("l");
        if started.is_err() {
            self.path.push(PathSegment::MoveTo(p));
            self.subpath_start = Some(p);
        } else {
            self.path.push(PathSegment::LineTo(p));
        }
        self.current_point = Some(p);
        started.map(|_| ())
    }

    /// Appends a cubic Bezier curve to the path.
    ///
    /// PDF operator: `c`
    pub fn do_c(&mut self, operands: &[Value]) -> OpResult {
        let [x1, y1, x2, y2, x3, y3] = numbers::<6>("c", operands)?;
        self.require_current_point("c")?;
        let (c1, c2) = (self.to_device(x1, y1), self.to_device(x2, y2));
        let end = self.to_device(x3, y3);
        self.path.push(PathSegment::CurveTo(c1, c2, end));
        self.current_point = Some(end);
        Ok(())
    }

    /// Appends a cubic Bezier curve with the current point as first control point.
    ///
    /// PDF operator: `v`
    pub fn do_v(&mut self, operands: &[Value]) -> OpResult {
        let [x2, y2, x3, y3] = numbers::<4>("v", operands)?;
        let first = self.require_current_point("v")?;
        let second = self.to_device(x2, y2);
        let end = self.to_device(x3, y3);
        self.path.push(PathSegment::CurveTo(first, second, end));
        self.current_point = Some(end);
        Ok(())
    }

    /// Appends a cubic Bezier curve with the endpoint as second control point.
    ///
    /// PDF operator: `y`
    pub fn do_y(&mut self, operands: &[Value]) -> OpResult {
        let [x1, y1, x3, y3] = numbers::<4>("y", operands)?;
        self.require_current_point("y")?;
        let first = self.to_device(x1, y1);
        let end = self.to_device(x3, y3);
        self.path.push(PathSegment::CurveTo(first, end, end));
        self.current_point = Some(end);
        Ok(())
    }

    /// Closes the current subpath.
    ///
    /// PDF operator: `h`
    pub fn do_h(&mut self, _operands: &[Value]) -> OpResult {
        if self.path.is_empty() {
            return Ok(());
        }
        self.path.push(PathSegment::ClosePath);
        self.current_point = self.subpath_start;
        Ok(())
    }

    /// Appends a rectangle as a complete subpath.
    ///
    /// Equivalent to: m x y; l x+w y; l x+w y+h; l x y+h; h
    ///
    /// PDF operator: `re`
    pub fn do_re(&mut self, operands: &[Value]) -> OpResult {
        let [x, y, w, h] = numbers::<4>("re", operands)?;
        let rect = Path::rect(self.state.ctm, x, y, w, h);
        let start = self.to_device(x, y);
        self.path.segments.extend(rect.segments);
        self.current_point = Some(start);
        self.subpath_start = Some(start);
        Ok(())
    }

    // ========================================================================
    // Path Painting Operators
    // ========================================================================

    /// Strokes the current path.
    ///
    /// PDF operator: `S`
    pub fn do_S(&mut self, _operands: &[Value]) -> OpResult {
        self.end_path(Some(PaintOp::Stroke));
        Ok(())
    }

    /// Closes and strokes the current path.
    ///
    /// PDF operator: `s`
    pub fn do_s(&mut self, _operands: &[Value]) -> OpResult {
        self.invoke("h", &[])?;
        self.invoke("S", &[])
    }

    /// Fills the current path using the nonzero winding rule.
    ///
    /// PDF operator: `f`
    pub fn do_f(&mut self, _operands: &[Value]) -> OpResult {
        self.end_path(Some(PaintOp::Fill(FillRule::NonZero)));
        Ok(())
    }

    /// Same as `f`, kept for old producers.
    ///
    /// PDF operator: `F`
    pub fn do_F(&mut self, operands: &[Value]) -> OpResult {
        self.invoke("f", operands)
    }

    /// Fills the current path using the even-odd rule.
    ///
    /// PDF operator: `f*`
    pub fn do_f_star(&mut self, _operands: &[Value]) -> OpResult {
        self.end_path(Some(PaintOp::Fill(FillRule::EvenOdd)));
        Ok(())
    }

    /// Fills and then strokes the path (nonzero winding rule).
    ///
    /// PDF operator: `B`
    pub fn do_B(&mut self, _operands: &[Value]) -> OpResult {
        self.end_path(Some(PaintOp::FillStroke(FillRule::NonZero)));
        Ok(())
    }

    /// Fills and then strokes the path (even-odd rule).
    ///
    /// PDF operator: `B*`
    pub fn do_B_star(&mut self, _operands: &[Value]) -> OpResult {
        self.end_path(Some(PaintOp::FillStroke(FillRule::EvenOdd)));
        Ok(())
    }

    /// Closes, fills and strokes the path (nonzero winding rule).
    ///
    /// PDF operator: `b`
    pub fn do_b(&mut self, _operands: &[Value]) -> OpResult {
        self.invoke("h", &[])?;
        self.invoke("B", &[])
    }

    /// Closes, fills and strokes the path (even-odd rule).
    ///
    /// PDF operator: `b*`
    pub fn do_b_star(&mut self, _operands: &[Value]) -> OpResult {
        self.invoke("h", &[])?;
        self.invoke("B*", &[])
    }

    /// Ends the path without painting it.
    ///
    /// PDF operator: `n`
    pub fn do_n(&mut self, _operands: &[Value]) -> OpResult {
        self.end_path(None);
        Ok(())
    }

    // ========================================================================
    // Clipping Path Operators
    // ========================================================================

    /// PDF operator: `W`
    pub fn do_W(&mut self, _operands: &[Value]) -> OpResult {
        self.pending_clip = Some(FillRule::NonZero);
        Ok(())
    }

    /// PDF operator: `W*`
    pub fn do_W_star(&mut self, _operands: &[Value]) -> OpResult {
        self.pending_clip = Some(FillRule::EvenOdd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::interp::device::{FillRule, PaintOp, PathSegment, RecordingDevice};
    use crate::interp::engine::Engine;
    use crate::model::state::GraphicsState;

    fn run(content: &[u8]) -> RecordingDevice {
        let mut dev = RecordingDevice::new();
        Engine::new(&mut dev, GraphicsState::default()).run(content);
        dev
    }

    #[test]
    fn test_close_stroke_matches_expansion() {
        let compound = run(b"0 0 m 10 0 l 10 10 l s");
        let expanded = run(b"0 0 m 10 0 l 10 10 l h S");
        assert_eq!(compound.calls, expanded.calls);
        let (path, paint) = compound.paths().next().unwrap();
        assert_eq!(paint, PaintOp::Stroke);
        assert_eq!(path.segments.last(), Some(&PathSegment::ClosePath));
    }

    #[test]
    fn test_curve_variants() {
        let dev = run(b"0 0 m 1 1 2 2 v 3 3 4 4 y f*");
        let (path, paint) = dev.paths().next().unwrap();
        assert_eq!(paint, PaintOp::Fill(FillRule::EvenOdd));
        assert_eq!(
            path.segments[1],
            PathSegment::CurveTo((0.0, 0.0), (1.0, 1.0), (2.0, 2.0))
        );
        assert_eq!(
            path.segments[2],
            PathSegment::CurveTo((3.0, 3.0), (4.0, 4.0), (4.0, 4.0))
        );
    }

    #[test]
    fn test_curve_without_current_point() {
        let mut dev = RecordingDevice::new();
        let mut engine = Engine::new(&mut dev, GraphicsState::default());
        engine.run(b"1 1 2 2 v 5 5 l S");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 2);
        drop(engine);
        let (path, _) = dev.paths().next().unwrap();
        assert_eq!(path.segments, vec![PathSegment::MoveTo((5.0, 5.0))]);
    }

    #[test]
    fn test_points_use_ctm_at_construction() {
        let dev = run(b"2 0 0 2 0 0 cm 1 1 m 3 1 l S");
        let (path, _) = dev.paths().next().unwrap();
        assert_eq!(path.segments[1], PathSegment::LineTo((6.0, 2.0)));
    }
}
