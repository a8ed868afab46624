//! Geometry helpers shared by the engine and the sink interface.
//!
//! Matrices are 2×3 affine transforms `(a, b, c, d, e, f)` mapping
//! `(x, y)` to `(ax + cy + e, bx + dy + f)`.

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle `(x0, y0, x1, y1)`.
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix (a, b, c, d, e, f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Identity transformation matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Compares two matrices component-wise.
pub fn matrix_approx_eq(m1: Matrix, m0: Matrix, epsilon: f64) -> bool {
    approx_eq(m1.0, m0.0, epsilon)
        && approx_eq(m1.1, m0.1, epsilon)
        && approx_eq(m1.2, m0.2, epsilon)
        && approx_eq(m1.3, m0.3, epsilon)
        && approx_eq(m1.4, m0.4, epsilon)
        && approx_eq(m1.5, m0.5, epsilon)
}

/// Multiplies two matrices: result = m1 * m0.
///
/// Applies m1 first, then m0, so `mult_matrix(new, ctm)` maps the new
/// child space into the parent space described by `ctm`.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Translates a matrix by (x, y) inside its own coordinate system.
///
/// Equivalent to `mult_matrix((1, 0, 0, 1, x, y), m)`.
pub fn translate_matrix(m: Matrix, v: Point) -> Matrix {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a, b, c, d, x * a + y * c + e, x * b + y * d + f)
}

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Applies a matrix to a rectangle, returning the axis-aligned box that
/// tightly fits the transformed corners.
pub fn apply_matrix_rect(m: Matrix, rect: Rect) -> Rect {
    let (x0, y0, x1, y1) = rect;
    let (left1, bottom1) = apply_matrix_pt(m, (x0, y0));
    let (right1, bottom2) = apply_matrix_pt(m, (x1, y0));
    let (right2, top1) = apply_matrix_pt(m, (x1, y1));
    let (left2, top2) = apply_matrix_pt(m, (x0, y1));

    (
        left1.min(left2).min(right1).min(right2),
        bottom1.min(bottom2).min(top1).min(top2),
        left1.max(left2).max(right1).max(right2),
        bottom1.max(bottom2).max(top1).max(top2),
    )
}

/// Reads six numbers as a matrix.
pub fn matrix_from_slice(values: &[f64]) -> Option<Matrix> {
    match values {
        [a, b, c, d, e, f] => Some((*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}
