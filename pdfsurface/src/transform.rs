//! Affine transforms, clip rectangles and page/device coordinate mapping

/// Transformation matrix for page transforms.
///
/// The matrix represents a 2D affine transformation:
/// ```text
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
/// ```
///
/// Transformed point: (x', y') = (a*x + c*y + e, b*x + d*y + f)
///
/// Degenerate (zero-determinant) matrices are valid input; they describe a
/// zero-size draw region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Scale/rotate coefficient
    pub a: f32,
    /// Rotate/shear coefficient
    pub b: f32,
    /// Rotate/shear coefficient
    pub c: f32,
    /// Scale/rotate coefficient
    pub d: f32,
    /// Horizontal translation
    pub e: f32,
    /// Vertical translation
    pub f: f32,
}

impl Matrix {
    /// Create a new transformation matrix.
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Create an identity matrix (no transformation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Create a translation matrix.
    pub fn translation(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Create a uniform scale matrix.
    pub fn scale(factor: f32) -> Self {
        Self::scale_xy(factor, factor)
    }

    /// Create a non-uniform scale matrix.
    pub fn scale_xy(x: f32, y: f32) -> Self {
        Self::new(x, 0.0, 0.0, y, 0.0, 0.0)
    }

    /// Build a matrix from six values in `a, b, c, d, e, f` order.
    pub fn from_values(values: [f32; 6]) -> Self {
        let [a, b, c, d, e, f] = values;
        Self::new(a, b, c, d, e, f)
    }

    /// The six coefficients in `a, b, c, d, e, f` order.
    pub fn values(&self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Matrix that applies `self` first and `next` second.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse matrix, or `None` when the matrix is degenerate.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Matrix {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    /// Transform a point.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Axis-aligned bounding box of a transformed rectangle, as
    /// `(min_x, min_y, max_x, max_y)`.
    pub fn transform_bounds(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> (f32, f32, f32, f32) {
        let corners = [
            self.transform_point(x0, y0),
            self.transform_point(x1, y0),
            self.transform_point(x0, y1),
            self.transform_point(x1, y1),
        ];
        corners.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Clipping rectangle in device space.
///
/// Values may arrive un-normalized and unclamped; use [`ClipRect::clamp_to`]
/// before touching pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    /// Left boundary
    pub left: f32,
    /// Top boundary
    pub top: f32,
    /// Right boundary
    pub right: f32,
    /// Bottom boundary
    pub bottom: f32,
}

impl ClipRect {
    /// Create a new clipping rectangle.
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a clip from four values in `left, top, right, bottom` order.
    pub fn from_values(values: [f32; 4]) -> Self {
        let [left, top, right, bottom] = values;
        Self::new(left, top, right, bottom)
    }

    /// Clip covering a whole `width` x `height` buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Swap edges so that `left <= right` and `top <= bottom`.
    pub fn normalized(&self) -> Self {
        Self {
            left: self.left.min(self.right),
            top: self.top.min(self.bottom),
            right: self.left.max(self.right),
            bottom: self.top.max(self.bottom),
        }
    }

    /// Width of the requested draw region (may exceed the buffer).
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height of the requested draw region (may exceed the buffer).
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Clamp against a `buffer_width` x `buffer_height` target.
    ///
    /// The result always satisfies `x >= 0`, `y >= 0`,
    /// `x + width <= buffer_width` and `y + height <= buffer_height`.
    pub fn clamp_to(&self, buffer_width: u32, buffer_height: u32) -> DrawRect {
        let clip = self.normalized();
        let max_x = i64::from(buffer_width);
        let max_y = i64::from(buffer_height);

        let left = (clip.left as i64).clamp(0, max_x);
        let top = (clip.top as i64).clamp(0, max_y);
        let right = (clip.right as i64).clamp(left, max_x);
        let bottom = (clip.bottom as i64).clamp(top, max_y);

        DrawRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        }
    }
}

/// A clamped draw rectangle, guaranteed to lie inside its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DrawRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rotation in 90-degree increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation (0 degrees)
    #[default]
    Upright = 0,
    /// 90 degrees clockwise
    Clockwise90 = 1,
    /// 180 degrees
    Rotated180 = 2,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Clockwise270 = 3,
}

impl Rotation {
    /// Create rotation from a quadrant value; values wrap modulo 4.
    pub fn from_quadrant(value: i32) -> Self {
        match value.rem_euclid(4) {
            1 => Self::Clockwise90,
            2 => Self::Rotated180,
            3 => Self::Clockwise270,
            _ => Self::Upright,
        }
    }

    /// Create rotation from degrees (0, 90, 180 or 270).
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Self::Upright),
            90 => Some(Self::Clockwise90),
            180 => Some(Self::Rotated180),
            270 => Some(Self::Clockwise270),
            _ => None,
        }
    }

    /// Get the quadrant value (0-3).
    pub fn as_quadrant(&self) -> i32 {
        *self as i32
    }

    /// Get the rotation in degrees (0, 90, 180, or 270).
    pub fn as_degrees(&self) -> u16 {
        match self {
            Self::Upright => 0,
            Self::Clockwise90 => 90,
            Self::Rotated180 => 180,
            Self::Clockwise270 => 270,
        }
    }
}

/// A device-space viewport that a page is fitted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub start_x: i32,
    pub start_y: i32,
    pub size_x: i32,
    pub size_y: i32,
    pub rotation: Rotation,
}

impl Viewport {
    pub fn new(start_x: i32, start_y: i32, size_x: i32, size_y: i32, rotation: Rotation) -> Self {
        Self {
            start_x,
            start_y,
            size_x,
            size_y,
            rotation,
        }
    }

    /// The viewport as a device-space clip.
    pub fn clip(&self) -> ClipRect {
        ClipRect::new(
            self.start_x as f32,
            self.start_y as f32,
            self.start_x as f32 + self.size_x as f32,
            self.start_y as f32 + self.size_y as f32,
        )
    }

    /// Matrix mapping page space (origin bottom-left, y up) into this
    /// viewport.
    ///
    /// A page with zero width or height yields the identity matrix.
    pub fn display_matrix(&self, page_width: f32, page_height: f32) -> Matrix {
        if page_width == 0.0 || page_height == 0.0 {
            return Matrix::identity();
        }

        let left = self.start_x as f32;
        let top = self.start_y as f32;
        let right = left + self.size_x as f32;
        let bottom = top + self.size_y as f32;

        // (x0, y0): image of the page origin; (x1, y1): image of the top-left
        // corner; (x2, y2): image of the bottom-right corner.
        let ((x0, y0), (x1, y1), (x2, y2)) = match self.rotation {
            Rotation::Upright => ((left, bottom), (left, top), (right, bottom)),
            Rotation::Clockwise90 => ((left, top), (right, top), (left, bottom)),
            Rotation::Rotated180 => ((right, top), (right, bottom), (left, top)),
            Rotation::Clockwise270 => ((right, bottom), (left, bottom), (right, top)),
        };

        Matrix::new(
            (x2 - x0) / page_width,
            (y2 - y0) / page_width,
            (x1 - x0) / page_height,
            (y1 - y0) / page_height,
            x0,
            y0,
        )
    }
}

/// How a page is placed onto a raster target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Fit the page into a device viewport.
    Viewport(Viewport),
    /// Apply an affine transform, limited to a device clip.
    Matrix { matrix: Matrix, clip: ClipRect },
}

impl Placement {
    /// Offset + draw size placement without rotation.
    pub fn offset(start_x: i32, start_y: i32, draw_width: i32, draw_height: i32) -> Self {
        Placement::Viewport(Viewport::new(
            start_x,
            start_y,
            draw_width,
            draw_height,
            Rotation::Upright,
        ))
    }

    /// The unclamped device clip of this placement.
    pub fn clip(&self) -> ClipRect {
        match self {
            Placement::Viewport(viewport) => viewport.clip(),
            Placement::Matrix { clip, .. } => *clip,
        }
    }

    /// Full page-space to device-space matrix.
    ///
    /// For the matrix form the caller's transform is applied on top of the
    /// page's upright display matrix at its natural size, so the page's
    /// top-left corner maps through `matrix` from `(0, 0)`.
    pub fn device_matrix(&self, page_width: f32, page_height: f32) -> Matrix {
        match self {
            Placement::Viewport(viewport) => viewport.display_matrix(page_width, page_height),
            Placement::Matrix { matrix, .. } => {
                Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, page_height).then(matrix)
            }
        }
    }
}

/// Map a page-space point to an integer device coordinate.
pub fn page_to_device(
    page_width: f32,
    page_height: f32,
    viewport: &Viewport,
    page_x: f64,
    page_y: f64,
) -> (i32, i32) {
    let matrix = viewport.display_matrix(page_width, page_height);
    let (x, y) = matrix.transform_point(page_x as f32, page_y as f32);
    (x.round() as i32, y.round() as i32)
}

/// Map a device coordinate back to page space.
///
/// Returns `None` when the mapping cannot be inverted (zero-size page or
/// viewport).
pub fn device_to_page(
    page_width: f32,
    page_height: f32,
    viewport: &Viewport,
    device_x: i32,
    device_y: i32,
) -> Option<(f64, f64)> {
    if page_width == 0.0 || page_height == 0.0 {
        return None;
    }
    let inverse = viewport.display_matrix(page_width, page_height).invert()?;
    let (x, y) = inverse.transform_point(device_x as f32, device_y as f32);
    Some((f64::from(x), f64::from(y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_clamping_overhanging_rect() {
        let (w, h) = (320, 240);
        let clip = ClipRect::new(-10.0, -10.0, w as f32 + 50.0, h as f32 + 50.0);
        assert_eq!(
            clip.clamp_to(w, h),
            DrawRect {
                x: 0,
                y: 0,
                width: w,
                height: h
            }
        );
    }

    #[test]
    fn test_clip_clamping_fully_outside() {
        let clip = ClipRect::new(500.0, 500.0, 600.0, 700.0);
        let rect = clip.clamp_to(100, 100);
        assert!(rect.is_empty());
        assert!(rect.x + rect.width <= 100);
        assert!(rect.y + rect.height <= 100);
    }

    #[test]
    fn test_clip_normalization() {
        let clip = ClipRect::new(80.0, 60.0, 10.0, 5.0);
        assert_eq!(
            clip.clamp_to(100, 100),
            DrawRect {
                x: 10,
                y: 5,
                width: 70,
                height: 55
            }
        );
    }

    #[test]
    fn test_display_matrix_upright_flips_y() {
        let viewport = Viewport::new(0, 0, 200, 100, Rotation::Upright);
        let m = viewport.display_matrix(100.0, 50.0);
        assert_eq!(m.transform_point(0.0, 0.0), (0.0, 100.0));
        assert_eq!(m.transform_point(0.0, 50.0), (0.0, 0.0));
        assert_eq!(m.transform_point(100.0, 0.0), (200.0, 100.0));
    }

    #[test]
    fn test_page_to_device_rotations() {
        let viewport = |rotation| Viewport::new(10, 20, 100, 100, rotation);
        // Page origin lands on a different viewport corner per quadrant.
        assert_eq!(page_to_device(50.0, 50.0, &viewport(Rotation::Upright), 0.0, 0.0), (10, 120));
        assert_eq!(page_to_device(50.0, 50.0, &viewport(Rotation::Clockwise90), 0.0, 0.0), (10, 20));
        assert_eq!(page_to_device(50.0, 50.0, &viewport(Rotation::Rotated180), 0.0, 0.0), (110, 20));
        assert_eq!(page_to_device(50.0, 50.0, &viewport(Rotation::Clockwise270), 0.0, 0.0), (110, 120));
    }

    #[test]
    fn test_device_to_page_round_trip() {
        let (pw, ph) = (612.0, 792.0);
        for quadrant in 0..4 {
            let viewport = Viewport::new(-30, 15, 1224, 1584, Rotation::from_quadrant(quadrant));
            for &(x, y) in &[(0.0, 0.0), (306.0, 396.0), (611.0, 1.0), (12.5, 700.25)] {
                let (dx, dy) = page_to_device(pw, ph, &viewport, x, y);
                let (px, py) = device_to_page(pw, ph, &viewport, dx, dy).unwrap();
                assert!((px - x).abs() < 0.5, "quadrant {quadrant}: x {x} -> {px}");
                assert!((py - y).abs() < 0.5, "quadrant {quadrant}: y {y} -> {py}");
            }
        }
    }

    #[test]
    fn test_device_to_page_degenerate() {
        let viewport = Viewport::new(0, 0, 0, 0, Rotation::Upright);
        assert_eq!(device_to_page(100.0, 100.0, &viewport, 5, 5), None);

        let viewport = Viewport::new(0, 0, 100, 100, Rotation::Upright);
        assert_eq!(device_to_page(0.0, 100.0, &viewport, 5, 5), None);
    }

    #[test]
    fn test_matrix_then_and_invert() {
        let m = Matrix::scale(2.0).then(&Matrix::translation(5.0, -3.0));
        assert_eq!(m.transform_point(1.0, 1.0), (7.0, -1.0));
        let inv = m.invert().unwrap();
        let (x, y) = inv.transform_point(7.0, -1.0);
        assert!((x - 1.0).abs() < 1e-6 && (y - 1.0).abs() < 1e-6);

        assert!(Matrix::scale(0.0).invert().is_none());
    }

    #[test]
    fn test_rotation_from_quadrant_wraps() {
        assert_eq!(Rotation::from_quadrant(5), Rotation::Clockwise90);
        assert_eq!(Rotation::from_quadrant(-1), Rotation::Clockwise270);
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(180).map(|r| r.as_quadrant()), Some(2));
    }
}
