// src/pdf/geometry.rs
use serde::Serialize;

/// Axis-aligned rectangle in page space: origin at the top-left, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest rectangle containing all points.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut rect = Rect::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            rect.x0 = rect.x0.min(x);
            rect.y0 = rect.y0.min(y);
            rect.x1 = rect.x1.max(x);
            rect.y1 = rect.y1.max(y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Same vertical extent, stretched from 0 to `page_width`.
    pub fn full_width(&self, page_width: f32) -> Rect {
        Rect::new(0.0, self.y0, page_width, self.y1)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }
}

/// PDF transformation matrix `[a b c d e f]`, row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self` applied first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix::new(
            self.a * other.a + self.b * other.c,
            self.a * other.b + self.b * other.d,
            self.c * other.a + self.d * other.c,
            self.c * other.b + self.d * other.d,
            self.e * other.a + self.f * other.c + other.e,
            self.e * other.b + self.f * other.d + other.f,
        )
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Image of the rectangle `(x0,y0)-(x1,y1)` as a bounding box of its corners.
    pub fn apply_box(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        let corners = [
            self.apply(x0, y0),
            self.apply(x1, y0),
            self.apply(x0, y1),
            self.apply(x1, y1),
        ];
        // four corners are always present
        Rect::from_points(&corners).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_width_keeps_vertical_extent() {
        let hit = Rect::new(50.0, 100.0, 150.0, 110.0);
        assert_eq!(hit.full_width(600.0), Rect::new(0.0, 100.0, 600.0, 110.0));
    }

    #[test]
    fn test_matrix_composition_order() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 5.0);
        // scale first, then shift
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        // shift first, then scale
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn test_apply_box_with_flip() {
        let flip = Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 800.0);
        let rect = flip.apply_box(10.0, 700.0, 20.0, 710.0);
        assert_eq!(rect, Rect::new(10.0, 90.0, 20.0, 100.0));
    }

    #[test]
    fn test_contains_and_union() {
        let band = Rect::new(0.0, 100.0, 600.0, 110.0);
        assert!(band.contains(&Rect::new(10.0, 101.0, 20.0, 109.0)));
        assert!(!band.contains(&Rect::new(10.0, 95.0, 20.0, 109.0)));
        let merged = Rect::new(0.0, 0.0, 1.0, 1.0).union(&Rect::new(2.0, -1.0, 3.0, 0.5));
        assert_eq!(merged, Rect::new(0.0, -1.0, 3.0, 1.0));
    }
}
