//! Базовая геометрия на плоскости: точки, прямоугольная область, многоугольники.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    #[must_use]
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Прямоугольная область `[0, width] × [0, height]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    #[must_use]
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }

    #[must_use]
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.width * 0.5, self.height * 0.5)
    }

    /// Углы против часовой стрелки (в системе с осью Y вверх)
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(self.width, 0.0),
            Point::new(self.width, self.height),
            Point::new(0.0, self.height),
        ]
    }

    /// Координаты, нормализованные к большей стороне: пропорции не искажаются.
    #[must_use]
    pub fn normalize(&self, p: &Point) -> (f64, f64) {
        let scale = self.width.max(self.height);
        (p.x / scale, p.y / scale)
    }
}

/// Ориентированная площадь (положительна для обхода против часовой стрелки)
#[must_use]
pub fn polygon_signed_area(vertices: &[Point]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, a) in vertices.iter().enumerate() {
        let b = &vertices[(i + 1) % vertices.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

#[must_use]
pub fn polygon_area(vertices: &[Point]) -> f64 {
    polygon_signed_area(vertices).abs()
}

/// Центр масс многоугольника; для вырожденного — среднее вершин.
#[must_use]
pub fn polygon_centroid(vertices: &[Point]) -> Point {
    if vertices.is_empty() {
        return Point::default();
    }
    let area = polygon_signed_area(vertices);
    if area.abs() < f64::EPSILON {
        let n = vertices.len() as f64;
        let sx: f64 = vertices.iter().map(|p| p.x).sum();
        let sy: f64 = vertices.iter().map(|p| p.y).sum();
        return Point::new(sx / n, sy / n);
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, a) in vertices.iter().enumerate() {
        let b = &vertices[(i + 1) % vertices.len()];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    let factor = 1.0 / (6.0 * area);
    Point::new(cx * factor, cy * factor)
}

/// Гладкая ступенька Эрмита между `edge0` и `edge1`
#[must_use]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_area_and_centroid() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        assert!((polygon_signed_area(&square) - 4.0).abs() < 1e-12);

        let c = polygon_centroid(&square);
        assert!((c.x - 1.0).abs() < 1e-12 && (c.y - 1.0).abs() < 1e-12);

        let mut reversed = square;
        reversed.reverse();
        assert!((polygon_signed_area(&reversed) + 4.0).abs() < 1e-12);
        assert!((polygon_area(&reversed) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn smoothstep_is_clamped() {
        assert_eq!(smoothstep(0.2, 0.8, 0.0), 0.0);
        assert_eq!(smoothstep(0.2, 0.8, 1.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-12);
    }
}
