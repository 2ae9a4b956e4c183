//! Построение многоугольника ячейки Вороного отсечением прямоугольника
//!
//! Ячейка Вороного точки `p` — пересечение полуплоскостей «ближе к `p`, чем к `q`»
//! по всем её соседям Делоне `q`. Начинаем с прямоугольника области и отсекаем
//! его серединными перпендикулярами. Каждое ребро помечается источником:
//! соседом, через которого оно проходит, или `None` для края области.

use crate::geometry::{Bounds, Point};

/// Вершина многоугольника и метка ребра, выходящего из неё к следующей вершине.
pub(crate) type TaggedVertex = (Point, Option<usize>);

pub(crate) fn bounds_polygon(bounds: &Bounds) -> Vec<TaggedVertex> {
    bounds.corners().into_iter().map(|p| (p, None)).collect()
}

/// Отсекает выпуклый многоугольник полуплоскостью точек, не более близких к `other`, чем к `site`.
pub(crate) fn clip_by_bisector(
    polygon: &[TaggedVertex],
    site: Point,
    other: Point,
    other_index: usize,
    tolerance: f64,
) -> Vec<TaggedVertex> {
    let mid = site.lerp(&other, 0.5);
    let nx = other.x - site.x;
    let ny = other.y - site.y;
    let side = |p: &Point| (p.x - mid.x) * nx + (p.y - mid.y) * ny;

    let mut out: Vec<TaggedVertex> = Vec::with_capacity(polygon.len() + 1);
    for (i, &(a, tag)) in polygon.iter().enumerate() {
        let (b, _) = polygon[(i + 1) % polygon.len()];
        let da = side(&a);
        let db = side(&b);
        let a_inside = da <= 0.0;
        let b_inside = db <= 0.0;

        match (a_inside, b_inside) {
            (true, true) => push_vertex(&mut out, a, tag, tolerance),
            (true, false) => {
                push_vertex(&mut out, a, tag, tolerance);
                let t = da / (da - db);
                push_vertex(&mut out, a.lerp(&b, t), Some(other_index), tolerance);
            }
            (false, true) => {
                let t = da / (da - db);
                push_vertex(&mut out, a.lerp(&b, t), tag, tolerance);
            }
            (false, false) => {}
        }
    }

    // Замыкание: последняя вершина совпала с первой
    if out.len() > 1 {
        let first = out[0].0;
        if let Some(&(last, _)) = out.last() {
            if last.distance_sq(&first) <= tolerance * tolerance {
                out.pop();
            }
        }
    }
    out
}

/// Совпадающая вершина не добавляется: ребро нулевой длины исчезает, а метку
/// получает следующее за ним ребро.
fn push_vertex(out: &mut Vec<TaggedVertex>, p: Point, tag: Option<usize>, tolerance: f64) {
    if let Some(last) = out.last_mut() {
        if last.0.distance_sq(&p) <= tolerance * tolerance {
            last.1 = tag;
            return;
        }
    }
    out.push((p, tag));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon_area;

    #[test]
    fn bisector_halves_the_square() {
        let bounds = Bounds::new(2.0, 2.0);
        let square = bounds_polygon(&bounds);
        let clipped = clip_by_bisector(
            &square,
            Point::new(0.5, 1.0),
            Point::new(1.5, 1.0),
            7,
            1e-9,
        );

        let points: Vec<Point> = clipped.iter().map(|&(p, _)| p).collect();
        assert!((polygon_area(&points) - 2.0).abs() < 1e-12);
        assert_eq!(clipped.iter().filter(|(_, tag)| *tag == Some(7)).count(), 1);
        assert!(points.iter().all(|p| p.x <= 1.0 + 1e-12));
    }

    #[test]
    fn far_bisector_keeps_polygon() {
        let bounds = Bounds::new(1.0, 1.0);
        let square = bounds_polygon(&bounds);
        let clipped = clip_by_bisector(
            &square,
            Point::new(0.5, 0.5),
            Point::new(5.0, 0.5),
            3,
            1e-9,
        );
        assert_eq!(clipped, square);
    }
}
