//! Плоское разбиение области на ячейки (диаграмма Вороного / триангуляция Делоне)
//!
//! Все последующие этапы работают только через индексы ячеек и смежность:
//! - **Триангуляция** строится `delaunator`; соседи ячейки — её соседи по Делоне,
//!   поэтому смежность симметрична по построению.
//! - **Многоугольник** ячейки получается отсечением прямоугольника области
//!   серединными перпендикулярами к соседям (см. [`clip`]).
//! - **Поиск ячейки по точке** — жадный спуск по графу Делоне от подсказки из
//!   грубой сетки: на графе Делоне жадный спуск всегда приходит к ближайшему центру.
//!
//! Разбиение только перестраивается целиком; инкрементальных изменений нет.

pub(crate) mod clip;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::{Bounds, Point, polygon_area};

/// Доступ к графу ячеек без знания о геометрии многоугольников.
pub trait AdjacencyProvider {
    fn cell_count(&self) -> usize;
    fn neighbors(&self, cell: usize) -> &[usize];
    fn center(&self, cell: usize) -> Point;
    /// Ячейка касается края области
    fn is_boundary(&self, cell: usize) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    bounds: Bounds,
    centers: Vec<Point>,
    neighbors: Vec<Vec<usize>>,
    polygons: Vec<Vec<Point>>,
    /// Для ребра `k` многоугольника (вершина `k` → `k+1`): сосед по ту сторону или край области
    edge_owners: Vec<Vec<Option<usize>>>,
    areas: Vec<f64>,
    boundary: Vec<bool>,
    grid: LocateGrid,
}

/// Грубая сетка подсказок для `locate`: в каждой клетке — индекс ближайшей известной ячейки.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocateGrid {
    cols: usize,
    rows: usize,
    cell_w: f64,
    cell_h: f64,
    hints: Vec<usize>,
}

impl LocateGrid {
    fn build(bounds: &Bounds, centers: &[Point]) -> Self {
        let n = centers.len().max(1) as f64;
        let aspect = bounds.width / bounds.height;
        let cols = ((n * aspect).sqrt().ceil() as usize).max(1);
        let rows = ((n / cols as f64).ceil() as usize).max(1);
        let cell_w = bounds.width / cols as f64;
        let cell_h = bounds.height / rows as f64;

        let mut hints = vec![usize::MAX; cols * rows];
        let mut queue = VecDeque::new();
        for (i, p) in centers.iter().enumerate() {
            let slot = Self::slot_of(cols, rows, cell_w, cell_h, p);
            if hints[slot] == usize::MAX {
                hints[slot] = i;
                queue.push_back(slot);
            }
        }

        // Пустые клетки наследуют подсказку ближайшей заполненной (BFS по сетке)
        while let Some(slot) = queue.pop_front() {
            let (cx, cy) = (slot % cols, slot / cols);
            let around = [
                (cx.wrapping_sub(1), cy),
                (cx + 1, cy),
                (cx, cy.wrapping_sub(1)),
                (cx, cy + 1),
            ];
            for (nx, ny) in around {
                if nx < cols && ny < rows {
                    let next = ny * cols + nx;
                    if hints[next] == usize::MAX {
                        hints[next] = hints[slot];
                        queue.push_back(next);
                    }
                }
            }
        }

        Self {
            cols,
            rows,
            cell_w,
            cell_h,
            hints,
        }
    }

    fn slot_of(cols: usize, rows: usize, cell_w: f64, cell_h: f64, p: &Point) -> usize {
        let cx = ((p.x / cell_w) as usize).min(cols - 1);
        let cy = ((p.y / cell_h) as usize).min(rows - 1);
        cy * cols + cx
    }

    fn hint(&self, p: &Point) -> usize {
        let slot = Self::slot_of(self.cols, self.rows, self.cell_w, self.cell_h, p);
        self.hints[slot]
    }
}

impl Partition {
    /// Строит разбиение по центрам ячеек.
    ///
    /// # Ошибки
    /// - меньше трёх различных точек или все точки на одной прямой;
    /// - точка вне области или совпадает с другой;
    /// - вырожденный многоугольник ячейки.
    pub fn build(points: &[Point], bounds: Bounds) -> Result<Self, GeometryError> {
        for (index, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite()) || !bounds.contains(p) {
                return Err(GeometryError::PointOutOfBounds { index });
            }
        }

        let distinct = count_distinct(points);
        if distinct < 3 {
            return Err(GeometryError::TooFewPoints { distinct });
        }

        let delaunator_points: Vec<delaunator::Point> = points
            .iter()
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let triangulation = delaunator::triangulate(&delaunator_points);
        if triangulation.triangles.is_empty() {
            return Err(GeometryError::Collinear);
        }

        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); points.len()];
        for tri in triangulation.triangles.chunks_exact(3) {
            for k in 0..3 {
                let a = tri[k];
                let b = tri[(k + 1) % 3];
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }
        for (index, list) in neighbors.iter_mut().enumerate() {
            list.sort_unstable();
            list.dedup();
            // delaunator пропускает дубликаты: у такой точки нет треугольников
            if list.is_empty() {
                return Err(GeometryError::DuplicatePoint { index });
            }
        }

        let tolerance = 1e-9 * bounds.width.max(bounds.height);
        let mut polygons = Vec::with_capacity(points.len());
        let mut edge_owners = Vec::with_capacity(points.len());
        for (index, site) in points.iter().enumerate() {
            let mut polygon = clip::bounds_polygon(&bounds);
            for &other in &neighbors[index] {
                polygon = clip::clip_by_bisector(&polygon, *site, points[other], other, tolerance);
                if polygon.len() < 3 {
                    break;
                }
            }
            if polygon.len() < 3 {
                return Err(GeometryError::DegenerateCell { index });
            }
            let (vertices, owners): (Vec<Point>, Vec<Option<usize>>) = polygon.into_iter().unzip();
            polygons.push(vertices);
            edge_owners.push(owners);
        }

        let areas = polygons.iter().map(|poly| polygon_area(poly)).collect();
        let boundary = edge_owners
            .iter()
            .map(|owners| owners.iter().any(Option::is_none))
            .collect();
        let grid = LocateGrid::build(&bounds, points);

        tracing::debug!(
            cells = points.len(),
            triangles = triangulation.triangles.len() / 3,
            "разбиение построено"
        );

        Ok(Self {
            bounds,
            centers: points.to_vec(),
            neighbors,
            polygons,
            edge_owners,
            areas,
            boundary,
            grid,
        })
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    #[must_use]
    pub fn centers(&self) -> &[Point] {
        &self.centers
    }

    /// Замкнутый многоугольник ячейки (не менее трёх вершин)
    #[must_use]
    pub fn polygon(&self, cell: usize) -> &[Point] {
        &self.polygons[cell]
    }

    #[must_use]
    pub fn area(&self, cell: usize) -> f64 {
        self.areas[cell]
    }

    /// Средний шаг сетки: сторона квадрата той же площади, что и средняя ячейка
    #[must_use]
    pub fn mean_spacing(&self) -> f64 {
        (self.bounds.area() / self.centers.len().max(1) as f64).sqrt()
    }

    /// Общее ребро ячеек `a` и `b`, если оно уцелело внутри области.
    #[must_use]
    pub fn shared_edge(&self, a: usize, b: usize) -> Option<(Point, Point)> {
        let polygon = &self.polygons[a];
        self.edge_owners[a]
            .iter()
            .position(|&owner| owner == Some(b))
            .map(|k| (polygon[k], polygon[(k + 1) % polygon.len()]))
    }

    /// Ячейка, содержащая точку (ближайший центр), или `None` вне области.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<usize> {
        let p = Point::new(x, y);
        if !self.bounds.contains(&p) {
            return None;
        }
        Some(self.walk_to_nearest(self.grid.hint(&p), &p))
    }

    /// Как [`Partition::locate`], но спуск начинается с `hint`: удобно для
    /// последовательных запросов к соседним точкам.
    #[must_use]
    pub fn locate_from(&self, hint: usize, p: Point) -> Option<usize> {
        if !self.bounds.contains(&p) || self.centers.is_empty() {
            return None;
        }
        Some(self.walk_to_nearest(hint.min(self.centers.len() - 1), &p))
    }

    fn walk_to_nearest(&self, start: usize, p: &Point) -> usize {
        let mut current = start;
        let mut best = self.centers[current].distance_sq(p);

        // Расстояние строго убывает на каждом шаге, поэтому шагов не больше числа ячеек.
        for _ in 0..self.centers.len() {
            let mut next = current;
            for &n in &self.neighbors[current] {
                let d = self.centers[n].distance_sq(p);
                if d < best {
                    best = d;
                    next = n;
                }
            }
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

impl AdjacencyProvider for Partition {
    fn cell_count(&self) -> usize {
        self.centers.len()
    }

    fn neighbors(&self, cell: usize) -> &[usize] {
        &self.neighbors[cell]
    }

    fn center(&self, cell: usize) -> Point {
        self.centers[cell]
    }

    fn is_boundary(&self, cell: usize) -> bool {
        self.boundary[cell]
    }
}

fn count_distinct(points: &[Point]) -> usize {
    let mut sorted: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    sorted.dedup();
    sorted.len()
}

/// Регулярная сетка с небольшим детерминированным сдвигом точек: общая заготовка для тестов.
#[cfg(test)]
pub(crate) fn grid_partition(cols: usize, rows: usize, spacing: f64) -> Partition {
    let mut points = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            let i = r * cols + c;
            let jx = ((i * 37 % 11) as f64 - 5.0) * 0.01 * spacing;
            let jy = ((i * 53 % 13) as f64 - 6.0) * 0.01 * spacing;
            points.push(Point::new(
                (c as f64 + 0.5) * spacing + jx,
                (r as f64 + 0.5) * spacing + jy,
            ));
        }
    }
    Partition::build(
        &points,
        Bounds::new(cols as f64 * spacing, rows as f64 * spacing),
    )
    .expect("test grid must triangulate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_is_symmetric() {
        let partition = grid_partition(12, 9, 10.0);
        for i in 0..partition.len() {
            assert!(!partition.neighbors(i).is_empty());
            for &j in partition.neighbors(i) {
                assert_ne!(i, j);
                assert!(partition.neighbors(j).contains(&i), "{i} -> {j}");
            }
        }
    }

    #[test]
    fn polygons_tile_the_domain() {
        let partition = grid_partition(10, 7, 5.0);
        let total: f64 = (0..partition.len()).map(|i| partition.area(i)).sum();
        let expected = partition.bounds().area();
        assert!((total - expected).abs() < expected * 1e-9, "{total} vs {expected}");
        for i in 0..partition.len() {
            assert!(partition.polygon(i).len() >= 3);
        }
    }

    #[test]
    fn boundary_cells_are_on_the_rim() {
        let partition = grid_partition(6, 6, 1.0);
        // Угловая ячейка касается края, центральная — нет
        assert!(partition.is_boundary(0));
        assert!(!partition.is_boundary(2 * 6 + 2));
    }

    #[test]
    fn shared_edges_match_on_both_sides() {
        let partition = grid_partition(5, 5, 2.0);
        let a = 2 * 5 + 2;
        for &b in partition.neighbors(a) {
            if let (Some((p0, p1)), Some((q0, q1))) =
                (partition.shared_edge(a, b), partition.shared_edge(b, a))
            {
                let same = p0.distance(&q1) < 1e-9 && p1.distance(&q0) < 1e-9;
                let flipped = p0.distance(&q0) < 1e-9 && p1.distance(&q1) < 1e-9;
                assert!(same || flipped);
            }
        }
    }

    #[test]
    fn locate_finds_nearest_center() {
        let partition = grid_partition(9, 8, 3.0);
        let bounds = partition.bounds();
        for k in 0..200 {
            let x = (k as f64 * 0.618_034).fract() * bounds.width;
            let y = (k as f64 * 0.414_214).fract() * bounds.height;
            let p = Point::new(x, y);
            let found = partition.locate(x, y).unwrap();
            let brute = (0..partition.len())
                .min_by(|&a, &b| {
                    partition.centers()[a]
                        .distance_sq(&p)
                        .total_cmp(&partition.centers()[b].distance_sq(&p))
                })
                .unwrap();
            let d_found = partition.centers()[found].distance_sq(&p);
            let d_brute = partition.centers()[brute].distance_sq(&p);
            assert!((d_found - d_brute).abs() < 1e-9);
        }
        assert_eq!(partition.locate(-1.0, 1.0), None);
    }

    #[test]
    fn degenerate_inputs_are_geometry_errors() {
        let bounds = Bounds::new(10.0, 10.0);
        let two = [Point::new(1.0, 1.0), Point::new(2.0, 2.0), Point::new(1.0, 1.0)];
        assert_eq!(
            Partition::build(&two, bounds).unwrap_err(),
            GeometryError::TooFewPoints { distinct: 2 }
        );

        let line = [
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
            Point::new(4.0, 4.0),
        ];
        assert_eq!(
            Partition::build(&line, bounds).unwrap_err(),
            GeometryError::Collinear
        );

        let outside = [Point::new(1.0, 1.0), Point::new(2.0, 5.0), Point::new(30.0, 3.0)];
        assert_eq!(
            Partition::build(&outside, bounds).unwrap_err(),
            GeometryError::PointOutOfBounds { index: 2 }
        );

        let duplicate = [
            Point::new(1.0, 1.0),
            Point::new(8.0, 1.0),
            Point::new(4.0, 7.0),
            Point::new(8.0, 1.0),
        ];
        assert!(matches!(
            Partition::build(&duplicate, bounds).unwrap_err(),
            GeometryError::DuplicatePoint { .. }
        ));
    }
}
