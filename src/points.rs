//! Расстановка центров ячеек
//!
//! Четыре распределения (равномерное, сетка со сдвигом, диск Пуассона,
//! релаксация Ллойда) и необязательное смещение к суше: точки гуще там,
//! где дешёвая предварительная оценка шума обещает сушу.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::config::Distribution;
use crate::error::GeometryError;
use crate::geometry::{Bounds, Point, polygon_centroid};
use crate::partition::Partition;

/// Доля клетки, на которую может сместиться точка сетки
const JITTER: f64 = 0.8;
/// Попыток вокруг активной точки в алгоритме Bridson
const POISSON_ATTEMPTS: usize = 30;
/// Подобран так, чтобы Bridson давал заметно больше точек, чем нужно
const POISSON_RADIUS_FACTOR: f64 = 0.55;
/// Минимальный вес кандидата при смещении к суше: океан не пустеет полностью
const LAND_BIAS_FLOOR: f64 = 0.25;

/// Параметры расстановки
#[derive(Debug, Clone, Copy)]
pub struct SamplingPlan {
    pub bounds: Bounds,
    pub count: usize,
    pub distribution: Distribution,
    pub relax_iterations: u32,
}

/// Генерирует ровно `plan.count` точек внутри области.
///
/// `land_probability` — необязательная оценка вероятности суши в точке (0..1);
/// при её наличии выбирается `count` точек из `2·count` кандидатов с весами.
pub fn sample_points(
    plan: &SamplingPlan,
    rng: &mut ChaCha8Rng,
    land_probability: Option<&dyn Fn(Point) -> f64>,
) -> Result<Vec<Point>, GeometryError> {
    let mut points = match land_probability {
        None => base_points(plan.distribution, plan.bounds, plan.count, rng),
        Some(probability) => {
            let candidates = base_points(plan.distribution, plan.bounds, plan.count * 2, rng);
            weighted_subset(candidates, plan.count, rng, |p| {
                LAND_BIAS_FLOOR + probability(p).clamp(0.0, 1.0)
            })
        }
    };

    let mut iterations = plan.relax_iterations;
    if plan.distribution == Distribution::Relaxed {
        iterations = iterations.max(1);
    }
    lloyd_relaxation(&mut points, plan.bounds, iterations)?;
    Ok(points)
}

fn base_points(
    distribution: Distribution,
    bounds: Bounds,
    count: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<Point> {
    match distribution {
        Distribution::Uniform | Distribution::Relaxed => uniform_points(bounds, count, rng),
        Distribution::Jittered => jittered_points(bounds, count, rng),
        Distribution::PoissonDisc => poisson_disc_points(bounds, count, rng),
    }
}

pub fn uniform_points(bounds: Bounds, count: usize, rng: &mut ChaCha8Rng) -> Vec<Point> {
    (0..count)
        .map(|_| {
            Point::new(
                rng.gen_range(0.0..bounds.width),
                rng.gen_range(0.0..bounds.height),
            )
        })
        .collect()
}

/// Сетка `cols × rows ≥ count`, из которой равномерно берётся `count` клеток;
/// точка — центр клетки со случайным сдвигом.
pub fn jittered_points(bounds: Bounds, count: usize, rng: &mut ChaCha8Rng) -> Vec<Point> {
    if count == 0 {
        return Vec::new();
    }
    let aspect = bounds.width / bounds.height;
    let cols = ((count as f64 * aspect).sqrt().ceil() as usize).max(1);
    let rows = count.div_ceil(cols).max(1);
    let total = cols * rows;
    let cell_w = bounds.width / cols as f64;
    let cell_h = bounds.height / rows as f64;

    (0..count)
        .map(|k| {
            let slot = k * total / count;
            let (cx, cy) = ((slot % cols) as f64, (slot / cols) as f64);
            let dx = rng.gen_range(-0.5..0.5) * JITTER;
            let dy = rng.gen_range(-0.5..0.5) * JITTER;
            Point::new((cx + 0.5 + dx) * cell_w, (cy + 0.5 + dy) * cell_h)
        })
        .collect()
}

/// Диск Пуассона (Bridson). Радиус выбран с запасом; лишние точки
/// отбрасываются случайно, недостающие добираются равномерно.
pub fn poisson_disc_points(bounds: Bounds, count: usize, rng: &mut ChaCha8Rng) -> Vec<Point> {
    if count == 0 {
        return Vec::new();
    }
    let radius = (POISSON_RADIUS_FACTOR * bounds.area() / count as f64).sqrt();
    let cell = radius / std::f64::consts::SQRT_2;
    let cols = ((bounds.width / cell).ceil() as usize).max(1);
    let rows = ((bounds.height / cell).ceil() as usize).max(1);
    let mut grid: Vec<Option<usize>> = vec![None; cols * rows];
    let slot = |p: &Point| {
        let cx = ((p.x / cell) as usize).min(cols - 1);
        let cy = ((p.y / cell) as usize).min(rows - 1);
        (cx, cy)
    };

    let mut points: Vec<Point> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let first = Point::new(
        rng.gen_range(0.0..bounds.width),
        rng.gen_range(0.0..bounds.height),
    );
    let (fx, fy) = slot(&first);
    grid[fy * cols + fx] = Some(0);
    points.push(first);
    active.push(0);

    while !active.is_empty() {
        let pick = rng.gen_range(0..active.len());
        let origin = points[active[pick]];
        let mut placed = false;

        for _ in 0..POISSON_ATTEMPTS {
            let angle = rng.gen_range(0.0..std::f64::consts::TAU);
            let dist = rng.gen_range(radius..2.0 * radius);
            let candidate = Point::new(origin.x + dist * angle.cos(), origin.y + dist * angle.sin());
            if !(candidate.x >= 0.0
                && candidate.x < bounds.width
                && candidate.y >= 0.0
                && candidate.y < bounds.height)
            {
                continue;
            }

            let (cx, cy) = slot(&candidate);
            let mut free = true;
            'scan: for ny in cy.saturating_sub(2)..=(cy + 2).min(rows - 1) {
                for nx in cx.saturating_sub(2)..=(cx + 2).min(cols - 1) {
                    if let Some(other) = grid[ny * cols + nx] {
                        if points[other].distance_sq(&candidate) < radius * radius {
                            free = false;
                            break 'scan;
                        }
                    }
                }
            }

            if free {
                let index = points.len();
                grid[cy * cols + cx] = Some(index);
                points.push(candidate);
                active.push(index);
                placed = true;
                break;
            }
        }

        if !placed {
            active.swap_remove(pick);
        }
    }

    if points.len() > count {
        points.shuffle(rng);
        points.truncate(count);
    } else if points.len() < count {
        let missing = count - points.len();
        tracing::debug!(missing, "диск Пуассона дал меньше точек, добираем равномерно");
        points.extend(uniform_points(bounds, missing, rng));
    }
    points
}

/// Взвешенная выборка без возвращения (ключи Эфраимидиса–Спиракиса `u^(1/w)`).
fn weighted_subset(
    candidates: Vec<Point>,
    count: usize,
    rng: &mut ChaCha8Rng,
    weight: impl Fn(Point) -> f64,
) -> Vec<Point> {
    let mut keyed: Vec<(f64, usize)> = candidates
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            (u.powf(1.0 / weight(p).max(f64::EPSILON)), i)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    keyed.truncate(count);
    // Исходный порядок кандидатов сохраняет пространственную связность индексов
    keyed.sort_by_key(|&(_, i)| i);
    keyed.into_iter().map(|(_, i)| candidates[i]).collect()
}

/// Релаксация Ллойда: каждая точка переносится в центр масс своей ячейки.
pub fn lloyd_relaxation(
    points: &mut [Point],
    bounds: Bounds,
    iterations: u32,
) -> Result<(), GeometryError> {
    for _ in 0..iterations {
        let partition = Partition::build(points, bounds)?;
        for (i, point) in points.iter_mut().enumerate() {
            *point = bounds.clamp(polygon_centroid(partition.polygon(i)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RngStream, SeedContext};

    fn plan(distribution: Distribution) -> SamplingPlan {
        SamplingPlan {
            bounds: Bounds::new(300.0, 200.0),
            count: 250,
            distribution,
            relax_iterations: 0,
        }
    }

    #[test]
    fn every_distribution_yields_exact_count_inside_bounds() {
        for distribution in [
            Distribution::Uniform,
            Distribution::Jittered,
            Distribution::PoissonDisc,
            Distribution::Relaxed,
        ] {
            let plan = plan(distribution);
            let mut rng = SeedContext::new(3).rng(RngStream::Points);
            let points = sample_points(&plan, &mut rng, None).unwrap();
            assert_eq!(points.len(), plan.count, "{distribution:?}");
            assert!(points.iter().all(|p| plan.bounds.contains(p)), "{distribution:?}");
        }
    }

    #[test]
    fn sampling_is_deterministic() {
        let plan = plan(Distribution::PoissonDisc);
        let a = sample_points(&plan, &mut SeedContext::new(9).rng(RngStream::Points), None).unwrap();
        let b = sample_points(&plan, &mut SeedContext::new(9).rng(RngStream::Points), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn land_bias_concentrates_points() {
        let plan = plan(Distribution::Uniform);
        let left_is_land = |p: Point| if p.x < 150.0 { 1.0 } else { 0.0 };
        let mut rng = SeedContext::new(5).rng(RngStream::Points);
        let points = sample_points(&plan, &mut rng, Some(&left_is_land)).unwrap();

        assert_eq!(points.len(), plan.count);
        let left = points.iter().filter(|p| p.x < 150.0).count();
        assert!(left > plan.count * 6 / 10, "left = {left}");
    }

    #[test]
    fn relaxation_keeps_points_in_bounds() {
        let bounds = Bounds::new(50.0, 50.0);
        let mut rng = SeedContext::new(1).rng(RngStream::Points);
        let mut points = uniform_points(bounds, 60, &mut rng);
        lloyd_relaxation(&mut points, bounds, 2).unwrap();
        assert_eq!(points.len(), 60);
        assert!(points.iter().all(|p| bounds.contains(p)));
    }
}
