//! Орографические осадки
//!
//! Высота каждой ячейки суши сравнивается со средними высотами соседей с
//! наветренной и подветренной стороны (веса — совпадение направления на соседа
//! с ветром). Ячейка выше наветренных соседей получает больше осадков, ниже —
//! меньше; подъём дальше по ветру добавляет слабый вклад. Море получает
//! постоянное умеренное значение. Поле сглаживается и растягивается на `[0, 1]`.

use crate::config::ClimateSettings;
use crate::heightmap::{SEA_LEVEL, stretch_to_unit};
use crate::partition::AdjacencyProvider;

pub const OCEAN_PRECIPITATION: f32 = 0.5;
/// Перепад высот, дающий максимальный орографический эффект
const SLOPE_SCALE: f32 = 500.0;
/// Доля подъёма со стороны ветра в итоговом уклоне; остаток — подъём дальше по ветру
const WINDWARD_SHARE: f32 = 0.75;
const SMOOTHING_PASSES: usize = 2;

/// Единичный вектор ветра по направлению в градусах
#[must_use]
pub fn wind_vector(direction_degrees: f32) -> (f64, f64) {
    let radians = f64::from(direction_degrees).to_radians();
    (radians.cos(), radians.sin())
}

/// Рассчитывает осадки в `[0, 1]` для каждой ячейки.
#[must_use]
pub fn compute_precipitation(
    adjacency: &impl AdjacencyProvider,
    elevation: &[f32],
    settings: &ClimateSettings,
) -> Vec<f32> {
    let wind = wind_vector(settings.wind_direction);
    let mut precipitation: Vec<f32> = (0..adjacency.cell_count())
        .map(|cell| {
            if elevation[cell] < SEA_LEVEL {
                OCEAN_PRECIPITATION
            } else {
                orographic(adjacency, elevation, cell, wind, settings)
            }
        })
        .collect();

    for _ in 0..SMOOTHING_PASSES {
        let previous = precipitation.clone();
        for (cell, value) in precipitation.iter_mut().enumerate() {
            let neighbors = adjacency.neighbors(cell);
            if neighbors.is_empty() {
                continue;
            }
            let mean = neighbors.iter().map(|&n| previous[n]).sum::<f32>() / neighbors.len() as f32;
            *value = 0.5 * previous[cell] + 0.5 * mean;
        }
    }

    rescale(&mut precipitation);
    precipitation
}

fn orographic(
    adjacency: &impl AdjacencyProvider,
    elevation: &[f32],
    cell: usize,
    wind: (f64, f64),
    settings: &ClimateSettings,
) -> f32 {
    let center = adjacency.center(cell);
    let own = elevation[cell];
    let (mut up, mut up_weight) = (0.0_f32, 0.0_f32);
    let (mut down, mut down_weight) = (0.0_f32, 0.0_f32);

    for &n in adjacency.neighbors(cell) {
        let other = adjacency.center(n);
        let (dx, dy) = (other.x - center.x, other.y - center.y);
        let length = (dx * dx + dy * dy).sqrt();
        if length <= f64::EPSILON {
            continue;
        }
        let alignment = ((dx * wind.0 + dy * wind.1) / length) as f32;
        // Море для ветра — ровная поверхность на уровне моря
        let height = elevation[n].max(SEA_LEVEL);
        if alignment > 0.0 {
            down += alignment * height;
            down_weight += alignment;
        } else if alignment < 0.0 {
            up -= alignment * height;
            up_weight -= alignment;
        }
    }

    let upwind = if up_weight > 0.0 { up / up_weight } else { own };
    let downwind = if down_weight > 0.0 { down / down_weight } else { own };
    let rise = WINDWARD_SHARE * (own - upwind) + (1.0 - WINDWARD_SHARE) * (downwind - own);
    let slope = (rise / SLOPE_SCALE).clamp(-1.0, 1.0);

    (settings.base_precipitation * (1.0 + slope * settings.wind_strength)).max(0.0)
}

/// Растягивает поле на `[0, 1]`; постоянное поле только обрезается.
fn rescale(values: &mut [f32]) {
    let min = values.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    if max - min > 1e-6 {
        stretch_to_unit(values);
    } else {
        for v in values.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
    }
}
