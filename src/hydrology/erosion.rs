//! Гидравлическая эрозия по накопленному потоку
//!
//! Один проход из трёх шагов:
//! 1. Ячейки суши с долей потока выше порога теряют высоту пропорционально `sqrt(доли)`
//! 2. Перепад между размытой ячейкой и её соседями ограничивается `max_slope`
//! 3. Затронутые ячейки один раз сглаживаются по соседям-суше
//!
//! Суша никогда не опускается ниже `SEA_LEVEL + 1`, так что деление на сушу и море не меняется.

use crate::config::HydrologySettings;
use crate::heightmap::SEA_LEVEL;
use crate::partition::AdjacencyProvider;

/// Возвращает число изменённых ячеек.
pub fn erode(
    adjacency: &impl AdjacencyProvider,
    elevation: &mut [f32],
    flow: &[f32],
    settings: &HydrologySettings,
) -> usize {
    let max_flow = elevation
        .iter()
        .zip(flow)
        .filter(|(e, _)| **e >= SEA_LEVEL)
        .map(|(_, &f)| f)
        .fold(0.0_f32, f32::max);
    if max_flow <= 0.0 {
        return 0;
    }

    let floor = |e: f32| e.min(SEA_LEVEL + 1.0);
    let mut touched = vec![false; elevation.len()];
    let mut channels = Vec::new();

    for cell in 0..elevation.len() {
        if elevation[cell] < SEA_LEVEL {
            continue;
        }
        let ratio = flow[cell] / max_flow;
        if ratio <= settings.erosion_flow_threshold {
            continue;
        }
        let lowered = (elevation[cell] - settings.erosion_strength * ratio.sqrt())
            .max(floor(elevation[cell]));
        if lowered < elevation[cell] {
            elevation[cell] = lowered;
            touched[cell] = true;
            channels.push(cell);
        }
    }

    // Берега русла не должны нависать над ним круче `max_slope`
    for &cell in &channels {
        for &n in adjacency.neighbors(cell) {
            if elevation[n] < SEA_LEVEL {
                continue;
            }
            let limit = elevation[cell] + settings.max_slope;
            if elevation[n] > limit {
                elevation[n] = limit.max(floor(elevation[n]));
                touched[n] = true;
            }
        }
    }

    let snapshot = elevation.to_vec();
    let mut changed = 0;
    for cell in 0..elevation.len() {
        if !touched[cell] {
            continue;
        }
        changed += 1;
        let land: Vec<f32> = adjacency
            .neighbors(cell)
            .iter()
            .map(|&n| snapshot[n])
            .filter(|&e| e >= SEA_LEVEL)
            .collect();
        if land.is_empty() {
            continue;
        }
        let mean = land.iter().sum::<f32>() / land.len() as f32;
        elevation[cell] = (0.5 * snapshot[cell] + 0.5 * mean).max(floor(snapshot[cell]));
    }

    tracing::debug!(changed, "эрозия");
    changed
}
