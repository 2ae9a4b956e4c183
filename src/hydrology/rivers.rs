//! Трассировка рек по сети стока

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::HydrologySettings;
use crate::heightmap::SEA_LEVEL;
use crate::partition::{AdjacencyProvider, Partition};

/// Сколько шагов река может пройти по морю после устья
const OCEAN_OVERSHOOT: usize = 2;

/// Где заканчивается река
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiverMouth {
    Ocean,
    /// Впадает в реку с указанным индексом
    Confluence(usize),
    /// Уходит за край области
    Boundary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct River {
    /// Ячейки от истока к устью; при слиянии последняя ячейка принадлежит принимающей реке
    pub cells: Vec<usize>,
    pub source: usize,
    pub mouth: RiverMouth,
    /// Накопленный поток в последней ячейке суши
    pub discharge: f32,
}

/// Трассирует реки и возвращает их вместе с принадлежностью ячеек суши рекам.
///
/// Истоки берутся из верхнего перцентиля высот в случайном (сидированном) порядке
/// с минимальным расстоянием между истоками. Река останавливается у устья, на
/// слиянии с уже проложенной рекой или у края, так что сеть древовидна.
pub fn trace_rivers(
    partition: &Partition,
    elevation: &[f32],
    drainage: &[Option<usize>],
    flow: &[f32],
    settings: &HydrologySettings,
    rng: &mut ChaCha8Rng,
) -> (Vec<River>, Vec<Option<usize>>) {
    let n = partition.len();
    let mut river_of: Vec<Option<usize>> = vec![None; n];
    let mut rivers: Vec<River> = Vec::new();

    let mut land: Vec<usize> = (0..n).filter(|&c| elevation[c] >= SEA_LEVEL).collect();
    if land.is_empty() || settings.max_rivers == 0 {
        return (rivers, river_of);
    }
    land.sort_by(|&a, &b| elevation[b].total_cmp(&elevation[a]).then(a.cmp(&b)));
    let take = ((land.len() as f32 * settings.river_source_percentile).ceil() as usize)
        .clamp(1, land.len());
    let mut candidates = land[..take].to_vec();
    candidates.shuffle(rng);

    let min_distance = settings.river_spacing * partition.mean_spacing();
    let mut sources: Vec<usize> = Vec::new();

    for source in candidates {
        if rivers.len() >= settings.max_rivers {
            break;
        }
        if river_of[source].is_some() {
            continue;
        }
        let origin = partition.center(source);
        if sources
            .iter()
            .any(|&s| partition.center(s).distance(&origin) < min_distance)
        {
            continue;
        }

        let river = trace_one(partition, elevation, drainage, flow, &river_of, source);
        let land_cells = river
            .cells
            .iter()
            .filter(|&&c| elevation[c] >= SEA_LEVEL)
            .count();
        if land_cells < settings.river_min_length {
            continue;
        }

        let index = rivers.len();
        for &cell in &river.cells {
            if elevation[cell] >= SEA_LEVEL && river_of[cell].is_none() {
                river_of[cell] = Some(index);
            }
        }
        sources.push(source);
        rivers.push(river);
    }

    (rivers, river_of)
}

fn trace_one(
    partition: &Partition,
    elevation: &[f32],
    drainage: &[Option<usize>],
    flow: &[f32],
    river_of: &[Option<usize>],
    source: usize,
) -> River {
    let mut cells = vec![source];
    let mut current = source;
    let mut mouth = RiverMouth::Boundary;

    for _ in 0..partition.len() {
        let Some(next) = drainage[current] else {
            mouth = RiverMouth::Boundary;
            break;
        };

        if elevation[next] >= SEA_LEVEL {
            cells.push(next);
            if let Some(other) = river_of[next] {
                mouth = RiverMouth::Confluence(other);
                break;
            }
            current = next;
            continue;
        }

        // Устье: в море сток не определён, дальше идём по исходному рельефу
        cells.push(next);
        let mut at = next;
        for _ in 0..OCEAN_OVERSHOOT {
            let deeper = partition
                .neighbors(at)
                .iter()
                .copied()
                .filter(|&c| elevation[c] < elevation[at] && !cells.contains(&c))
                .min_by(|&a, &b| elevation[a].total_cmp(&elevation[b]).then(a.cmp(&b)));
            match deeper {
                Some(c) => {
                    cells.push(c);
                    at = c;
                }
                None => break,
            }
        }
        mouth = RiverMouth::Ocean;
        break;
    }

    let discharge = cells
        .iter()
        .rev()
        .find(|&&c| elevation[c] >= SEA_LEVEL)
        .map_or(0.0, |&c| flow[c]);

    River {
        cells,
        source,
        mouth,
        discharge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RngStream, SeedContext};
    use crate::hydrology::fill::priority_flood;
    use crate::hydrology::flow::{accumulate_flow, compute_drainage};
    use crate::partition::grid_partition;

    fn slope() -> (Partition, Vec<f32>) {
        let partition = grid_partition(16, 10, 1.0);
        let elevation = (0..partition.len())
            .map(|i| {
                let (col, row) = (i % 16, i / 16);
                if col == 0 {
                    -100.0
                } else {
                    col as f32 * 120.0 + ((row * 31) % 7) as f32 * 10.0
                }
            })
            .collect();
        (partition, elevation)
    }

    #[test]
    fn rivers_run_from_high_ground_to_the_sea() {
        let (partition, elevation) = slope();
        let filled = priority_flood(&partition, &elevation);
        let drainage = compute_drainage(&partition, &elevation, &filled);
        let flow = accumulate_flow(&elevation, &filled, &drainage);
        let settings = HydrologySettings {
            river_spacing: 1.5,
            ..HydrologySettings::default()
        };
        let mut rng = SeedContext::new(8).rng(RngStream::Rivers);
        let (rivers, river_of) =
            trace_rivers(&partition, &elevation, &drainage, &flow, &settings, &mut rng);

        assert!(!rivers.is_empty());
        for (index, river) in rivers.iter().enumerate() {
            assert_eq!(river.cells[0], river.source);
            assert_eq!(river_of[river.source], Some(index));
            let land = river.cells.iter().filter(|&&c| elevation[c] >= 0.0).count();
            assert!(land >= settings.river_min_length);
            match river.mouth {
                RiverMouth::Ocean => {
                    assert!(river.cells.iter().any(|&c| elevation[c] < 0.0));
                    assert!(river.cells.len() - land <= 1 + OCEAN_OVERSHOOT);
                }
                RiverMouth::Confluence(other) => assert!(other < index),
                RiverMouth::Boundary => {}
            }
        }
    }

    #[test]
    fn short_rivers_are_dropped() {
        let (partition, elevation) = slope();
        let filled = priority_flood(&partition, &elevation);
        let drainage = compute_drainage(&partition, &elevation, &filled);
        let flow = accumulate_flow(&elevation, &filled, &drainage);
        let settings = HydrologySettings {
            river_min_length: 100,
            ..HydrologySettings::default()
        };
        let mut rng = SeedContext::new(8).rng(RngStream::Rivers);
        let (rivers, river_of) =
            trace_rivers(&partition, &elevation, &drainage, &flow, &settings, &mut rng);
        assert!(rivers.is_empty());
        assert!(river_of.iter().all(Option::is_none));
    }
}
