//! Контуры: береговые линии, границы королевств, берега озёр
//!
//! Все три строятся одинаково: отбираются общие рёбра многоугольников соседних
//! ячеек, вершины квантуются в целочисленные ключи, рёбра склеиваются
//! через [`chain_edges`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chain::{ChainMode, chain_edges};
use crate::geometry::Point;
use crate::heightmap::ElevationSource;
use crate::hydrology::Hydrology;
use crate::partition::{AdjacencyProvider, Partition};
use crate::political::Political;

type VertexKey = (i64, i64);

/// Ломаная или замкнутый контур
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Граница суши и моря. У края области контур может остаться открытым.
#[must_use]
pub fn coastlines<E: ElevationSource + ?Sized>(partition: &Partition, terrain: &E) -> Vec<Outline> {
    trace(partition, ChainMode::Loops, |a, b| {
        terrain.is_land(a) && !terrain.is_land(b)
    })
}

/// Границы между королевствами (только суша с обеих сторон)
#[must_use]
pub fn territory_borders(partition: &Partition, political: &Political) -> Vec<Outline> {
    trace(partition, ChainMode::Paths, |a, b| {
        a < b
            && matches!(
                (political.territory_of(a), political.territory_of(b)),
                (Some(x), Some(y)) if x != y
            )
    })
}

#[must_use]
pub fn lake_shores(partition: &Partition, hydrology: &Hydrology) -> Vec<Outline> {
    trace(partition, ChainMode::Loops, |a, b| {
        hydrology
            .lake_of(a)
            .is_some_and(|lake| hydrology.lake_of(b) != Some(lake))
    })
}

fn trace(
    partition: &Partition,
    mode: ChainMode,
    selects: impl Fn(usize, usize) -> bool,
) -> Vec<Outline> {
    let bounds = partition.bounds();
    let quantum = 1e-6 * bounds.width.max(bounds.height);
    let key = |p: Point| -> VertexKey { ((p.x / quantum).round() as i64, (p.y / quantum).round() as i64) };

    let mut vertices: BTreeMap<VertexKey, Point> = BTreeMap::new();
    let mut edges: Vec<(VertexKey, VertexKey)> = Vec::new();
    for a in 0..partition.len() {
        for &b in partition.neighbors(a) {
            if !selects(a, b) {
                continue;
            }
            if let Some((p, q)) = partition.shared_edge(a, b) {
                let (kp, kq) = (key(p), key(q));
                vertices.entry(kp).or_insert(p);
                vertices.entry(kq).or_insert(q);
                edges.push((kp, kq));
            }
        }
    }

    chain_edges(&edges, mode)
        .into_iter()
        .map(|chain| Outline {
            points: chain
                .vertices
                .iter()
                .filter_map(|k| vertices.get(k).copied())
                .collect(),
            closed: chain.closed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::grid_partition;

    #[test]
    fn island_has_one_closed_coastline() {
        let partition = grid_partition(10, 10, 1.0);
        let elevation: Vec<f32> = (0..partition.len())
            .map(|i| {
                let (col, row) = (i % 10, i / 10);
                if (3..7).contains(&col) && (3..7).contains(&row) { 100.0 } else { -100.0 }
            })
            .collect();

        let coasts = coastlines(&partition, elevation.as_slice());
        assert_eq!(coasts.len(), 1);
        assert!(coasts[0].closed);
        assert!(coasts[0].points.len() >= 4);
    }

    #[test]
    fn enclosed_lake_has_one_closed_shore() {
        use crate::config::HydrologySettings;
        use crate::context::{RngStream, SeedContext};

        let partition = grid_partition(9, 9, 1.0);
        let mut elevation = vec![500.0_f32; partition.len()];
        for (col, e) in [(4, 100.0), (5, 200.0), (6, 150.0), (7, 120.0), (8, 110.0)] {
            elevation[4 * 9 + col] = e;
        }
        let settings = HydrologySettings::default();
        let mut hydrology = Hydrology::new(partition.len());
        hydrology.fill_depressions(&partition, &elevation).unwrap();
        hydrology.compute_drainage(&partition, &elevation).unwrap();
        hydrology.accumulate_flow(&elevation).unwrap();
        let mut rng = SeedContext::new(1).rng(RngStream::Rivers);
        hydrology
            .trace_rivers(&partition, &elevation, &settings, &mut rng)
            .unwrap();
        hydrology.detect_lakes(&partition, &elevation, &settings).unwrap();
        assert_eq!(hydrology.lakes().len(), 1);

        let shores = lake_shores(&partition, &hydrology);
        assert_eq!(shores.len(), 1);
        assert!(shores[0].closed);
        let polygon = partition.polygon(4 * 9 + 4);
        assert!(shores[0].points.len() >= 3);
        assert!(shores[0].points.len() <= polygon.len());
    }

    #[test]
    fn all_sea_has_no_coast() {
        let partition = grid_partition(5, 5, 1.0);
        let elevation = vec![-1.0_f32; partition.len()];
        assert!(coastlines(&partition, elevation.as_slice()).is_empty());
    }
}
