//! Политическое деление суши на королевства
//!
//! Порядок работы:
//! 1. Массивы суши (BFS) и распределение столиц пропорционально площади
//! 2. Столицы: центр массива, затем самые удалённые точки
//! 3. Синхронный рост от столиц; мелкие массивы целиком — ближайшей столице
//! 4. Дочистка ничейных ячеек и передача эксклавов соседям
//! 5. Граф смежности (`petgraph`) и раскраска

pub mod coloring;
pub mod graph;
pub mod growth;
pub mod landmass;
pub mod repair;

use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

use crate::config::PoliticalSettings;
use crate::geometry::Point;
use crate::heightmap::ElevationSource;
use crate::partition::Partition;

pub use graph::TerritoryBorder;
pub use growth::Seat;
pub use landmass::Landmass;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: usize,
    pub cells: Vec<usize>,
    pub capital: usize,
    /// Центр масс по площадям ячеек
    pub centroid: Point,
    pub area: f64,
    /// Индекс цвета в палитре
    pub color: usize,
    /// Массив суши столицы
    pub landmass: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Political {
    territories: Vec<Territory>,
    territory_of: Vec<Option<usize>>,
    landmasses: Vec<Landmass>,
    landmass_of: Vec<Option<usize>>,
    borders: Vec<TerritoryBorder>,
}

impl Political {
    /// Делит сушу на `kingdom_count` королевств (меньше, если суши мало).
    pub fn partition<E: ElevationSource + ?Sized>(
        partition: &Partition,
        terrain: &E,
        kingdom_count: usize,
        settings: &PoliticalSettings,
    ) -> Self {
        let n = partition.len();
        let (mut landmasses, landmass_of) = landmass::find_landmasses(partition, terrain);
        let quotas =
            landmass::allocate_kingdoms(&mut landmasses, kingdom_count, settings.min_landmass_share);

        let mut seats = Vec::new();
        for (landmass, &quota) in landmasses.iter().zip(&quotas) {
            for capital in growth::place_capitals(partition, landmass, quota) {
                seats.push(Seat {
                    capital,
                    landmass: landmass.id,
                });
            }
        }

        let mut territory_of: Vec<Option<usize>> = vec![None; n];
        growth::grow_territories(partition, &landmass_of, &seats, &mut territory_of);
        growth::assign_minor_landmasses(partition, &landmasses, &seats, &mut territory_of);
        let leftovers = growth::claim_leftovers(partition, terrain, &seats, &mut territory_of);
        if leftovers > 0 {
            tracing::warn!(leftovers, "ничейная суша отдана соседним королевствам");
        }
        repair::repair_exclaves(partition, &seats, &mut territory_of);

        let pairs = graph::border_cell_pairs(partition, &territory_of);
        let borders = graph::collect_borders(&pairs, &territory_of);
        let territory_graph = graph::build_territory_graph(seats.len(), &borders);
        let colors = coloring::color_territories(&territory_graph, settings.palette_size);

        let mut cells_of: Vec<Vec<usize>> = vec![Vec::new(); seats.len()];
        for (cell, owner) in territory_of.iter().enumerate() {
            if let Some(id) = owner {
                cells_of[*id].push(cell);
            }
        }
        let territories: Vec<Territory> = seats
            .iter()
            .zip(cells_of)
            .enumerate()
            .map(|(id, (seat, cells))| {
                let (area, centroid) = landmass::weighted_centroid(partition, &cells);
                Territory {
                    id,
                    cells,
                    capital: seat.capital,
                    centroid,
                    area,
                    color: colors[id],
                    landmass: seat.landmass,
                }
            })
            .collect();

        tracing::info!(
            territories = territories.len(),
            landmasses = landmasses.len(),
            borders = borders.len(),
            "королевства сформированы"
        );

        Self {
            territories,
            territory_of,
            landmasses,
            landmass_of,
            borders,
        }
    }

    #[must_use]
    pub fn territories(&self) -> &[Territory] {
        &self.territories
    }

    #[must_use]
    pub fn territory_of(&self, cell: usize) -> Option<usize> {
        self.territory_of.get(cell).copied().flatten()
    }

    /// Принадлежность всех ячеек (море — `None`)
    #[must_use]
    pub fn assignment(&self) -> &[Option<usize>] {
        &self.territory_of
    }

    #[must_use]
    pub fn landmasses(&self) -> &[Landmass] {
        &self.landmasses
    }

    #[must_use]
    pub fn landmass_of(&self, cell: usize) -> Option<usize> {
        self.landmass_of.get(cell).copied().flatten()
    }

    #[must_use]
    pub fn borders(&self) -> &[TerritoryBorder] {
        &self.borders
    }

    /// Пары соседних ячеек суши из разных королевств
    #[must_use]
    pub fn border_edges(&self, partition: &Partition) -> Vec<(usize, usize)> {
        graph::border_cell_pairs(partition, &self.territory_of)
    }

    #[must_use]
    pub fn graph(&self) -> UnGraph<usize, usize> {
        graph::build_territory_graph(self.territories.len(), &self.borders)
    }

    #[must_use]
    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        let key = (a.min(b), a.max(b));
        self.borders.iter().any(|border| (border.a, border.b) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeightmapSettings;
    use crate::context::SeedContext;
    use crate::heightmap::synthesize;
    use crate::partition::{AdjacencyProvider, grid_partition};

    #[test]
    fn every_land_cell_gets_exactly_one_territory() {
        let partition = grid_partition(30, 20, 10.0);
        let terrain = synthesize(&partition, &HeightmapSettings::default(), &SeedContext::new(5));
        let political = Political::partition(&partition, &terrain, 6, &PoliticalSettings::default());

        assert!(!political.territories().is_empty());
        let mut owners = vec![0_usize; partition.len()];
        for territory in political.territories() {
            assert_eq!(political.territory_of(territory.capital), Some(territory.id));
            for &cell in &territory.cells {
                owners[cell] += 1;
            }
        }
        for cell in 0..partition.len() {
            if terrain.is_land(cell) {
                assert_eq!(owners[cell], 1, "cell {cell}");
                assert!(political.territory_of(cell).is_some());
            } else {
                assert_eq!(owners[cell], 0);
            }
        }
    }

    #[test]
    fn adjacent_territories_have_distinct_colors() {
        let partition = grid_partition(30, 20, 10.0);
        let terrain = synthesize(&partition, &HeightmapSettings::default(), &SeedContext::new(17));
        let political = Political::partition(&partition, &terrain, 8, &PoliticalSettings::default());
        let graph = political.graph();
        let max_degree = (0..graph.node_count())
            .map(|i| graph.neighbors(petgraph::graph::NodeIndex::new(i)).count())
            .max()
            .unwrap_or(0);
        assert!(PoliticalSettings::default().palette_size > max_degree);

        for border in political.borders() {
            let a = &political.territories()[border.a];
            let b = &political.territories()[border.b];
            assert_ne!(a.color, b.color);
        }
    }

    #[test]
    fn single_kingdom_on_single_landmass_has_no_borders() {
        let partition = grid_partition(12, 12, 1.0);
        let elevation: Vec<f32> = (0..partition.len())
            .map(|c| if partition.is_boundary(c) { -50.0 } else { 200.0 })
            .collect();
        let political =
            Political::partition(&partition, elevation.as_slice(), 1, &PoliticalSettings::default());

        assert_eq!(political.territories().len(), 1);
        let land = elevation.iter().filter(|&&e| e >= 0.0).count();
        assert_eq!(political.territories()[0].cells.len(), land);
        assert!(political.border_edges(&partition).is_empty());
        assert!(political.borders().is_empty());
    }
}
