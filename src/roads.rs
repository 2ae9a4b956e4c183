//! Дороги между поселениями (A* по графу ячеек)
//!
//! Стоимость шага = расстояние × штраф за перепад высот × штраф за горы ×
//! скидка за уже проложенную дорогу × скидка у реки × штраф за пересечение реки ×
//! штраф за озеро. Море непроходимо. Если A* исчерпал лимит раскрытых вершин,
//! дорога просто не строится.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::config::RoadSettings;
use crate::heightmap::{ElevationSource, MAX_HEIGHT, SEA_LEVEL};
use crate::hydrology::Hydrology;
use crate::partition::{AdjacencyProvider, Partition};
use crate::political::Political;
use crate::settlement::{Settlement, SettlementRole};

/// Перепад высот, удваивающий стоимость шага
const ELEVATION_DELTA_SCALE: f32 = 250.0;
/// Нормализованная высота, с которой начинаются горы
const MOUNTAIN_LINE: f32 = 0.6;
const MOUNTAIN_PENALTY: f64 = 3.0;
const ROADED_DISCOUNT: f64 = 0.5;
const RIVERSIDE_DISCOUNT: f64 = 0.8;
const RIVER_CROSSING_PENALTY: f64 = 4.0;
const LAKE_PENALTY: f64 = 6.0;
/// Нижняя граница множителя стоимости: эвристика с ним допустима
const MIN_FACTOR: f64 = ROADED_DISCOUNT * RIVERSIDE_DISCOUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadImportance {
    /// Между столицами соседних королевств
    Highway,
    /// От поселения к своей столице
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub cells: Vec<usize>,
    /// Индексы поселений
    pub from: usize,
    pub to: usize,
    pub importance: RoadImportance,
    pub cost: f64,
}

/// Модель стоимости поверх рельефа и гидрологии
pub struct CostModel<'a, E: ElevationSource + ?Sized> {
    pub partition: &'a Partition,
    pub terrain: &'a E,
    pub hydrology: &'a Hydrology,
}

impl<E: ElevationSource + ?Sized> CostModel<'_, E> {
    /// Стоимость шага `from → to`; `None` — шаг невозможен.
    #[must_use]
    pub fn step_cost(&self, from: usize, to: usize, roaded: &[bool]) -> Option<f64> {
        if !self.terrain.is_land(to) {
            return None;
        }
        let spacing = self.partition.mean_spacing();
        let distance = self.partition.center(from).distance(&self.partition.center(to)) / spacing;

        let delta = (self.terrain.elevation(to) - self.terrain.elevation(from)).abs();
        let mut factor = 1.0 + f64::from(delta / ELEVATION_DELTA_SCALE);

        if (self.terrain.elevation(to) - SEA_LEVEL) / MAX_HEIGHT > MOUNTAIN_LINE {
            factor *= MOUNTAIN_PENALTY;
        }
        if roaded[to] {
            factor *= ROADED_DISCOUNT;
        }
        if self.hydrology.is_river(to) {
            if self.hydrology.river_of(from) != self.hydrology.river_of(to) {
                factor *= RIVER_CROSSING_PENALTY;
            }
        } else if self
            .partition
            .neighbors(to)
            .iter()
            .any(|&n| self.hydrology.is_river(n))
        {
            factor *= RIVERSIDE_DISCOUNT;
        }
        if self.hydrology.lake_of(to).is_some() {
            factor *= LAKE_PENALTY;
        }

        Some(distance * factor)
    }

    fn heuristic(&self, cell: usize, goal: usize) -> f64 {
        let spacing = self.partition.mean_spacing();
        self.partition.center(cell).distance(&self.partition.center(goal)) / spacing * MIN_FACTOR
    }

    /// A* от `start` до `goal`. `None`, если пути нет или исчерпан `budget`.
    #[must_use]
    pub fn find_path(
        &self,
        start: usize,
        goal: usize,
        roaded: &[bool],
        budget: usize,
    ) -> Option<(Vec<usize>, f64)> {
        if !self.terrain.is_land(start) || !self.terrain.is_land(goal) {
            return None;
        }
        let n = self.partition.len();
        let mut g_score = vec![f64::INFINITY; n];
        let mut came_from: Vec<Option<usize>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g_score[start] = 0.0;
        open.push(AStarNode {
            cell: start,
            f_score: self.heuristic(start, goal),
        });
        let mut expansions = 0;

        while let Some(current) = open.pop() {
            if current.cell == goal {
                let mut path = vec![goal];
                let mut cell = goal;
                while let Some(prev) = came_from[cell] {
                    path.push(prev);
                    cell = prev;
                }
                path.reverse();
                return Some((path, g_score[goal]));
            }
            if closed[current.cell] {
                continue;
            }
            closed[current.cell] = true;
            expansions += 1;
            if expansions > budget {
                return None;
            }

            for &next in self.partition.neighbors(current.cell) {
                if closed[next] {
                    continue;
                }
                let Some(step) = self.step_cost(current.cell, next, roaded) else {
                    continue;
                };
                let tentative = g_score[current.cell] + step;
                if tentative < g_score[next] {
                    g_score[next] = tentative;
                    came_from[next] = Some(current.cell);
                    open.push(AStarNode {
                        cell: next,
                        f_score: tentative + self.heuristic(next, goal),
                    });
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct AStarNode {
    cell: usize,
    f_score: f64,
}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AStarNode {}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Обратный порядок: BinaryHeap должна отдавать наименьшую оценку
        other
            .f_score
            .total_cmp(&self.f_score)
            .then(other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Прокладывает местные дороги (до `road_density` на королевство, от ближайших
/// к столице поселений) и магистрали между столицами соседних королевств одного массива.
pub fn build_roads<E: ElevationSource + ?Sized>(
    model: &CostModel<'_, E>,
    political: &Political,
    settlements: &[Settlement],
    road_density: usize,
    settings: &RoadSettings,
) -> Vec<Road> {
    let mut roads = Vec::new();
    if road_density == 0 {
        return roads;
    }
    let n = model.partition.len();
    let budget = settings.expansion_budget.unwrap_or(n);
    let mut roaded = vec![false; n];
    let mut dropped = 0_usize;

    let capital_of: Vec<Option<usize>> = political
        .territories()
        .iter()
        .map(|t| {
            settlements
                .iter()
                .position(|s| s.territory == t.id && s.role == SettlementRole::Capital)
        })
        .collect();

    let mut connect = |from: usize, to: usize, importance: RoadImportance, roads: &mut Vec<Road>| {
        match model.find_path(settlements[from].cell, settlements[to].cell, &roaded, budget) {
            Some((cells, cost)) => {
                for &cell in &cells {
                    roaded[cell] = true;
                }
                roads.push(Road {
                    cells,
                    from,
                    to,
                    importance,
                    cost,
                });
            }
            None => dropped += 1,
        }
    };

    for (territory, capital) in capital_of.iter().enumerate() {
        let Some(capital) = *capital else {
            continue;
        };
        let hub = model.partition.center(settlements[capital].cell);
        let mut towns: Vec<usize> = (0..settlements.len())
            .filter(|&i| {
                settlements[i].territory == territory && settlements[i].role == SettlementRole::Town
            })
            .collect();
        towns.sort_by(|&a, &b| {
            let da = model.partition.center(settlements[a].cell).distance_sq(&hub);
            let db = model.partition.center(settlements[b].cell).distance_sq(&hub);
            da.total_cmp(&db).then(a.cmp(&b))
        });
        for town in towns.into_iter().take(road_density) {
            connect(town, capital, RoadImportance::Local, &mut roads);
        }
    }

    for border in political.borders() {
        let (a, b) = (&political.territories()[border.a], &political.territories()[border.b]);
        if a.landmass != b.landmass {
            continue;
        }
        if let (Some(from), Some(to)) = (capital_of[border.a], capital_of[border.b]) {
            connect(from, to, RoadImportance::Highway, &mut roads);
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "часть дорог не проложена");
    }
    tracing::info!(roads = roads.len(), "дороги проложены");
    roads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::grid_partition;

    fn flat_hydrology(n: usize) -> Hydrology {
        Hydrology::new(n)
    }

    #[test]
    fn path_avoids_the_sea() {
        let partition = grid_partition(10, 6, 1.0);
        // Морской залив посередине, проход по нижнему ряду
        let elevation: Vec<f32> = (0..partition.len())
            .map(|i| {
                let (col, row) = (i % 10, i / 10);
                if col == 5 && row < 5 { -100.0 } else { 100.0 }
            })
            .collect();
        let hydrology = flat_hydrology(partition.len());
        let model = CostModel {
            partition: &partition,
            terrain: elevation.as_slice(),
            hydrology: &hydrology,
        };
        let roaded = vec![false; partition.len()];

        let (path, cost) = model.find_path(2 * 10 + 1, 2 * 10 + 8, &roaded, partition.len()).unwrap();
        assert_eq!(path[0], 21);
        assert_eq!(*path.last().unwrap(), 28);
        assert!(cost > 0.0);
        assert!(path.iter().all(|&c| elevation[c] >= SEA_LEVEL));
        for pair in path.windows(2) {
            assert!(partition.neighbors(pair[0]).contains(&pair[1]));
        }
    }

    #[test]
    fn exhausted_budget_yields_no_road() {
        let partition = grid_partition(10, 6, 1.0);
        let elevation = vec![100.0_f32; partition.len()];
        let hydrology = flat_hydrology(partition.len());
        let model = CostModel {
            partition: &partition,
            terrain: elevation.as_slice(),
            hydrology: &hydrology,
        };
        let roaded = vec![false; partition.len()];
        assert!(model.find_path(0, 59, &roaded, 3).is_none());
        assert!(model.find_path(0, 59, &roaded, partition.len()).is_some());
    }

    #[test]
    fn existing_roads_are_cheaper() {
        let partition = grid_partition(6, 6, 1.0);
        let elevation = vec![100.0_f32; partition.len()];
        let hydrology = flat_hydrology(partition.len());
        let model = CostModel {
            partition: &partition,
            terrain: elevation.as_slice(),
            hydrology: &hydrology,
        };
        let mut roaded = vec![false; partition.len()];
        let plain = model.step_cost(7, 8, &roaded).unwrap();
        roaded[8] = true;
        let paved = model.step_cost(7, 8, &roaded).unwrap();
        assert!(paved < plain);
        assert!(model.step_cost(7, 8, &roaded).is_some());
    }

    #[test]
    fn unreachable_island_has_no_path() {
        let partition = grid_partition(8, 4, 1.0);
        let elevation: Vec<f32> = (0..partition.len())
            .map(|i| if i % 8 == 4 { -10.0 } else { 50.0 })
            .collect();
        let hydrology = flat_hydrology(partition.len());
        let model = CostModel {
            partition: &partition,
            terrain: elevation.as_slice(),
            hydrology: &hydrology,
        };
        let roaded = vec![false; partition.len()];
        assert!(model.find_path(8, 14, &roaded, partition.len()).is_none());
    }
}
