//! Поиск озёр в бессточных котловинах
//!
//! Котловина растёт от локального минимума, каждый раз принимая самую низкую
//! ячейку обода. Уровень воды — максимум принятых высот; ячейка, последней
//! поднявшая уровень, — порог. Как только самая низкая ячейка обода оказывается
//! ниже уровня, вода переливается через порог, и порог становится стоком озера.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::config::HydrologySettings;
use crate::heightmap::SEA_LEVEL;
use crate::hydrology::fill::FloatOrd;
use crate::hydrology::flow::drainage_path;
use crate::partition::AdjacencyProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lake {
    pub cells: Vec<usize>,
    /// Уровень воды: высота порога
    pub spill_elevation: f32,
    /// Ячейка порога, через которую озеро сбрасывает воду
    pub outlet: usize,
    pub depth: f32,
}

/// Почему котловина не стала озером
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TouchesOcean,
    TouchesBoundary,
    TouchesLake,
    TooHigh,
    TooLarge,
    TooShallow,
    Islands,
    NoOutlet,
    Cycle,
}

/// Метки ячеек с «поколением»: не нужно очищать массивы между котловинами.
struct Stamps {
    basin: Vec<u32>,
    rim: Vec<u32>,
    lake: Vec<u32>,
    generation: u32,
}

impl Stamps {
    fn new(n: usize) -> Self {
        Self {
            basin: vec![0; n],
            rim: vec![0; n],
            lake: vec![0; n],
            generation: 0,
        }
    }

    fn next(&mut self) {
        self.generation += 1;
    }
}

struct Basin {
    cells: Vec<usize>,
    level: f32,
    pass: usize,
    rim: Vec<usize>,
}

/// Находит озёра, перенаправляя сток их ячеек в сток озера.
///
/// `lake_of` заполняется индексами принятых озёр. Принятие озера проверяет,
/// что новый сток не образует цикла; иначе изменения откатываются.
pub fn detect_lakes(
    adjacency: &impl AdjacencyProvider,
    elevation: &[f32],
    filled: &[f32],
    drainage: &mut [Option<usize>],
    lake_of: &mut [Option<usize>],
    settings: &HydrologySettings,
) -> Vec<Lake> {
    let n = adjacency.cell_count();
    let mut pits: Vec<usize> = (0..n)
        .filter(|&cell| is_pit(adjacency, elevation, cell))
        .collect();
    pits.sort_by(|&a, &b| elevation[a].total_cmp(&elevation[b]).then(a.cmp(&b)));

    let mut lakes = Vec::new();
    let mut stamps = Stamps::new(n);
    let mut rejected = 0_usize;

    for pit in pits {
        if lakes.len() >= settings.max_lakes {
            break;
        }
        if lake_of[pit].is_some() {
            continue;
        }
        stamps.next();

        let outcome = grow_basin(adjacency, elevation, lake_of, settings, &mut stamps, pit)
            .and_then(|basin| {
                accept(
                    adjacency, elevation, filled, drainage, settings, &mut stamps, pit, basin,
                )
            });

        match outcome {
            Ok(lake) => {
                let index = lakes.len();
                for &cell in &lake.cells {
                    lake_of[cell] = Some(index);
                }
                lakes.push(lake);
            }
            Err(reason) => {
                rejected += 1;
                tracing::trace!(pit, ?reason, "котловина отклонена");
            }
        }
    }

    tracing::debug!(lakes = lakes.len(), rejected, "озёра");
    lakes
}

/// Локальный минимум суши вне края области (равные высоты разбиваются по индексу)
fn is_pit(adjacency: &impl AdjacencyProvider, elevation: &[f32], cell: usize) -> bool {
    elevation[cell] >= SEA_LEVEL
        && !adjacency.is_boundary(cell)
        && adjacency.neighbors(cell).iter().all(|&n| {
            elevation[cell] < elevation[n] || (elevation[cell] == elevation[n] && cell < n)
        })
}

fn grow_basin(
    adjacency: &impl AdjacencyProvider,
    elevation: &[f32],
    lake_of: &[Option<usize>],
    settings: &HydrologySettings,
    stamps: &mut Stamps,
    pit: usize,
) -> Result<Basin, Rejection> {
    let generation = stamps.generation;
    let mut cells = vec![pit];
    let mut rim_cells = Vec::new();
    let mut level = elevation[pit];
    let mut pass = None;
    let mut heap: BinaryHeap<Reverse<(FloatOrd, usize)>> = BinaryHeap::new();

    stamps.basin[pit] = generation;
    stamps.rim[pit] = generation;
    for &n in adjacency.neighbors(pit) {
        stamps.rim[n] = generation;
        rim_cells.push(n);
        heap.push(Reverse((FloatOrd(elevation[n]), n)));
    }

    // Каждая итерация принимает новую ячейку, а их не больше `lake_max_cells + 1`
    while let Some(Reverse((FloatOrd(height), cell))) = heap.pop() {
        if height < SEA_LEVEL {
            return Err(Rejection::TouchesOcean);
        }
        if lake_of[cell].is_some() {
            return Err(Rejection::TouchesLake);
        }
        if height < level {
            // Перелив через порог
            let pass = pass.ok_or(Rejection::NoOutlet)?;
            rim_cells.retain(|&c| stamps.basin[c] != generation);
            return Ok(Basin {
                cells,
                level,
                pass,
                rim: rim_cells,
            });
        }

        if adjacency.is_boundary(cell) {
            return Err(Rejection::TouchesBoundary);
        }
        if height - elevation[pit] > settings.lake_max_rise {
            return Err(Rejection::TooHigh);
        }
        if cells.len() > settings.lake_max_cells {
            return Err(Rejection::TooLarge);
        }

        stamps.basin[cell] = generation;
        cells.push(cell);
        level = height;
        pass = Some(cell);

        for &n in adjacency.neighbors(cell) {
            if stamps.rim[n] != generation {
                stamps.rim[n] = generation;
                rim_cells.push(n);
                heap.push(Reverse((FloatOrd(elevation[n]), n)));
            }
        }
    }

    Err(Rejection::NoOutlet)
}

#[allow(clippy::too_many_arguments)]
fn accept(
    adjacency: &impl AdjacencyProvider,
    elevation: &[f32],
    filled: &[f32],
    drainage: &mut [Option<usize>],
    settings: &HydrologySettings,
    stamps: &mut Stamps,
    pit: usize,
    basin: Basin,
) -> Result<Lake, Rejection> {
    let generation = stamps.generation;
    let Basin {
        cells,
        level,
        pass,
        rim,
    } = basin;

    let lake_cells: Vec<usize> = cells
        .into_iter()
        .filter(|&c| c != pass && elevation[c] < level)
        .collect();
    let depth = level - elevation[pit];
    if lake_cells.is_empty() || depth < settings.lake_min_depth {
        return Err(Rejection::TooShallow);
    }
    for &cell in &lake_cells {
        stamps.lake[cell] = generation;
    }

    let touches_ocean = lake_cells
        .iter()
        .chain(std::iter::once(&pass))
        .flat_map(|&c| adjacency.neighbors(c))
        .any(|&n| elevation[n] < SEA_LEVEL);
    if touches_ocean {
        return Err(Rejection::TouchesOcean);
    }

    // Островок: ячейка обода, все соседи которой под водой
    let islands = rim
        .iter()
        .filter(|&&c| stamps.lake[c] != generation)
        .filter(|&&c| {
            adjacency
                .neighbors(c)
                .iter()
                .all(|&n| stamps.lake[n] == generation)
        })
        .count();
    if islands > settings.island_tolerance {
        return Err(Rejection::Islands);
    }

    let outflow = adjacency
        .neighbors(pass)
        .iter()
        .copied()
        .filter(|&n| stamps.lake[n] != generation)
        .min_by(|&a, &b| filled[a].total_cmp(&filled[b]).then(a.cmp(&b)))
        .ok_or(Rejection::NoOutlet)?;

    let backup: Vec<(usize, Option<usize>)> = lake_cells
        .iter()
        .chain(std::iter::once(&pass))
        .map(|&c| (c, drainage[c]))
        .collect();
    for &cell in &lake_cells {
        drainage[cell] = Some(pass);
    }
    drainage[pass] = Some(outflow);

    // Все новые рёбра ведут в порог: цикл возможен только через него
    let path = drainage_path(drainage, pass);
    let closed = path.last().is_some_and(|&c| drainage[c].is_none());
    let revisits = path[1..]
        .iter()
        .any(|&c| c == pass || stamps.lake[c] == generation);
    if !closed || revisits {
        for (cell, previous) in backup {
            drainage[cell] = previous;
        }
        return Err(Rejection::Cycle);
    }

    Ok(Lake {
        cells: lake_cells,
        spill_elevation: level,
        outlet: pass,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::fill::priority_flood;
    use crate::hydrology::flow::{compute_drainage, drainage_is_acyclic};
    use crate::partition::{Partition, grid_partition};

    const COLS: usize = 9;

    fn cell(col: usize, row: usize) -> usize {
        row * COLS + col
    }

    fn run(partition: &Partition, elevation: &[f32]) -> (Vec<Lake>, Vec<Option<usize>>) {
        let filled = priority_flood(partition, elevation);
        let mut drainage = compute_drainage(partition, elevation, &filled);
        let mut lake_of = vec![None; partition.len()];
        let lakes = detect_lakes(
            partition,
            elevation,
            &filled,
            &mut drainage,
            &mut lake_of,
            &HydrologySettings::default(),
        );
        (lakes, drainage)
    }

    #[test]
    fn enclosed_basin_becomes_a_lake() {
        let partition = grid_partition(COLS, COLS, 1.0);
        let mut elevation = vec![500.0_f32; partition.len()];
        elevation[cell(4, 4)] = 100.0;
        elevation[cell(5, 4)] = 200.0;
        elevation[cell(6, 4)] = 150.0;
        elevation[cell(7, 4)] = 120.0;
        elevation[cell(8, 4)] = 110.0;

        let (lakes, drainage) = run(&partition, &elevation);
        assert_eq!(lakes.len(), 1);
        let lake = &lakes[0];
        assert_eq!(lake.cells, vec![cell(4, 4)]);
        assert_eq!(lake.outlet, cell(5, 4));
        assert!((lake.spill_elevation - 200.0).abs() < f32::EPSILON);
        assert!((lake.depth - 100.0).abs() < f32::EPSILON);
        assert_eq!(drainage[cell(4, 4)], Some(cell(5, 4)));
        assert_eq!(drainage[cell(5, 4)], Some(cell(6, 4)));
        assert!(drainage_is_acyclic(&drainage));
    }

    #[test]
    fn basin_spilling_into_the_ocean_is_not_a_lake() {
        let partition = grid_partition(COLS, COLS, 1.0);
        let mut elevation = vec![500.0_f32; partition.len()];
        for row in 0..COLS {
            elevation[cell(0, row)] = -100.0;
        }
        // Самая низкая ячейка обода соседствует с морем
        elevation[cell(1, 4)] = 200.0;
        elevation[cell(2, 4)] = 100.0;

        let (lakes, drainage) = run(&partition, &elevation);
        assert!(lakes.is_empty());
        assert!(drainage_is_acyclic(&drainage));
    }

    #[test]
    fn shallow_basins_are_rejected() {
        let partition = grid_partition(COLS, COLS, 1.0);
        let mut elevation = vec![500.0_f32; partition.len()];
        elevation[cell(4, 4)] = 498.0;
        let (lakes, _) = run(&partition, &elevation);
        assert!(lakes.is_empty());
    }
}
