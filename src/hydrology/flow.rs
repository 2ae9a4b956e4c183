//! Направления стока и накопление потока

use crate::heightmap::SEA_LEVEL;
use crate::partition::AdjacencyProvider;

/// Сток каждой ячейки: сосед с наименьшей заполненной высотой, если он строго ниже.
///
/// `None` — сток за пределы сети: море или ячейка края без более низкого соседа.
/// При равенстве выбирается сосед с меньшим индексом.
#[must_use]
pub fn compute_drainage(
    adjacency: &impl AdjacencyProvider,
    elevation: &[f32],
    filled: &[f32],
) -> Vec<Option<usize>> {
    (0..adjacency.cell_count())
        .map(|cell| {
            if elevation[cell] < SEA_LEVEL {
                return None;
            }
            adjacency
                .neighbors(cell)
                .iter()
                .copied()
                .min_by(|&a, &b| filled[a].total_cmp(&filled[b]).then(a.cmp(&b)))
                .filter(|&lowest| filled[lowest] < filled[cell])
        })
        .collect()
}

/// Накопление: по единице с каждой клетки суши, обход по убыванию заполненной высоты.
///
/// Сток ведёт строго вниз, поэтому к моменту обработки ячейки весь её приток уже собран.
#[must_use]
pub fn accumulate_flow(elevation: &[f32], filled: &[f32], drainage: &[Option<usize>]) -> Vec<f32> {
    let mut flow: Vec<f32> = elevation
        .iter()
        .map(|&e| if e >= SEA_LEVEL { 1.0 } else { 0.0 })
        .collect();

    let mut order: Vec<usize> = (0..elevation.len())
        .filter(|&cell| elevation[cell] >= SEA_LEVEL)
        .collect();
    order.sort_by(|&a, &b| filled[b].total_cmp(&filled[a]).then(a.cmp(&b)));

    for cell in order {
        if let Some(target) = drainage[cell] {
            flow[target] += flow[cell];
        }
    }
    flow
}

/// Накопление по произвольному ациклическому стоку (обход Кана по числу притоков).
///
/// Нужно после озёр: перенаправленный к порогу сток уже не обязан вести вниз
/// по заполненным высотам.
#[must_use]
pub fn accumulate_topological(elevation: &[f32], drainage: &[Option<usize>]) -> Vec<f32> {
    let mut flow: Vec<f32> = elevation
        .iter()
        .map(|&e| if e >= SEA_LEVEL { 1.0 } else { 0.0 })
        .collect();

    let mut inflows = vec![0_usize; drainage.len()];
    for target in drainage.iter().flatten() {
        inflows[*target] += 1;
    }
    let mut ready: Vec<usize> = (0..drainage.len()).filter(|&c| inflows[c] == 0).collect();
    while let Some(cell) = ready.pop() {
        if let Some(target) = drainage[cell] {
            flow[target] += flow[cell];
            inflows[target] -= 1;
            if inflows[target] == 0 {
                ready.push(target);
            }
        }
    }
    flow
}

/// Проверяет, что из каждой ячейки сток доходит до `None`, не повторяя ячеек.
#[must_use]
pub fn drainage_is_acyclic(drainage: &[Option<usize>]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Fresh,
        Active,
        Done,
    }

    let mut marks = vec![Mark::Fresh; drainage.len()];
    let mut path = Vec::new();

    for start in 0..drainage.len() {
        if marks[start] != Mark::Fresh {
            continue;
        }
        let mut current = Some(start);
        while let Some(cell) = current {
            match marks[cell] {
                Mark::Done => break,
                Mark::Active => return false,
                Mark::Fresh => {
                    marks[cell] = Mark::Active;
                    path.push(cell);
                    current = drainage[cell];
                }
            }
        }
        for cell in path.drain(..) {
            marks[cell] = Mark::Done;
        }
    }
    true
}

/// Путь стока от ячейки до выхода из сети (не длиннее числа ячеек).
#[must_use]
pub fn drainage_path(drainage: &[Option<usize>], start: usize) -> Vec<usize> {
    let mut path = vec![start];
    let mut current = start;
    for _ in 0..drainage.len() {
        match drainage[current] {
            Some(next) => {
                path.push(next);
                current = next;
            }
            None => break,
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::fill::priority_flood;
    use crate::partition::grid_partition;

    #[test]
    fn drainage_follows_filled_surface_to_the_sea() {
        let partition = grid_partition(12, 6, 1.0);
        // Наклон к западу, западный столбец — море
        let elevation: Vec<f32> = (0..partition.len())
            .map(|i| {
                let col = i % 12;
                if col == 0 { -50.0 } else { col as f32 * 100.0 }
            })
            .collect();
        let filled = priority_flood(&partition, &elevation);
        let drainage = compute_drainage(&partition, &elevation, &filled);

        assert!(drainage_is_acyclic(&drainage));
        for cell in 0..partition.len() {
            let path = drainage_path(&drainage, cell);
            assert!(path.len() <= partition.len());
            let last = *path.last().unwrap();
            assert!(elevation[last] < SEA_LEVEL || partition.is_boundary(last));
        }
    }

    #[test]
    fn flow_sums_upstream_cells() {
        // Цепочка 0 -> 1 -> 2 -> море(3)
        let elevation = [30.0, 20.0, 10.0, -5.0];
        let filled = elevation;
        let drainage = [Some(1), Some(2), Some(3), None];
        let flow = accumulate_flow(&elevation, &filled, &drainage);
        assert_eq!(flow, vec![1.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn redirected_drainage_still_sums_upstream_cells() {
        // Ячейка 0 ниже ячейки 1, но сток перенаправлен вверх к порогу 1
        let elevation = [10.0, 20.0, 15.0, -5.0];
        let drainage = [Some(1), Some(2), Some(3), None];
        let flow = accumulate_topological(&elevation, &drainage);
        assert_eq!(flow, vec![1.0, 2.0, 3.0, 3.0]);

        let filled = [30.0, 20.0, 10.0, -5.0];
        assert_eq!(flow, accumulate_flow(&elevation, &filled, &drainage));
    }

    #[test]
    fn cycles_are_detected() {
        assert!(drainage_is_acyclic(&[Some(1), None, Some(1)]));
        assert!(!drainage_is_acyclic(&[Some(1), Some(2), Some(0)]));
        assert!(!drainage_is_acyclic(&[None, Some(1)]));
    }
}
