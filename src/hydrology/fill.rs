//! Заполнение понижений (priority-flood)

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::heightmap::SEA_LEVEL;
use crate::partition::AdjacencyProvider;

/// Минимальный подъём на шаг: гарантирует строгий спуск к морю
pub const FILL_EPSILON: f32 = 0.01;

/// Обёртка для упорядочивания `f32` в куче
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FloatOrd(pub f32);

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Возвращает заполненные высоты.
///
/// Затравка — все морские ячейки и ячейки на краю области с собственной высотой.
/// Каждая ячейка фиксируется при первом попадании в кучу, поэтому извлечений ровно N.
/// Ячейки, недостижимые из затравки, сохраняют исходную высоту.
#[must_use]
pub fn priority_flood(adjacency: &impl AdjacencyProvider, elevation: &[f32]) -> Vec<f32> {
    let n = adjacency.cell_count();
    let mut filled = elevation.to_vec();
    let mut settled = vec![false; n];
    let mut heap: BinaryHeap<Reverse<(FloatOrd, usize)>> = BinaryHeap::with_capacity(n);

    for cell in 0..n {
        if elevation[cell] < SEA_LEVEL || adjacency.is_boundary(cell) {
            settled[cell] = true;
            heap.push(Reverse((FloatOrd(elevation[cell]), cell)));
        }
    }

    while let Some(Reverse((FloatOrd(level), cell))) = heap.pop() {
        for &next in adjacency.neighbors(cell) {
            if settled[next] {
                continue;
            }
            settled[next] = true;
            filled[next] = elevation[next].max(level + FILL_EPSILON);
            heap.push(Reverse((FloatOrd(filled[next]), next)));
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::grid_partition;

    #[test]
    fn pit_is_raised_above_its_rim() {
        let partition = grid_partition(7, 7, 1.0);
        let mut elevation = vec![100.0_f32; partition.len()];
        let pit = 3 * 7 + 3;
        elevation[pit] = 10.0;

        let filled = priority_flood(&partition, &elevation);
        assert!(filled[pit] > 100.0);
        for (cell, (&f, &e)) in filled.iter().zip(&elevation).enumerate() {
            assert!(f >= e, "cell {cell} was lowered");
        }
    }

    #[test]
    fn every_land_cell_has_a_strictly_lower_neighbor_or_is_a_seed() {
        let partition = grid_partition(10, 8, 1.0);
        let elevation: Vec<f32> = (0..partition.len())
            .map(|i| ((i * 7919) % 97) as f32 * 10.0)
            .collect();
        let filled = priority_flood(&partition, &elevation);
        for cell in 0..partition.len() {
            if partition.is_boundary(cell) {
                continue;
            }
            let lower = partition
                .neighbors(cell)
                .iter()
                .any(|&n| filled[n] < filled[cell]);
            assert!(lower, "cell {cell} is a closed basin");
        }
    }
}
