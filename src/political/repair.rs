//! Устранение эксклавов
//!
//! Основное тело королевства — компонента его ячеек, связная со столицей.
//! Каждая оторванная компонента передаётся тому *другому* королевству, с которым
//! у неё больше всего соседних пар ячеек. Компонента без соседей-королевств
//! (отдельный остров) остаётся за своим королевством.

use std::collections::VecDeque;

use crate::partition::{AdjacencyProvider, Partition};
use crate::political::growth::Seat;

/// Возвращает число переданных ячеек. Проходов не больше числа королевств плюс один.
pub fn repair_exclaves(
    partition: &Partition,
    seats: &[Seat],
    territory_of: &mut [Option<usize>],
) -> usize {
    let n = partition.len();
    let mut moved = 0;
    let mut stamp = vec![usize::MAX; n];
    let mut generation = 0;

    for _ in 0..=seats.len() {
        let mut changed = false;

        for (id, seat) in seats.iter().enumerate() {
            // Основное тело: BFS от столицы по своим ячейкам
            generation += 1;
            let body = generation;
            let mut queue = VecDeque::from([seat.capital]);
            stamp[seat.capital] = body;
            while let Some(cell) = queue.pop_front() {
                for &next in partition.neighbors(cell) {
                    if territory_of[next] == Some(id) && stamp[next] != body {
                        stamp[next] = body;
                        queue.push_back(next);
                    }
                }
            }

            for start in 0..n {
                if territory_of[start] != Some(id) || stamp[start] == body {
                    continue;
                }
                generation += 1;
                let piece = generation;
                let component = collect_component(partition, territory_of, &mut stamp, start, id, piece);
                let Some(target) = dominant_neighbor(partition, territory_of, &component, id) else {
                    continue;
                };
                for &cell in &component {
                    territory_of[cell] = Some(target);
                }
                moved += component.len();
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    if moved > 0 {
        tracing::debug!(moved, "эксклавы переданы соседям");
    }
    moved
}

fn collect_component(
    partition: &Partition,
    territory_of: &[Option<usize>],
    stamp: &mut [usize],
    start: usize,
    owner: usize,
    mark: usize,
) -> Vec<usize> {
    let mut component = vec![start];
    let mut queue = VecDeque::from([start]);
    stamp[start] = mark;
    while let Some(cell) = queue.pop_front() {
        for &next in partition.neighbors(cell) {
            if territory_of[next] == Some(owner) && stamp[next] != mark {
                stamp[next] = mark;
                component.push(next);
                queue.push_back(next);
            }
        }
    }
    component
}

/// Другое королевство с наибольшим числом соседних пар (при равенстве — меньший номер)
fn dominant_neighbor(
    partition: &Partition,
    territory_of: &[Option<usize>],
    component: &[usize],
    owner: usize,
) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for &cell in component {
        for &next in partition.neighbors(cell) {
            let Some(other) = territory_of[next] else {
                continue;
            };
            if other == owner {
                continue;
            }
            match counts.iter_mut().find(|(t, _)| *t == other) {
                Some((_, count)) => *count += 1,
                None => counts.push((other, 1)),
            }
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(t, _)| t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::grid_partition;

    #[test]
    fn exclave_joins_the_surrounding_territory() {
        let partition = grid_partition(10, 6, 1.0);
        let n = partition.len();
        // Королевство 0 — левая половина, 1 — правая; одна ячейка 0 внутри 1
        let mut territory_of: Vec<Option<usize>> = (0..n)
            .map(|i| Some(usize::from(i % 10 >= 5)))
            .collect();
        let stray = 3 * 10 + 8;
        territory_of[stray] = Some(0);
        let seats = [
            Seat {
                capital: 2 * 10 + 2,
                landmass: 0,
            },
            Seat {
                capital: 2 * 10 + 7,
                landmass: 0,
            },
        ];

        let moved = repair_exclaves(&partition, &seats, &mut territory_of);
        assert_eq!(moved, 1);
        assert_eq!(territory_of[stray], Some(1));
    }

    #[test]
    fn isolated_island_keeps_its_owner() {
        let partition = grid_partition(10, 6, 1.0);
        let n = partition.len();
        let mut territory_of: Vec<Option<usize>> = vec![None; n];
        // Тело вокруг столицы и отдельный островок без соседей-королевств
        for cell in [0, 1, 10, 11] {
            territory_of[cell] = Some(0);
        }
        let island = 4 * 10 + 8;
        territory_of[island] = Some(0);
        let seats = [Seat {
            capital: 0,
            landmass: 0,
        }];

        assert_eq!(repair_exclaves(&partition, &seats, &mut territory_of), 0);
        assert_eq!(territory_of[island], Some(0));
    }
}
