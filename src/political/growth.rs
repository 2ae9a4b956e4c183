//! Столицы и рост королевств
//!
//! Рост синхронный: на каждом шаге каждое королевство по очереди расширяется
//! ровно на один слой BFS. Ячейку забирает та волна, что дошла первой; при
//! равенстве слоя — королевство с меньшим номером.

use std::collections::VecDeque;

use crate::geometry::Point;
use crate::heightmap::ElevationSource;
use crate::partition::{AdjacencyProvider, Partition};
use crate::political::landmass::Landmass;

/// Столица и массив, на котором она стоит
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub capital: usize,
    pub landmass: usize,
}

/// Выбирает `quota` столиц на массиве: первая — ячейка, ближайшая к центру масс,
/// следующие — самые удалённые от уже выбранных.
#[must_use]
pub fn place_capitals(partition: &Partition, landmass: &Landmass, quota: usize) -> Vec<usize> {
    let mut capitals: Vec<usize> = Vec::with_capacity(quota);
    if quota == 0 || landmass.cells.is_empty() {
        return capitals;
    }

    let first = landmass
        .cells
        .iter()
        .copied()
        .min_by(|&a, &b| {
            partition
                .center(a)
                .distance_sq(&landmass.centroid)
                .total_cmp(&partition.center(b).distance_sq(&landmass.centroid))
                .then(a.cmp(&b))
        });
    let Some(first) = first else {
        return capitals;
    };
    capitals.push(first);

    let mut nearest: Vec<f64> = landmass
        .cells
        .iter()
        .map(|&c| partition.center(c).distance_sq(&partition.center(first)))
        .collect();

    while capitals.len() < quota.min(landmass.cells.len()) {
        let Some((slot, _)) = nearest
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        else {
            break;
        };
        let chosen = landmass.cells[slot];
        if capitals.contains(&chosen) {
            break;
        }
        capitals.push(chosen);
        let at = partition.center(chosen);
        for (d, &c) in nearest.iter_mut().zip(&landmass.cells) {
            *d = d.min(partition.center(c).distance_sq(&at));
        }
    }
    capitals
}

/// Синхронный BFS от всех столиц в пределах их массивов.
pub fn grow_territories(
    partition: &Partition,
    landmass_of: &[Option<usize>],
    seats: &[Seat],
    territory_of: &mut [Option<usize>],
) {
    let mut frontiers: Vec<Vec<usize>> = Vec::with_capacity(seats.len());
    for (id, seat) in seats.iter().enumerate() {
        territory_of[seat.capital] = Some(id);
        frontiers.push(vec![seat.capital]);
    }

    // Каждый непустой раунд забирает хотя бы одну ячейку
    while frontiers.iter().any(|f| !f.is_empty()) {
        for (id, seat) in seats.iter().enumerate() {
            let layer = std::mem::take(&mut frontiers[id]);
            let mut next = Vec::new();
            for cell in layer {
                for &n in partition.neighbors(cell) {
                    if territory_of[n].is_none() && landmass_of[n] == Some(seat.landmass) {
                        territory_of[n] = Some(id);
                        next.push(n);
                    }
                }
            }
            frontiers[id] = next;
        }
    }
}

/// Мелкие массивы целиком отходят королевству с ближайшей к их центру столицей.
pub fn assign_minor_landmasses(
    partition: &Partition,
    landmasses: &[Landmass],
    seats: &[Seat],
    territory_of: &mut [Option<usize>],
) {
    for landmass in landmasses.iter().filter(|l| !l.major) {
        let Some(owner) = nearest_seat(partition, seats, landmass.centroid) else {
            return;
        };
        for &cell in &landmass.cells {
            if territory_of[cell].is_none() {
                territory_of[cell] = Some(owner);
            }
        }
    }
}

/// Ограниченные проходы: ничейная суша берёт королевство большинства соседей;
/// оставшееся после проходов отходит ближайшей столице.
pub fn claim_leftovers<E: ElevationSource + ?Sized>(
    partition: &Partition,
    terrain: &E,
    seats: &[Seat],
    territory_of: &mut [Option<usize>],
) -> usize {
    if seats.is_empty() {
        return 0;
    }
    let mut pending: VecDeque<usize> = (0..partition.len())
        .filter(|&c| terrain.is_land(c) && territory_of[c].is_none())
        .collect();
    let leftovers = pending.len();

    for _ in 0..partition.len() {
        if pending.is_empty() {
            break;
        }
        let mut still = VecDeque::new();
        let mut changed = false;
        while let Some(cell) = pending.pop_front() {
            match majority_territory(partition.neighbors(cell), territory_of, None) {
                Some(owner) => {
                    territory_of[cell] = Some(owner);
                    changed = true;
                }
                None => still.push_back(cell),
            }
        }
        pending = still;
        if !changed {
            break;
        }
    }

    for cell in pending {
        territory_of[cell] = nearest_seat(partition, seats, partition.center(cell));
    }
    leftovers
}

/// Королевство, чаще всего встречающееся среди соседей (кроме `exclude`).
pub(crate) fn majority_territory(
    neighbors: &[usize],
    territory_of: &[Option<usize>],
    exclude: Option<usize>,
) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for owner in neighbors.iter().filter_map(|&n| territory_of[n]) {
        if Some(owner) == exclude {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| *t == owner) {
            Some((_, count)) => *count += 1,
            None => counts.push((owner, 1)),
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(t, _)| t)
}

fn nearest_seat(partition: &Partition, seats: &[Seat], at: Point) -> Option<usize> {
    seats
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            partition
                .center(a.capital)
                .distance_sq(&at)
                .total_cmp(&partition.center(b.capital).distance_sq(&at))
                .then(ia.cmp(ib))
        })
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::grid_partition;
    use crate::political::landmass::find_landmasses;

    #[test]
    fn capitals_spread_out() {
        let partition = grid_partition(20, 10, 1.0);
        let elevation = vec![10.0_f32; partition.len()];
        let (landmasses, _) = find_landmasses(&partition, elevation.as_slice());
        let capitals = place_capitals(&partition, &landmasses[0], 3);
        assert_eq!(capitals.len(), 3);

        let first = partition.center(capitals[0]);
        assert!((first.x - 10.0).abs() < 1.5 && (first.y - 5.0).abs() < 1.5);
        // Вторая столица — в дальнем углу
        let second = partition.center(capitals[1]);
        assert!(second.distance(&first) > 8.0);
    }

    #[test]
    fn growth_covers_the_landmass_without_overlap() {
        let partition = grid_partition(16, 8, 1.0);
        let elevation = vec![10.0_f32; partition.len()];
        let (landmasses, landmass_of) = find_landmasses(&partition, elevation.as_slice());
        let seats: Vec<Seat> = place_capitals(&partition, &landmasses[0], 4)
            .into_iter()
            .map(|capital| Seat {
                capital,
                landmass: 0,
            })
            .collect();

        let mut territory_of = vec![None; partition.len()];
        grow_territories(&partition, &landmass_of, &seats, &mut territory_of);
        assert!(territory_of.iter().all(Option::is_some));
        for (id, seat) in seats.iter().enumerate() {
            assert_eq!(territory_of[seat.capital], Some(id));
        }
    }

    #[test]
    fn majority_ignores_excluded_owner() {
        let territory_of = [Some(0), Some(1), Some(1), Some(2), None];
        assert_eq!(majority_territory(&[0, 1, 2, 3, 4], &territory_of, None), Some(1));
        assert_eq!(majority_territory(&[0, 1, 2, 3], &territory_of, Some(1)), Some(0));
        assert_eq!(majority_territory(&[4], &territory_of, None), None);
    }
}
