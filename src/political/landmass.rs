//! Массивы суши и распределение королевств между ними

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::heightmap::ElevationSource;
use crate::partition::{AdjacencyProvider, Partition};

/// Связная компонента ячеек суши
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmass {
    pub id: usize,
    pub cells: Vec<usize>,
    pub area: f64,
    /// Центр масс по площадям ячеек
    pub centroid: Point,
    /// Крупный массив получает собственные столицы
    pub major: bool,
}

/// BFS по смежности суши. Возвращает массивы и номер массива для каждой ячейки.
pub fn find_landmasses<E: ElevationSource + ?Sized>(
    partition: &Partition,
    terrain: &E,
) -> (Vec<Landmass>, Vec<Option<usize>>) {
    let n = partition.len();
    let mut landmass_of: Vec<Option<usize>> = vec![None; n];
    let mut landmasses = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..n {
        if !terrain.is_land(start) || landmass_of[start].is_some() {
            continue;
        }
        let id = landmasses.len();
        landmass_of[start] = Some(id);
        queue.push_back(start);
        let mut cells = Vec::new();

        while let Some(cell) = queue.pop_front() {
            cells.push(cell);
            for &next in partition.neighbors(cell) {
                if terrain.is_land(next) && landmass_of[next].is_none() {
                    landmass_of[next] = Some(id);
                    queue.push_back(next);
                }
            }
        }

        let (area, centroid) = weighted_centroid(partition, &cells);
        landmasses.push(Landmass {
            id,
            cells,
            area,
            centroid,
            major: false,
        });
    }

    (landmasses, landmass_of)
}

/// Площадь и центр масс набора ячеек
#[must_use]
pub fn weighted_centroid(partition: &Partition, cells: &[usize]) -> (f64, Point) {
    let mut area = 0.0;
    let (mut sx, mut sy) = (0.0, 0.0);
    for &cell in cells {
        let a = partition.area(cell);
        let c = partition.center(cell);
        area += a;
        sx += c.x * a;
        sy += c.y * a;
    }
    if area > 0.0 {
        (area, Point::new(sx / area, sy / area))
    } else {
        (area, Point::default())
    }
}

/// Отмечает крупные массивы и делит между ними `kingdom_count` столиц.
///
/// Крупный — доля площади суши не меньше `min_share`; если таких нет, крупным
/// считается самый большой. Если крупных больше, чем королевств, мелкие из них
/// понижаются. Каждый крупный получает хотя бы одну столицу, остаток делится
/// пропорционально площади методом наибольших остатков.
pub fn allocate_kingdoms(
    landmasses: &mut [Landmass],
    kingdom_count: usize,
    min_share: f32,
) -> Vec<usize> {
    let mut quotas = vec![0; landmasses.len()];
    let total: f64 = landmasses.iter().map(|l| l.area).sum();
    if landmasses.is_empty() || kingdom_count == 0 || total <= 0.0 {
        return quotas;
    }

    let mut by_size: Vec<usize> = (0..landmasses.len()).collect();
    by_size.sort_by(|&a, &b| {
        landmasses[b]
            .area
            .total_cmp(&landmasses[a].area)
            .then(a.cmp(&b))
    });

    for (rank, &id) in by_size.iter().enumerate() {
        let share = landmasses[id].area / total;
        landmasses[id].major = rank < kingdom_count && (rank == 0 || share >= f64::from(min_share));
    }

    let majors: Vec<usize> = by_size
        .iter()
        .copied()
        .filter(|&id| landmasses[id].major)
        .collect();
    let major_area: f64 = majors.iter().map(|&id| landmasses[id].area).sum();
    let extra = kingdom_count - majors.len();

    let mut remainders = Vec::with_capacity(majors.len());
    let mut assigned = 0;
    for &id in &majors {
        let exact = extra as f64 * landmasses[id].area / major_area;
        let whole = exact.floor() as usize;
        quotas[id] = 1 + whole;
        assigned += whole;
        remainders.push((exact - whole as f64, id));
    }
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, id) in remainders.iter().take(extra.saturating_sub(assigned)) {
        quotas[id] += 1;
    }

    // Столиц не больше, чем ячеек
    for &id in &majors {
        quotas[id] = quotas[id].min(landmasses[id].cells.len());
    }
    quotas
}
