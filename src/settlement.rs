//! Размещение поселений
//!
//! В каждом королевстве есть столица (её ячейка выбрана политическим делением)
//! и обычные поселения. Кандидаты — ячейки королевства вне рек и озёр; оценка
//! складывается из близости к воде, высотного пояса, центральности и осадков.
//! Выбор жадный по убыванию оценки с жёстким минимальным расстоянием до уже
//! поставленных поселений.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::SettlementSettings;
use crate::heightmap::{ElevationSource, MAX_HEIGHT, SEA_LEVEL};
use crate::hydrology::Hydrology;
use crate::partition::{AdjacencyProvider, Partition};
use crate::political::{Political, Territory};

/// Сколько ячеек королевства приходится на одно поселение при плотности 1
pub const CELLS_PER_SETTLEMENT: f32 = 40.0;

const COAST_BONUS: f32 = 0.3;
const RIVER_BONUS: f32 = 0.35;
const LAKE_BONUS: f32 = 0.15;
const CENTRALITY_WEIGHT: f32 = 0.25;
const FERTILITY_WEIGHT: f32 = 0.1;
const MAX_JITTER: f32 = 0.05;
/// Вес столицы при делении населения, в долях лучшей оценки
const CAPITAL_WEIGHT: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementRole {
    Capital,
    Town,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub cell: usize,
    pub territory: usize,
    pub role: SettlementRole,
    /// Доля населения королевства
    pub population: f32,
    pub score: f32,
}

/// Всё, что нужно для оценки места
pub struct SiteContext<'a, E: ElevationSource + ?Sized> {
    pub partition: &'a Partition,
    pub terrain: &'a E,
    pub hydrology: &'a Hydrology,
    pub precipitation: &'a [f32],
    pub political: &'a Political,
}

impl<E: ElevationSource + ?Sized> SiteContext<'_, E> {
    /// Пригодность ячейки для поселения; `None` для непригодных.
    #[must_use]
    pub fn score(&self, cell: usize, territory: &Territory, reach: f64) -> Option<f32> {
        if !self.terrain.is_land(cell)
            || cell == territory.capital
            || self.hydrology.is_river(cell)
            || self.hydrology.lake_of(cell).is_some()
        {
            return None;
        }

        let neighbors = self.partition.neighbors(cell);
        let mut score = 0.0;
        if neighbors.iter().any(|&n| !self.terrain.is_land(n)) {
            score += COAST_BONUS;
        }
        if neighbors.iter().any(|&n| self.hydrology.is_river(n)) {
            score += RIVER_BONUS;
        }
        if neighbors.iter().any(|&n| self.hydrology.lake_of(n).is_some()) {
            score += LAKE_BONUS;
        }

        score += elevation_suitability(self.terrain.elevation(cell));

        let distance = self.partition.center(cell).distance(&territory.centroid);
        let centrality = if reach > 0.0 {
            (1.0 - distance / reach).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        score += CENTRALITY_WEIGHT * centrality;
        score += FERTILITY_WEIGHT * self.precipitation.get(cell).copied().unwrap_or(0.0);
        Some(score)
    }
}

/// Высотный пояс: лучше всего низины и холмы, горы штрафуются.
#[must_use]
pub fn elevation_suitability(elevation: f32) -> f32 {
    let h = (elevation - SEA_LEVEL) / MAX_HEIGHT;
    match h {
        h if h < 0.03 => 0.15,
        h if h < 0.3 => 0.3,
        h if h < 0.6 => 0.1,
        _ => -0.4,
    }
}

/// Ставит по столице на королевство и обычные поселения по плотности.
pub fn place_settlements<E: ElevationSource + ?Sized>(
    ctx: &SiteContext<'_, E>,
    settings: &SettlementSettings,
    rng: &mut ChaCha8Rng,
) -> Vec<Settlement> {
    let territories = ctx.political.territories();
    let min_distance = settings.min_separation * ctx.partition.mean_spacing();

    let mut settlements: Vec<Settlement> = territories
        .iter()
        .map(|t| Settlement {
            cell: t.capital,
            territory: t.id,
            role: SettlementRole::Capital,
            population: 1.0,
            score: 0.0,
        })
        .collect();

    for territory in territories {
        let target = (territory.cells.len() as f32 * settings.density / CELLS_PER_SETTLEMENT).floor()
            as usize;
        if target == 0 {
            continue;
        }

        let reach = territory
            .cells
            .iter()
            .map(|&c| ctx.partition.center(c).distance(&territory.centroid))
            .fold(0.0, f64::max);
        let mut candidates: Vec<(f32, usize)> = territory
            .cells
            .iter()
            .filter_map(|&cell| {
                ctx.score(cell, territory, reach)
                    .map(|s| (s + rng.gen_range(0.0..MAX_JITTER), cell))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut placed = 0;
        for (score, cell) in candidates {
            if placed >= target {
                break;
            }
            let at = ctx.partition.center(cell);
            let crowded = settlements
                .iter()
                .any(|s| ctx.partition.center(s.cell).distance(&at) < min_distance);
            if crowded {
                continue;
            }
            settlements.push(Settlement {
                cell,
                territory: territory.id,
                role: SettlementRole::Town,
                population: 0.0,
                score,
            });
            placed += 1;
        }
    }

    assign_population(&mut settlements, territories.len());
    tracing::info!(settlements = settlements.len(), "поселения размещены");
    settlements
}

/// Доли населения внутри каждого королевства; столица весит больше лучшего города.
fn assign_population(settlements: &mut [Settlement], territories: usize) {
    let mut best = vec![0.0_f32; territories];
    for s in settlements.iter().filter(|s| s.role == SettlementRole::Town) {
        best[s.territory] = best[s.territory].max(s.score);
    }

    let weight = |s: &Settlement| match s.role {
        SettlementRole::Capital => CAPITAL_WEIGHT * best[s.territory].max(0.5),
        SettlementRole::Town => s.score.max(0.05),
    };

    let mut totals = vec![0.0_f32; territories];
    for s in settlements.iter() {
        totals[s.territory] += weight(s);
    }
    let weights: Vec<f32> = settlements.iter().map(weight).collect();
    for (s, w) in settlements.iter_mut().zip(weights) {
        s.population = w / totals[s.territory];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeightmapSettings, HydrologySettings, PoliticalSettings};
    use crate::context::{RngStream, SeedContext};
    use crate::heightmap::synthesize;
    use crate::partition::grid_partition;

    #[test]
    fn mountains_are_penalized() {
        assert!(elevation_suitability(500.0) > elevation_suitability(3500.0));
        assert!(elevation_suitability(3500.0) < 0.0);
    }

    #[test]
    fn settlements_respect_territories_and_spacing() {
        let partition = grid_partition(40, 25, 10.0);
        let ctx = SeedContext::new(31);
        let mut terrain = synthesize(&partition, &HeightmapSettings::default(), &ctx);
        let hydrology =
            Hydrology::compute(&partition, &mut terrain, &HydrologySettings::default(), &ctx)
                .unwrap();
        let precipitation = vec![0.5; partition.len()];
        let political = Political::partition(&partition, &terrain, 4, &PoliticalSettings::default());
        let site = SiteContext {
            partition: &partition,
            terrain: &terrain,
            hydrology: &hydrology,
            precipitation: &precipitation,
            political: &political,
        };
        let settings = SettlementSettings {
            density: 3.0,
            ..SettlementSettings::default()
        };
        let settlements = place_settlements(&site, &settings, &mut ctx.rng(RngStream::Settlements));

        let capitals = settlements
            .iter()
            .filter(|s| s.role == SettlementRole::Capital)
            .count();
        assert_eq!(capitals, political.territories().len());

        let min_distance = settings.min_separation * partition.mean_spacing();
        for (i, s) in settlements.iter().enumerate() {
            assert_eq!(political.territory_of(s.cell), Some(s.territory));
            if s.role == SettlementRole::Town {
                assert!(!hydrology.is_river(s.cell));
                assert!(hydrology.lake_of(s.cell).is_none());
                for other in &settlements[..i] {
                    let d = partition.center(s.cell).distance(&partition.center(other.cell));
                    assert!(d >= min_distance);
                }
            }
        }

        for territory in political.territories() {
            let share: f32 = settlements
                .iter()
                .filter(|s| s.territory == territory.id)
                .map(|s| s.population)
                .sum();
            assert!((share - 1.0).abs() < 1e-4);
        }
    }
}
