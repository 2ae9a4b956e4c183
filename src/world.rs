//! Конвейер генерации мира
//!
//! Этапы и их зависимости:
//! - точки → разбиение
//! - разбиение → рельеф → гидрология (эрозия меняет рельеф) → осадки
//! - рельеф (+ гидрология, осадки) → королевства → поселения → дороги
//!
//! Перегенерация точек перестраивает всё; перегенерация рельефа — всё, кроме
//! разбиения; перегенерация королевств — только королевства, поселения и дороги.
//! Новое состояние собирается в локальных переменных и подменяет старое только
//! после успеха всех этапов.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::climate::compute_precipitation;
use crate::config::{GenerationRequest, HeightmapSettings};
use crate::context::{RngStream, SeedContext};
use crate::error::GenerationError;
use crate::geometry::{Bounds, Point};
use crate::heightmap::{Terrain, TerrainNoise, land_probability, synthesize};
use crate::hydrology::Hydrology;
use crate::partition::Partition;
use crate::points::{SamplingPlan, sample_points};
use crate::political::Political;
use crate::roads::{CostModel, Road, build_roads};
use crate::settlement::{Settlement, SiteContext, place_settlements};

/// Этап генерации для отчёта о прогрессе
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Points,
    Terrain,
    Hydrology,
    Precipitation,
    Political,
    Settlements,
    Roads,
    Done,
}

impl Stage {
    /// Процент готовности к началу этапа
    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            Stage::Points => 0,
            Stage::Terrain => 15,
            Stage::Hydrology => 30,
            Stage::Precipitation => 55,
            Stage::Political => 65,
            Stage::Settlements => 80,
            Stage::Roads => 90,
            Stage::Done => 100,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stage::Points => "points",
            Stage::Terrain => "terrain",
            Stage::Hydrology => "hydrology",
            Stage::Precipitation => "precipitation",
            Stage::Political => "political",
            Stage::Settlements => "settlements",
            Stage::Roads => "roads",
            Stage::Done => "done",
        }
    }
}

/// Полная модель мира
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub request: GenerationRequest,
    pub partition: Partition,
    pub terrain: Terrain,
    pub hydrology: Hydrology,
    pub precipitation: Vec<f32>,
    pub political: Political,
    pub settlements: Vec<Settlement>,
    pub roads: Vec<Road>,
}

/// Результат этапов, зависящих от рельефа
struct Landscape {
    terrain: Terrain,
    hydrology: Hydrology,
    precipitation: Vec<f32>,
}

/// Королевства и всё, что от них зависит
struct Society {
    political: Political,
    settlements: Vec<Settlement>,
    roads: Vec<Road>,
}

/// Генерирует мир целиком.
pub fn generate(request: &GenerationRequest) -> Result<World, GenerationError> {
    generate_with_progress(request, |_, _| ControlFlow::Continue(()))
}

/// Генерирует мир, сообщая о начале каждого этапа. `ControlFlow::Break` из
/// обратного вызова прерывает генерацию с [`GenerationError::Cancelled`].
pub fn generate_with_progress(
    request: &GenerationRequest,
    mut progress: impl FnMut(Stage, u8) -> ControlFlow<()>,
) -> Result<World, GenerationError> {
    request.validate()?;
    let ctx = SeedContext::new(request.seed);
    let mut report = |stage: Stage| match progress(stage, stage.percent()) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => Err(GenerationError::Cancelled),
    };

    report(Stage::Points)?;
    let partition = build_partition(request, &ctx)?;
    let landscape = build_landscape(&partition, request, &ctx, &mut report)?;
    let society = build_society(&partition, &landscape, request, &ctx, &mut report)?;
    report(Stage::Done)?;

    let world = World {
        request: request.clone(),
        partition,
        terrain: landscape.terrain,
        hydrology: landscape.hydrology,
        precipitation: landscape.precipitation,
        political: society.political,
        settlements: society.settlements,
        roads: society.roads,
    };
    tracing::info!(
        seed = request.seed,
        cells = world.partition.len(),
        land = world.terrain.land_count(),
        rivers = world.hydrology.rivers().len(),
        lakes = world.hydrology.lakes().len(),
        territories = world.political.territories().len(),
        roads = world.roads.len(),
        "мир сгенерирован"
    );
    Ok(world)
}

/// Генерирует независимые миры; с фичей `parallel` — параллельно через rayon.
/// Каждая отдельная генерация остаётся однопоточной.
#[must_use]
pub fn generate_batch(requests: &[GenerationRequest]) -> Vec<Result<World, GenerationError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        requests.par_iter().map(generate).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        requests.iter().map(generate).collect()
    }
}

fn build_partition(request: &GenerationRequest, ctx: &SeedContext) -> Result<Partition, GenerationError> {
    let bounds = Bounds::new(request.width, request.height);
    let plan = SamplingPlan {
        bounds,
        count: request.cell_count,
        distribution: request.distribution,
        relax_iterations: request.relax_iterations,
    };
    let mut rng = ctx.rng(RngStream::Points);

    let points = if request.land_biased {
        let noise = TerrainNoise::new(&request.heightmap, ctx);
        let bias = |p: Point| land_probability(&noise, &request.heightmap, bounds, &p);
        sample_points(&plan, &mut rng, Some(&bias))?
    } else {
        sample_points(&plan, &mut rng, None)?
    };

    let partition = Partition::build(&points, bounds)?;
    tracing::info!(cells = partition.len(), distribution = ?request.distribution, "разбиение готово");
    Ok(partition)
}

fn build_landscape(
    partition: &Partition,
    request: &GenerationRequest,
    ctx: &SeedContext,
    report: &mut impl FnMut(Stage) -> Result<(), GenerationError>,
) -> Result<Landscape, GenerationError> {
    report(Stage::Terrain)?;
    let mut terrain = synthesize(partition, &request.heightmap, ctx);
    tracing::info!(land = terrain.land_count(), "рельеф готов");

    report(Stage::Hydrology)?;
    let hydrology = Hydrology::compute(partition, &mut terrain, &request.hydrology, ctx)?;

    report(Stage::Precipitation)?;
    let precipitation = compute_precipitation(partition, &terrain.elevation, &request.climate);

    Ok(Landscape {
        terrain,
        hydrology,
        precipitation,
    })
}

fn build_society(
    partition: &Partition,
    landscape: &Landscape,
    request: &GenerationRequest,
    ctx: &SeedContext,
    report: &mut impl FnMut(Stage) -> Result<(), GenerationError>,
) -> Result<Society, GenerationError> {
    report(Stage::Political)?;
    let political = Political::partition(
        partition,
        &landscape.terrain,
        request.kingdom_count,
        &request.political,
    );

    report(Stage::Settlements)?;
    let site = SiteContext {
        partition,
        terrain: &landscape.terrain,
        hydrology: &landscape.hydrology,
        precipitation: &landscape.precipitation,
        political: &political,
    };
    let settlements = place_settlements(&site, &request.settlements, &mut ctx.rng(RngStream::Settlements));

    report(Stage::Roads)?;
    let model = CostModel {
        partition,
        terrain: &landscape.terrain,
        hydrology: &landscape.hydrology,
    };
    let roads = build_roads(&model, &political, &settlements, request.road_density, &request.roads);

    Ok(Society {
        political,
        settlements,
        roads,
    })
}

fn no_progress(_: Stage) -> Result<(), GenerationError> {
    Ok(())
}

impl World {
    /// Новые точки: перестраивается всё.
    pub fn regenerate_points(&mut self, request: &GenerationRequest) -> Result<(), GenerationError> {
        *self = generate(request)?;
        Ok(())
    }

    /// Новый рельеф на прежнем разбиении; каскадом — гидрология, осадки, королевства, поселения, дороги.
    pub fn regenerate_terrain(&mut self, heightmap: HeightmapSettings) -> Result<(), GenerationError> {
        let request = GenerationRequest {
            heightmap,
            ..self.request.clone()
        };
        request.validate()?;
        let ctx = SeedContext::new(request.seed);
        let landscape = build_landscape(&self.partition, &request, &ctx, &mut no_progress)?;
        let society = build_society(&self.partition, &landscape, &request, &ctx, &mut no_progress)?;

        self.request = request;
        self.terrain = landscape.terrain;
        self.hydrology = landscape.hydrology;
        self.precipitation = landscape.precipitation;
        self.apply_society(society);
        Ok(())
    }

    /// Новое число королевств; рельеф и гидрология не меняются.
    pub fn regenerate_kingdoms(&mut self, kingdom_count: usize) -> Result<(), GenerationError> {
        let request = GenerationRequest {
            kingdom_count,
            ..self.request.clone()
        };
        request.validate()?;
        let ctx = SeedContext::new(request.seed);
        let landscape = Landscape {
            terrain: std::mem::take(&mut self.terrain),
            hydrology: std::mem::replace(&mut self.hydrology, Hydrology::new(0)),
            precipitation: std::mem::take(&mut self.precipitation),
        };
        let society = build_society(&self.partition, &landscape, &request, &ctx, &mut no_progress);

        self.terrain = landscape.terrain;
        self.hydrology = landscape.hydrology;
        self.precipitation = landscape.precipitation;
        self.request = request;
        self.apply_society(society?);
        Ok(())
    }

    fn apply_society(&mut self, society: Society) {
        self.political = society.political;
        self.settlements = society.settlements;
        self.roads = society.roads;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_request(seed: u64) -> GenerationRequest {
        GenerationRequest {
            seed,
            cell_count: 600,
            width: 300.0,
            height: 200.0,
            ..GenerationRequest::default()
        }
    }

    #[test]
    fn progress_reports_every_stage_in_order() {
        let mut seen = Vec::new();
        let world = generate_with_progress(&small_request(2), |stage, percent| {
            seen.push((stage, percent));
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(world.partition.len(), 600);
        assert_eq!(seen.first(), Some(&(Stage::Points, 0)));
        assert_eq!(seen.last(), Some(&(Stage::Done, 100)));
        assert!(seen.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn cancellation_stops_generation() {
        let result = generate_with_progress(&small_request(2), |stage, _| {
            if stage == Stage::Hydrology {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(matches!(result, Err(GenerationError::Cancelled)));
    }

    #[test]
    fn invalid_request_fails_before_work() {
        let request = GenerationRequest {
            cell_count: 2,
            ..small_request(1)
        };
        let mut called = false;
        let result = generate_with_progress(&request, |_, _| {
            called = true;
            ControlFlow::Continue(())
        });
        assert!(matches!(result, Err(GenerationError::Config(_))));
        assert!(!called);
    }

    #[test]
    fn regenerating_kingdoms_keeps_the_landscape() {
        let mut world = generate(&small_request(4)).unwrap();
        let terrain = world.terrain.clone();
        world.regenerate_kingdoms(2).unwrap();
        assert_eq!(world.terrain, terrain);
        assert_eq!(world.request.kingdom_count, 2);
        assert!(world.political.territories().len() <= 2);
    }

    #[test]
    fn failed_regeneration_leaves_world_untouched() {
        let mut world = generate(&small_request(4)).unwrap();
        let before = world.political.territories().to_vec();
        assert!(world.regenerate_kingdoms(0).is_err());
        assert_eq!(world.political.territories(), before.as_slice());
        assert_eq!(world.request.kingdom_count, small_request(4).kingdom_count);

        let bad = HeightmapSettings {
            sea_level: 1.5,
            ..HeightmapSettings::default()
        };
        let terrain = world.terrain.clone();
        assert!(world.regenerate_terrain(bad).is_err());
        assert_eq!(world.terrain, terrain);
    }

    #[test]
    fn batch_matches_sequential_generation() {
        let requests = [small_request(10), small_request(11)];
        let batch = generate_batch(&requests);
        assert_eq!(batch.len(), 2);
        for (request, result) in requests.iter().zip(batch) {
            let world = result.unwrap();
            let single = generate(request).unwrap();
            assert_eq!(world.terrain, single.terrain);
        }
    }
}
