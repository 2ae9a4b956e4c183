//! Гидрология: понижения, сток, эрозия, реки, озёра
//!
//! Этапы выполняются строго по порядку, текущий этап хранится в [`Hydrology`]:
//!
//! `Raw → DepressionsFilled → DrainageComputed → FlowAccumulated → (Eroded) → RiversTraced → LakesDetected`
//!
//! Вызов этапа не по порядку — ошибка [`HydrologyError::OutOfOrder`]. Изменение
//! рельефа сбрасывает состояние в `Raw` через [`Hydrology::reset`].

pub mod erosion;
pub mod fill;
pub mod flow;
pub mod lakes;
pub mod rivers;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::HydrologySettings;
use crate::context::{RngStream, SeedContext};
use crate::error::HydrologyError;
use crate::heightmap::Terrain;
use crate::partition::{AdjacencyProvider, Partition};

pub use lakes::Lake;
pub use rivers::{River, RiverMouth};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HydrologyStage {
    Raw,
    DepressionsFilled,
    DrainageComputed,
    FlowAccumulated,
    Eroded,
    RiversTraced,
    LakesDetected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hydrology {
    stage: HydrologyStage,
    filled: Vec<f32>,
    drainage: Vec<Option<usize>>,
    flow: Vec<f32>,
    rivers: Vec<River>,
    river_of: Vec<Option<usize>>,
    lakes: Vec<Lake>,
    lake_of: Vec<Option<usize>>,
}

impl Hydrology {
    #[must_use]
    pub fn new(cells: usize) -> Self {
        Self {
            stage: HydrologyStage::Raw,
            filled: Vec::new(),
            drainage: Vec::new(),
            flow: Vec::new(),
            rivers: Vec::new(),
            river_of: vec![None; cells],
            lakes: Vec::new(),
            lake_of: vec![None; cells],
        }
    }

    /// Полный цикл по готовому рельефу. Эрозия (если включена) меняет `terrain`.
    pub fn compute(
        partition: &Partition,
        terrain: &mut Terrain,
        settings: &HydrologySettings,
        ctx: &SeedContext,
    ) -> Result<Self, HydrologyError> {
        let mut hydrology = Self::new(partition.len());
        hydrology.fill_depressions(partition, &terrain.elevation)?;
        hydrology.compute_drainage(partition, &terrain.elevation)?;
        hydrology.accumulate_flow(&terrain.elevation)?;
        if settings.erosion {
            hydrology.erode(partition, &mut terrain.elevation, settings)?;
        }
        let mut rng = ctx.rng(RngStream::Rivers);
        hydrology.trace_rivers(partition, &terrain.elevation, settings, &mut rng)?;
        hydrology.detect_lakes(partition, &terrain.elevation, settings)?;

        tracing::info!(
            rivers = hydrology.rivers.len(),
            lakes = hydrology.lakes.len(),
            "гидрология рассчитана"
        );
        Ok(hydrology)
    }

    #[must_use]
    pub fn stage(&self) -> HydrologyStage {
        self.stage
    }

    /// Сбрасывает всё к `Raw`: вызывается при любом изменении рельефа.
    pub fn reset(&mut self) {
        *self = Self::new(self.lake_of.len());
    }

    fn require(&self, required: HydrologyStage) -> Result<(), HydrologyError> {
        if self.stage == required {
            Ok(())
        } else {
            Err(HydrologyError::OutOfOrder {
                required,
                current: self.stage,
            })
        }
    }

    pub fn fill_depressions(
        &mut self,
        adjacency: &impl AdjacencyProvider,
        elevation: &[f32],
    ) -> Result<(), HydrologyError> {
        self.require(HydrologyStage::Raw)?;
        self.filled = fill::priority_flood(adjacency, elevation);
        self.stage = HydrologyStage::DepressionsFilled;
        Ok(())
    }

    pub fn compute_drainage(
        &mut self,
        adjacency: &impl AdjacencyProvider,
        elevation: &[f32],
    ) -> Result<(), HydrologyError> {
        self.require(HydrologyStage::DepressionsFilled)?;
        self.drainage = flow::compute_drainage(adjacency, elevation, &self.filled);
        self.stage = HydrologyStage::DrainageComputed;
        Ok(())
    }

    pub fn accumulate_flow(&mut self, elevation: &[f32]) -> Result<(), HydrologyError> {
        self.require(HydrologyStage::DrainageComputed)?;
        self.flow = flow::accumulate_flow(elevation, &self.filled, &self.drainage);
        self.stage = HydrologyStage::FlowAccumulated;
        Ok(())
    }

    /// Размывает рельеф и пересчитывает заполнение, сток и поток по новым высотам.
    pub fn erode(
        &mut self,
        adjacency: &impl AdjacencyProvider,
        elevation: &mut [f32],
        settings: &HydrologySettings,
    ) -> Result<(), HydrologyError> {
        self.require(HydrologyStage::FlowAccumulated)?;
        erosion::erode(adjacency, elevation, &self.flow, settings);

        self.filled = fill::priority_flood(adjacency, elevation);
        self.drainage = flow::compute_drainage(adjacency, elevation, &self.filled);
        self.flow = flow::accumulate_flow(elevation, &self.filled, &self.drainage);
        self.stage = HydrologyStage::Eroded;
        Ok(())
    }

    pub fn trace_rivers(
        &mut self,
        partition: &Partition,
        elevation: &[f32],
        settings: &HydrologySettings,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), HydrologyError> {
        if self.stage != HydrologyStage::Eroded {
            self.require(HydrologyStage::FlowAccumulated)?;
        }
        let (rivers, river_of) = rivers::trace_rivers(
            partition,
            elevation,
            &self.drainage,
            &self.flow,
            settings,
            rng,
        );
        self.rivers = rivers;
        self.river_of = river_of;
        self.stage = HydrologyStage::RiversTraced;
        Ok(())
    }

    pub fn detect_lakes(
        &mut self,
        adjacency: &impl AdjacencyProvider,
        elevation: &[f32],
        settings: &HydrologySettings,
    ) -> Result<(), HydrologyError> {
        self.require(HydrologyStage::RiversTraced)?;
        let mut lake_of = vec![None; adjacency.cell_count()];
        self.lakes = lakes::detect_lakes(
            adjacency,
            elevation,
            &self.filled,
            &mut self.drainage,
            &mut lake_of,
            settings,
        );
        self.lake_of = lake_of;
        self.flow = flow::accumulate_topological(elevation, &self.drainage);
        self.stage = HydrologyStage::LakesDetected;
        Ok(())
    }

    /// Заполненные высоты: только для направлений стока
    #[must_use]
    pub fn filled(&self) -> &[f32] {
        &self.filled
    }

    #[must_use]
    pub fn drainage(&self) -> &[Option<usize>] {
        &self.drainage
    }

    /// Накопленный поток; после озёр пересчитан по перенаправленному стоку
    #[must_use]
    pub fn flow(&self) -> &[f32] {
        &self.flow
    }

    /// Реки трассируются до поиска озёр и могут проходить через их ячейки
    #[must_use]
    pub fn rivers(&self) -> &[River] {
        &self.rivers
    }

    #[must_use]
    pub fn lakes(&self) -> &[Lake] {
        &self.lakes
    }

    #[must_use]
    pub fn is_river(&self, cell: usize) -> bool {
        self.river_of.get(cell).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn river_of(&self, cell: usize) -> Option<usize> {
        self.river_of.get(cell).copied().flatten()
    }

    #[must_use]
    pub fn lake_of(&self, cell: usize) -> Option<usize> {
        self.lake_of.get(cell).copied().flatten()
    }

    /// Путь стока от ячейки до моря или края
    #[must_use]
    pub fn drainage_path(&self, cell: usize) -> Vec<usize> {
        flow::drainage_path(&self.drainage, cell)
    }
}
