//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией мира:
//! - Размер области и число ячеек, способ расстановки точек
//! - Алгоритм карты высот, уровень моря и спад к краям
//! - Гидрологию (эрозия, реки, озёра) и осадки
//! - Королевства, поселения и плотность дорог
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Способ расстановки центров ячеек
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Distribution {
    /// Равномерно случайные точки
    Uniform,
    /// Регулярная сетка со случайным сдвигом внутри клетки
    #[default]
    Jittered,
    /// Диск Пуассона (Bridson): точки не ближе заданного радиуса
    PoissonDisc,
    /// Случайные точки, выровненные релаксацией Ллойда
    Relaxed,
}

/// Алгоритм шума для карты высот
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseAlgorithm {
    /// Фрактальная сумма октав
    #[default]
    Fbm,
    /// Гребневой шум: острые хребты
    Ridged,
    /// Шум с искажением координат другим шумом
    Warped,
    /// Октавы гасятся накопленным уклоном: «размытые» склоны и долины
    Eroded,
    /// Ступенчатые террасы
    Terraced,
    /// Крупные континенты с горными поясами
    Continental,
}

/// Спад высоты к краям области
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Falloff {
    #[default]
    None,
    /// По расстоянию от центра
    Radial,
    /// По расстоянию до ближайшего края
    Square,
}

/// Тип генерируемого мира
///
/// Пресет для карты высот: задаёт уровень моря, частоту и спад к краям.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WorldType {
    /// Несколько континентов и океаны
    #[default]
    EarthLike,
    /// Один крупный суперконтинент
    Supercontinent,
    /// Многочисленные острова
    Archipelago,
    /// Большое внутреннее море, окружённое сушей
    Mediterranean,
}

impl WorldType {
    /// Возвращает настройки карты высот по умолчанию для данного типа мира.
    ///
    /// # Особенности
    /// - `Supercontinent` — низкая частота, мягкий радиальный спад
    /// - `Archipelago` — высокая частота и высокий уровень моря
    /// - `Mediterranean` — гребневой шум без спада: внутренние моря между хребтами
    #[must_use]
    pub fn default_heightmap(self) -> HeightmapSettings {
        match self {
            WorldType::EarthLike => HeightmapSettings::default(),
            WorldType::Supercontinent => HeightmapSettings {
                algorithm: NoiseAlgorithm::Continental,
                frequency: 1.5,
                sea_level: 0.35,
                falloff: Falloff::Radial,
                falloff_strength: 0.8,
                ..HeightmapSettings::default()
            },
            WorldType::Archipelago => HeightmapSettings {
                algorithm: NoiseAlgorithm::Fbm,
                frequency: 5.0,
                octaves: 4,
                sea_level: 0.6,
                falloff: Falloff::Square,
                falloff_strength: 0.5,
                ..HeightmapSettings::default()
            },
            WorldType::Mediterranean => HeightmapSettings {
                algorithm: NoiseAlgorithm::Ridged,
                frequency: 2.0,
                sea_level: 0.5,
                falloff: Falloff::None,
                ..HeightmapSettings::default()
            },
        }
    }
}

/// Настройки карты высот
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightmapSettings {
    /// Алгоритм шума
    #[serde(default)]
    pub algorithm: NoiseAlgorithm,

    /// Частота шума в «периодах на ширину области»
    #[serde(default = "default_frequency")]
    pub frequency: f32,

    /// Количество октав фрактального шума
    #[serde(default = "default_octaves")]
    pub octaves: u32,

    /// Порог уровня моря в нормализованной высоте, строго внутри (0, 1)
    #[serde(default = "default_sea_level")]
    pub sea_level: f32,

    /// Спад к краям области
    #[serde(default)]
    pub falloff: Falloff,

    /// Сила спада: 0 — нет влияния, 1 — края всегда уходят под воду
    #[serde(default = "default_falloff_strength")]
    pub falloff_strength: f32,

    /// Количество проходов сглаживания по соседям (0 = без сглаживания)
    #[serde(default = "default_smoothing_passes")]
    pub smoothing_passes: u32,
}

fn default_frequency() -> f32 {
    3.0
}
fn default_octaves() -> u32 {
    5
}
fn default_sea_level() -> f32 {
    0.4
}
fn default_falloff_strength() -> f32 {
    0.6
}
fn default_smoothing_passes() -> u32 {
    1
}

impl Default for HeightmapSettings {
    fn default() -> Self {
        Self {
            algorithm: NoiseAlgorithm::Fbm,
            frequency: 3.0,
            octaves: 5,
            sea_level: 0.4,
            falloff: Falloff::None,
            falloff_strength: 0.6,
            smoothing_passes: 1,
        }
    }
}

/// Настройки гидрологии: эрозия, реки, озёра
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrologySettings {
    /// Включить проход эрозии по накопленному стоку
    #[serde(default = "default_erosion")]
    pub erosion: bool,

    /// Максимальное понижение русла за проход (в единицах высоты)
    #[serde(default = "default_erosion_strength")]
    pub erosion_strength: f32,

    /// Доля от максимального стока, начиная с которой ячейка размывается
    #[serde(default = "default_erosion_flow_threshold")]
    pub erosion_flow_threshold: f32,

    /// Наибольший перепад высот между руслом и соседом после эрозии
    #[serde(default = "default_max_slope")]
    pub max_slope: f32,

    /// Доля самых высоких ячеек суши, из которых могут начинаться реки
    #[serde(default = "default_river_source_percentile")]
    pub river_source_percentile: f32,

    /// Минимальная длина реки в ячейках (короткие отбрасываются)
    #[serde(default = "default_river_min_length")]
    pub river_min_length: usize,

    /// Минимальное расстояние между истоками, в средних шагах сетки
    #[serde(default = "default_river_spacing")]
    pub river_spacing: f64,

    /// Максимальное количество рек
    #[serde(default = "default_max_rivers")]
    pub max_rivers: usize,

    /// Наибольший подъём уровня воды при росте котловины озера
    #[serde(default = "default_lake_max_rise")]
    pub lake_max_rise: f32,

    /// Минимальная глубина озера
    #[serde(default = "default_lake_min_depth")]
    pub lake_min_depth: f32,

    /// Максимальная площадь озера в ячейках
    #[serde(default = "default_lake_max_cells")]
    pub lake_max_cells: usize,

    /// Максимальное количество озёр
    #[serde(default = "default_max_lakes")]
    pub max_lakes: usize,

    /// Сколько островков допускается внутри озера
    #[serde(default = "default_island_tolerance")]
    pub island_tolerance: usize,
}

fn default_erosion() -> bool {
    true
}
fn default_erosion_strength() -> f32 {
    150.0
}
fn default_erosion_flow_threshold() -> f32 {
    0.05
}
fn default_max_slope() -> f32 {
    400.0
}
fn default_river_source_percentile() -> f32 {
    0.2
}
fn default_river_min_length() -> usize {
    4
}
fn default_river_spacing() -> f64 {
    4.0
}
fn default_max_rivers() -> usize {
    40
}
fn default_lake_max_rise() -> f32 {
    600.0
}
fn default_lake_min_depth() -> f32 {
    5.0
}
fn default_lake_max_cells() -> usize {
    64
}
fn default_max_lakes() -> usize {
    16
}
fn default_island_tolerance() -> usize {
    1
}

impl Default for HydrologySettings {
    fn default() -> Self {
        Self {
            erosion: true,
            erosion_strength: 150.0,
            erosion_flow_threshold: 0.05,
            max_slope: 400.0,
            river_source_percentile: 0.2,
            river_min_length: 4,
            river_spacing: 4.0,
            max_rivers: 40,
            lake_max_rise: 600.0,
            lake_min_depth: 5.0,
            lake_max_cells: 64,
            max_lakes: 16,
            island_tolerance: 1,
        }
    }
}

/// Глобальные параметры осадков
///
/// Ветер переносит влагу; наветренные склоны получают больше осадков, подветренные — меньше.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateSettings {
    /// Направление, куда дует ветер, в градусах (0 — на восток, 90 — на юг по оси Y)
    #[serde(default = "default_wind_direction")]
    pub wind_direction: f32,

    /// Сила ветра: масштаб орографического эффекта
    #[serde(default = "default_wind_strength")]
    pub wind_strength: f32,

    /// Базовый уровень осадков на суше (0..1)
    #[serde(default = "default_base_precipitation")]
    pub base_precipitation: f32,
}

fn default_wind_direction() -> f32 {
    0.0
}
fn default_wind_strength() -> f32 {
    1.0
}
fn default_base_precipitation() -> f32 {
    0.5
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            wind_direction: 0.0,
            wind_strength: 1.0,
            base_precipitation: 0.5,
        }
    }
}

/// Настройки разделения суши на королевства
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliticalSettings {
    /// Массивы суши с долей меньше этой не получают своих столиц
    #[serde(default = "default_min_landmass_share")]
    pub min_landmass_share: f32,

    /// Размер палитры цветов для раскраски королевств
    #[serde(default = "default_palette_size")]
    pub palette_size: usize,
}

fn default_min_landmass_share() -> f32 {
    0.05
}
fn default_palette_size() -> usize {
    12
}

impl Default for PoliticalSettings {
    fn default() -> Self {
        Self {
            min_landmass_share: 0.05,
            palette_size: 12,
        }
    }
}

/// Настройки расстановки поселений
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Плотность: поселений на каждые `CELLS_PER_SETTLEMENT` ячеек королевства
    #[serde(default = "default_settlement_density")]
    pub density: f32,

    /// Минимальное расстояние между поселениями, в средних шагах сетки
    #[serde(default = "default_min_separation")]
    pub min_separation: f64,
}

fn default_settlement_density() -> f32 {
    1.0
}
fn default_min_separation() -> f64 {
    2.5
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            density: 1.0,
            min_separation: 2.5,
        }
    }
}

/// Настройки поиска пути для дорог
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoadSettings {
    /// Лимит раскрытых вершин A* на одну дорогу (по умолчанию — число ячеек)
    #[serde(default)]
    pub expansion_budget: Option<usize>,
}

/// Полный запрос на генерацию мира
///
/// Полная конфигурация для генерации одного мира. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u64,

    /// Количество ячеек разбиения
    #[serde(default = "default_cell_count")]
    pub cell_count: usize,

    /// Ширина области
    #[serde(default = "default_width")]
    pub width: f64,

    /// Высота области
    #[serde(default = "default_height")]
    pub height: f64,

    /// Способ расстановки точек
    #[serde(default)]
    pub distribution: Distribution,

    /// Сгущать точки там, где вероятнее суша
    #[serde(default)]
    pub land_biased: bool,

    /// Количество итераций релаксации Ллойда
    #[serde(default)]
    pub relax_iterations: u32,

    #[serde(default)]
    pub heightmap: HeightmapSettings,

    #[serde(default)]
    pub hydrology: HydrologySettings,

    #[serde(default)]
    pub climate: ClimateSettings,

    /// Желаемое количество королевств
    #[serde(default = "default_kingdom_count")]
    pub kingdom_count: usize,

    #[serde(default)]
    pub political: PoliticalSettings,

    #[serde(default)]
    pub settlements: SettlementSettings,

    /// Сколько дорог строить в каждом королевстве (0 — без дорог)
    #[serde(default = "default_road_density")]
    pub road_density: usize,

    #[serde(default)]
    pub roads: RoadSettings,
}

fn default_cell_count() -> usize {
    4000
}
fn default_width() -> f64 {
    1600.0
}
fn default_height() -> f64 {
    1000.0
}
fn default_kingdom_count() -> usize {
    6
}
fn default_road_density() -> usize {
    4
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            seed: 0,
            cell_count: 4000,
            width: 1600.0,
            height: 1000.0,
            distribution: Distribution::Jittered,
            land_biased: false,
            relax_iterations: 0,
            heightmap: HeightmapSettings::default(),
            hydrology: HydrologySettings::default(),
            climate: ClimateSettings::default(),
            kingdom_count: 6,
            political: PoliticalSettings::default(),
            settlements: SettlementSettings::default(),
            road_density: 4,
            roads: RoadSettings::default(),
        }
    }
}

impl GenerationRequest {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// cell_count = 8000
    /// kingdom_count = 5
    ///
    /// [heightmap]
    /// algorithm = "continental"
    /// sea_level = 0.45
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let params: Self = toml::from_str(contents)?;
        Ok(params)
    }

    /// Проверяет запрос до начала работы; ошибка называет поле-нарушителя.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_count < 3 {
            return Err(ConfigError::invalid(
                "cell_count",
                format!("must be at least 3, got {}", self.cell_count),
            ));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(ConfigError::invalid(
                "width",
                format!("must be positive, got {}", self.width),
            ));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(ConfigError::invalid(
                "height",
                format!("must be positive, got {}", self.height),
            ));
        }

        let hm = &self.heightmap;
        if !(hm.sea_level > 0.0 && hm.sea_level < 1.0) {
            return Err(ConfigError::invalid(
                "heightmap.sea_level",
                format!("must lie in (0, 1), got {}", hm.sea_level),
            ));
        }
        if !(0.0..=1.0).contains(&hm.falloff_strength) {
            return Err(ConfigError::invalid(
                "heightmap.falloff_strength",
                format!("must lie in [0, 1], got {}", hm.falloff_strength),
            ));
        }
        if !(hm.frequency.is_finite() && hm.frequency > 0.0) {
            return Err(ConfigError::invalid(
                "heightmap.frequency",
                format!("must be positive, got {}", hm.frequency),
            ));
        }
        if hm.octaves == 0 {
            return Err(ConfigError::invalid("heightmap.octaves", "must be at least 1"));
        }

        if self.kingdom_count < 1 {
            return Err(ConfigError::invalid("kingdom_count", "must be at least 1"));
        }
        if self.political.palette_size < 1 {
            return Err(ConfigError::invalid(
                "political.palette_size",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.political.min_landmass_share) {
            return Err(ConfigError::invalid(
                "political.min_landmass_share",
                format!(
                    "must lie in [0, 1), got {}",
                    self.political.min_landmass_share
                ),
            ));
        }

        let climate = &self.climate;
        if !(climate.wind_strength.is_finite() && climate.wind_strength >= 0.0) {
            return Err(ConfigError::invalid(
                "climate.wind_strength",
                format!("must be non-negative, got {}", climate.wind_strength),
            ));
        }
        if !(0.0..=1.0).contains(&climate.base_precipitation) {
            return Err(ConfigError::invalid(
                "climate.base_precipitation",
                format!("must lie in [0, 1], got {}", climate.base_precipitation),
            ));
        }
        if self.settlements.density < 0.0 || !self.settlements.density.is_finite() {
            return Err(ConfigError::invalid(
                "settlements.density",
                format!("must be non-negative, got {}", self.settlements.density),
            ));
        }
        let separation = self.settlements.min_separation;
        if !(separation.is_finite() && separation >= 0.0) {
            return Err(ConfigError::invalid(
                "settlements.min_separation",
                format!("must be non-negative, got {separation}"),
            ));
        }
        if self.roads.expansion_budget == Some(0) {
            return Err(ConfigError::invalid(
                "roads.expansion_budget",
                "must be at least 1 when set",
            ));
        }

        self.hydrology.validate()
    }
}

/// Конечное неотрицательное значение
fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be non-negative, got {value}"),
        ))
    }
}

impl HydrologySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("hydrology.erosion_strength", self.erosion_strength)?;
        if !(0.0..=1.0).contains(&self.erosion_flow_threshold) {
            return Err(ConfigError::invalid(
                "hydrology.erosion_flow_threshold",
                format!("must lie in [0, 1], got {}", self.erosion_flow_threshold),
            ));
        }
        if !(self.max_slope.is_finite() && self.max_slope > 0.0) {
            return Err(ConfigError::invalid(
                "hydrology.max_slope",
                format!("must be positive, got {}", self.max_slope),
            ));
        }
        if !(self.river_source_percentile > 0.0 && self.river_source_percentile <= 1.0) {
            return Err(ConfigError::invalid(
                "hydrology.river_source_percentile",
                format!("must lie in (0, 1], got {}", self.river_source_percentile),
            ));
        }
        if !(self.river_spacing.is_finite() && self.river_spacing >= 0.0) {
            return Err(ConfigError::invalid(
                "hydrology.river_spacing",
                format!("must be non-negative, got {}", self.river_spacing),
            ));
        }
        non_negative("hydrology.lake_max_rise", self.lake_max_rise)?;
        non_negative("hydrology.lake_min_depth", self.lake_min_depth)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> &'static str {
        match err {
            ConfigError::InvalidField { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_request_is_valid() {
        assert!(GenerationRequest::default().validate().is_ok());
    }

    #[test]
    fn invalid_fields_are_named() {
        let mut request = GenerationRequest {
            cell_count: 2,
            ..GenerationRequest::default()
        };
        assert_eq!(field_of(request.validate().unwrap_err()), "cell_count");

        request.cell_count = 100;
        request.width = 0.0;
        assert_eq!(field_of(request.validate().unwrap_err()), "width");

        request.width = 100.0;
        request.height = -5.0;
        assert_eq!(field_of(request.validate().unwrap_err()), "height");

        request.height = 100.0;
        request.heightmap.sea_level = 1.0;
        assert_eq!(
            field_of(request.validate().unwrap_err()),
            "heightmap.sea_level"
        );

        request.heightmap.sea_level = 0.5;
        request.kingdom_count = 0;
        assert_eq!(field_of(request.validate().unwrap_err()), "kingdom_count");
    }

    #[test]
    fn stage_settings_are_checked() {
        let base = GenerationRequest::default();
        let cases: [(&str, fn(&mut GenerationRequest)); 10] = [
            ("hydrology.erosion_strength", |r| r.hydrology.erosion_strength = -1.0e6),
            ("hydrology.erosion_strength", |r| r.hydrology.erosion_strength = f32::NAN),
            ("hydrology.erosion_flow_threshold", |r| r.hydrology.erosion_flow_threshold = 1.5),
            ("hydrology.max_slope", |r| r.hydrology.max_slope = 0.0),
            ("hydrology.river_source_percentile", |r| r.hydrology.river_source_percentile = 0.0),
            ("hydrology.river_spacing", |r| r.hydrology.river_spacing = -2.0),
            ("hydrology.lake_max_rise", |r| r.hydrology.lake_max_rise = f32::INFINITY),
            ("hydrology.lake_min_depth", |r| r.hydrology.lake_min_depth = -5.0),
            ("settlements.min_separation", |r| r.settlements.min_separation = f64::NAN),
            ("roads.expansion_budget", |r| r.roads.expansion_budget = Some(0)),
        ];
        for (field, corrupt) in cases {
            let mut request = base.clone();
            corrupt(&mut request);
            assert_eq!(field_of(request.validate().unwrap_err()), field);
        }

        let mut request = base;
        request.roads.expansion_budget = Some(500);
        request.hydrology.erosion_strength = 0.0;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn toml_uses_defaults_for_missing_fields() {
        let request = GenerationRequest::from_toml_str(
            r#"
            seed = 7
            cell_count = 500
            distribution = "poisson-disc"

            [heightmap]
            algorithm = "ridged"
            sea_level = 0.55
            "#,
        )
        .unwrap();

        assert_eq!(request.seed, 7);
        assert_eq!(request.cell_count, 500);
        assert_eq!(request.distribution, Distribution::PoissonDisc);
        assert_eq!(request.heightmap.algorithm, NoiseAlgorithm::Ridged);
        assert_eq!(request.heightmap.octaves, 5);
        assert_eq!(request.kingdom_count, 6);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn world_type_presets_are_valid() {
        for world_type in [
            WorldType::EarthLike,
            WorldType::Supercontinent,
            WorldType::Archipelago,
            WorldType::Mediterranean,
        ] {
            let request = GenerationRequest {
                heightmap: world_type.default_heightmap(),
                ..GenerationRequest::default()
            };
            assert!(request.validate().is_ok(), "{world_type:?}");
        }
    }
}
