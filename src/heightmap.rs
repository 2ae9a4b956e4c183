//! Синтез рельефа по ячейкам
//!
//! Высота ячейки — чистая функция нормализованных координат её центра и сида:
//! 1. Шум выбранного алгоритма в `[-1, 1]` переводится в `[0, 1]`
//! 2. Необязательный спад к краям (радиальный или квадратный)
//! 3. Растяжение на полный диапазон `[0, 1]`
//! 4. Разделение по уровню моря: ниже — глубины `[MIN_DEPTH, SHELF_DEPTH]`, выше — `(0, MAX_HEIGHT]`
//! 5. Сглаживание по соседям; суша/море всегда определяются заново по высоте

use fastnoise_lite::{FastNoiseLite, FractalType};
use serde::{Deserialize, Serialize};

use crate::config::{Falloff, HeightmapSettings, NoiseAlgorithm};
use crate::context::{NOISE_DETAIL, NOISE_PRIMARY, NOISE_WARP, SeedContext};
use crate::geometry::{Bounds, Point, smoothstep};
use crate::partition::{AdjacencyProvider, Partition};

pub const SEA_LEVEL: f32 = 0.0;
pub const MIN_DEPTH: f32 = -4000.0;
pub const MAX_HEIGHT: f32 = 4000.0;
/// Верхняя граница глубин: клетка на пороге уровня моря остаётся морем
pub const SHELF_DEPTH: f32 = -1.0;

/// Расстояние до края, с которого начинается спад
const FALLOFF_START: f64 = 0.35;
/// Вес собственной высоты при сглаживании
const SMOOTH_SELF_WEIGHT: f32 = 0.6;
const WARP_STRENGTH: f32 = 0.25;
const ERODED_GRADIENT_DAMPING: f32 = 0.05;
const TERRACE_STEPS: f32 = 8.0;
const GRADIENT_STEP: f32 = 1e-3;

/// Источник высот по индексу ячейки
pub trait ElevationSource {
    fn elevation(&self, cell: usize) -> f32;

    fn is_land(&self, cell: usize) -> bool {
        self.elevation(cell) >= SEA_LEVEL
    }
}

impl ElevationSource for [f32] {
    fn elevation(&self, cell: usize) -> f32 {
        self[cell]
    }
}

/// Высоты всех ячеек в `[MIN_DEPTH, MAX_HEIGHT]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub elevation: Vec<f32>,
}

impl Terrain {
    #[must_use]
    pub fn new(elevation: Vec<f32>) -> Self {
        Self { elevation }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }

    #[must_use]
    pub fn land_count(&self) -> usize {
        self.elevation.iter().filter(|&&e| e >= SEA_LEVEL).count()
    }

    /// Высота в произвольной точке области (через поиск ячейки)
    #[must_use]
    pub fn sample_at(&self, partition: &Partition, x: f64, y: f64) -> Option<f32> {
        partition.locate(x, y).map(|cell| self.elevation[cell])
    }
}

impl ElevationSource for Terrain {
    fn elevation(&self, cell: usize) -> f32 {
        self.elevation[cell]
    }
}

/// Настроенные слои шума для одного алгоритма
pub struct TerrainNoise {
    algorithm: NoiseAlgorithm,
    octaves: u32,
    primary: FastNoiseLite,
    warp: FastNoiseLite,
    detail: FastNoiseLite,
}

impl TerrainNoise {
    #[must_use]
    pub fn new(settings: &HeightmapSettings, ctx: &SeedContext) -> Self {
        let octaves = settings.octaves.max(1) as i32;
        let frequency = settings.frequency;

        let mut primary = ctx.noise(NOISE_PRIMARY);
        let fractal = match settings.algorithm {
            NoiseAlgorithm::Ridged => FractalType::Ridged,
            // Октавы «эродированного» шума считаются вручную
            NoiseAlgorithm::Eroded => FractalType::None,
            _ => FractalType::FBm,
        };
        primary.set_fractal_type(Some(fractal));
        primary.set_fractal_octaves(Some(octaves));
        primary.set_frequency(Some(match settings.algorithm {
            NoiseAlgorithm::Continental => frequency * 0.5,
            _ => frequency,
        }));

        let mut warp = ctx.noise(NOISE_WARP);
        warp.set_fractal_type(Some(FractalType::FBm));
        warp.set_fractal_octaves(Some(3));
        warp.set_frequency(Some(frequency));

        let mut detail = ctx.noise(NOISE_DETAIL);
        detail.set_fractal_type(Some(FractalType::Ridged));
        detail.set_fractal_octaves(Some(octaves.min(4)));
        detail.set_frequency(Some(frequency * 2.0));

        Self {
            algorithm: settings.algorithm,
            octaves: settings.octaves.max(1),
            primary,
            warp,
            detail,
        }
    }

    /// Сырое значение в `[-1, 1]` для нормализованных координат
    #[must_use]
    pub fn sample(&self, nx: f32, ny: f32) -> f32 {
        let value = match self.algorithm {
            NoiseAlgorithm::Fbm | NoiseAlgorithm::Ridged => self.primary.get_noise_2d(nx, ny),
            NoiseAlgorithm::Warped => {
                let qx = self.warp.get_noise_2d(nx, ny);
                let qy = self.warp.get_noise_2d(nx + 5.2, ny + 1.3);
                self.primary
                    .get_noise_2d(nx + WARP_STRENGTH * qx, ny + WARP_STRENGTH * qy)
            }
            NoiseAlgorithm::Eroded => self.eroded(nx, ny),
            NoiseAlgorithm::Terraced => {
                let v = self.primary.get_noise_2d(nx, ny).clamp(-1.0, 1.0);
                let t = (v + 1.0) * 0.5 * TERRACE_STEPS;
                let step = t.floor();
                let riser = smoothstep(0.35, 0.65, f64::from(t - step)) as f32;
                (step + riser) / TERRACE_STEPS * 2.0 - 1.0
            }
            NoiseAlgorithm::Continental => {
                let continent = self.primary.get_noise_2d(nx, ny);
                let ridge = (self.detail.get_noise_2d(nx, ny) + 1.0) * 0.5;
                continent + 0.5 * continent.max(0.0) * ridge
            }
        };
        value.clamp(-1.0, 1.0)
    }

    /// Октавы гасятся накопленным градиентом: крутые места получают меньше мелких деталей.
    fn eroded(&self, nx: f32, ny: f32) -> f32 {
        let mut sum = 0.0;
        let mut norm = 0.0;
        let mut amplitude = 1.0;
        let mut scale = 1.0;
        let mut gx = 0.0;
        let mut gy = 0.0;

        for _ in 0..self.octaves {
            let x = nx * scale;
            let y = ny * scale;
            let n = self.primary.get_noise_2d(x, y);
            let dx = (self.primary.get_noise_2d(x + GRADIENT_STEP, y) - n) / GRADIENT_STEP;
            let dy = (self.primary.get_noise_2d(x, y + GRADIENT_STEP) - n) / GRADIENT_STEP;
            gx += dx;
            gy += dy;
            sum += amplitude * n / (1.0 + ERODED_GRADIENT_DAMPING * (gx * gx + gy * gy));
            norm += amplitude;
            amplitude *= 0.5;
            scale *= 2.0;
        }
        sum / norm
    }
}

/// Множитель спада в точке: 1 в центре, `1 - strength` на самом краю
#[must_use]
pub fn falloff_factor(falloff: Falloff, strength: f32, bounds: Bounds, p: &Point) -> f32 {
    let dx = p.x / bounds.width - 0.5;
    let dy = p.y / bounds.height - 0.5;
    let distance = match falloff {
        Falloff::None => return 1.0,
        Falloff::Radial => (dx * dx + dy * dy).sqrt() * std::f64::consts::SQRT_2,
        Falloff::Square => dx.abs().max(dy.abs()) * 2.0,
    };
    1.0 - strength * smoothstep(FALLOFF_START, 1.0, distance) as f32
}

/// Высота в `[0, 1]` до растяжения: шум плюс спад
#[must_use]
pub fn unit_height(
    noise: &TerrainNoise,
    settings: &HeightmapSettings,
    bounds: Bounds,
    p: &Point,
) -> f32 {
    let (nx, ny) = bounds.normalize(p);
    let raw = noise.sample(nx as f32, ny as f32);
    let h = (raw + 1.0) * 0.5;
    (h * falloff_factor(settings.falloff, settings.falloff_strength, bounds, p)).clamp(0.0, 1.0)
}

/// Дешёвая оценка вероятности суши без растяжения и сглаживания
#[must_use]
pub fn land_probability(
    noise: &TerrainNoise,
    settings: &HeightmapSettings,
    bounds: Bounds,
    p: &Point,
) -> f64 {
    let h = f64::from(unit_height(noise, settings, bounds, p));
    let sea = f64::from(settings.sea_level);
    smoothstep(sea - 0.1, sea + 0.1, h)
}

/// Переводит нормализованную высоту в абсолютную по уровню моря.
#[must_use]
pub fn split_at_sea_level(h: f32, sea_level: f32) -> f32 {
    if h <= sea_level {
        MIN_DEPTH + (h / sea_level) * (SHELF_DEPTH - MIN_DEPTH)
    } else {
        (h - sea_level) / (1.0 - sea_level) * MAX_HEIGHT
    }
}

/// Генерирует высоты для всех ячеек разбиения
#[must_use]
pub fn synthesize(partition: &Partition, settings: &HeightmapSettings, ctx: &SeedContext) -> Terrain {
    let noise = TerrainNoise::new(settings, ctx);
    let bounds = partition.bounds();

    let mut heights: Vec<f32> = partition
        .centers()
        .iter()
        .map(|p| unit_height(&noise, settings, bounds, p))
        .collect();
    stretch_to_unit(&mut heights);

    let mut elevation: Vec<f32> = heights
        .iter()
        .map(|&h| split_at_sea_level(h, settings.sea_level))
        .collect();

    for _ in 0..settings.smoothing_passes {
        smooth_elevation(partition, &mut elevation);
    }

    let terrain = Terrain::new(elevation);
    tracing::debug!(
        cells = terrain.len(),
        land = terrain.land_count(),
        algorithm = ?settings.algorithm,
        "рельеф синтезирован"
    );
    terrain
}

/// Линейное растяжение на `[0, 1]`; постоянное поле не меняется.
pub fn stretch_to_unit(values: &mut [f32]) {
    let min = values.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    if max - min > 1e-6 {
        for v in values.iter_mut() {
            *v = (*v - min) / (max - min);
        }
    }
}

/// Один проход сглаживания: взвешенное среднее собственной высоты и средней высоты соседей
pub fn smooth_elevation(adjacency: &impl AdjacencyProvider, elevation: &mut [f32]) {
    let previous = elevation.to_vec();
    for (cell, value) in elevation.iter_mut().enumerate() {
        let neighbors = adjacency.neighbors(cell);
        if neighbors.is_empty() {
            continue;
        }
        let mean = neighbors.iter().map(|&n| previous[n]).sum::<f32>() / neighbors.len() as f32;
        *value = (SMOOTH_SELF_WEIGHT * previous[cell] + (1.0 - SMOOTH_SELF_WEIGHT) * mean)
            .clamp(MIN_DEPTH, MAX_HEIGHT);
    }
}
