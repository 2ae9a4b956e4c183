//! Ошибки генерации мира
//!
//! Пользователь видит только ошибки конфигурации и геометрии. Всё остальное
//! (исчерпание лимитов, недостижимые участки, ненайденные дороги) деградирует
//! молча: мир получается чуть беднее, но остаётся корректным.

use thiserror::Error;

use crate::hydrology::HydrologyStage;

/// Некорректные параметры запроса: обнаруживаются до начала работы.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Вырожденная геометрия: разбиение построить нельзя.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("need at least 3 distinct points, got {distinct}")]
    TooFewPoints { distinct: usize },

    #[error("points are collinear, triangulation is singular")]
    Collinear,

    #[error("point {index} duplicates another point")]
    DuplicatePoint { index: usize },

    #[error("point {index} lies outside the domain")]
    PointOutOfBounds { index: usize },

    #[error("cell {index} has a degenerate polygon")]
    DegenerateCell { index: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HydrologyError {
    #[error("hydrology stage {required:?} required, current stage is {current:?}")]
    OutOfOrder {
        required: HydrologyStage,
        current: HydrologyStage,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Hydrology(#[from] HydrologyError),

    #[error("generation cancelled")]
    Cancelled,

    #[error("export failed: {0}")]
    Export(String),

    #[error("preview failed: {0}")]
    Image(#[from] image::ImageError),
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Export(e.to_string())
    }
}

impl From<std::io::Error> for GenerationError {
    fn from(e: std::io::Error) -> Self {
        Self::Export(e.to_string())
    }
}
