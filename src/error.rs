// src/error.rs
//! Ошибки генерации
//!
//! Две категории:
//! - [`ConfigError`] — недопустимые входные параметры, обнаруживаются до запуска любого этапа;
//! - [`CalculationError`] — неожиданное состояние сетки внутри этапа.
//!
//! Обе сворачиваются в [`GenerationError`], который возвращает конвейер.
//! Запись результатов на диск сообщает об ошибках через [`ExportError`].

use std::fmt;

use thiserror::Error;

/// Этап конвейера генерации (используется как контекст ошибок и логов)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Grid,
    Heightmap,
    Features,
    Lakes,
    Placement,
    Temperature,
    Precipitation,
    ReGraph,
    Rivers,
    Biomes,
    Suitability,
}

impl Stage {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stage::Grid => "grid",
            Stage::Heightmap => "heightmap",
            Stage::Features => "features",
            Stage::Lakes => "lakes",
            Stage::Placement => "placement",
            Stage::Temperature => "temperature",
            Stage::Precipitation => "precipitation",
            Stage::ReGraph => "regraph",
            Stage::Rivers => "rivers",
            Stage::Biomes => "biomes",
            Stage::Suitability => "suitability",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Недопустимая конфигурация
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("map dimensions must be positive, got {width}×{height}")]
    NonPositiveDimensions { width: u32, height: u32 },
    #[error("desired cell count must be positive")]
    ZeroCells,
    #[error("{cells_desired} cells do not fit into a {width}×{height} map")]
    CellsTooDense {
        cells_desired: usize,
        width: u32,
        height: u32,
    },
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("wind angle #{tier} must be within 0..360, got {angle}")]
    InvalidWind { tier: usize, angle: f64 },
    #[error("biome habitability table is empty")]
    EmptyHabitability,
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Нарушение инвариантов сетки во время расчёта
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("mesh has no cells")]
    EmptyMesh,
    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("elevation {value} of cell {cell} is outside 0..=100")]
    ElevationOutOfRange { cell: usize, value: u8 },
    #[error("triangulation of {points} points produced no triangles")]
    Triangulation { points: usize },
    #[error("feature {feature} is not connected ({components} components)")]
    DisconnectedFeature { feature: u32, components: usize },
    #[error("cell {cell} references unknown feature {feature}")]
    UnknownFeature { cell: usize, feature: u32 },
    #[error("grid rows are inconsistent: {cells} cells for {cells_x}×{cells_y}")]
    RowLayout {
        cells: usize,
        cells_x: usize,
        cells_y: usize,
    },
}

/// Ошибка всего прогона генерации
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("stage '{stage}' failed: {source}")]
    Calculation {
        stage: Stage,
        #[source]
        source: CalculationError,
    },
}

impl GenerationError {
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GenerationError::Configuration(_) => None,
            GenerationError::Calculation { stage, .. } => Some(*stage),
        }
    }
}

/// Ошибка записи результатов на диск
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}
