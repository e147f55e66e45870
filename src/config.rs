// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Размер карты и плотность сетки
//! - Шаблон рельефа (влияет на размещение карты на глобусе и прорыв озёр)
//! - Климатические настройки (температуры, ветра, осадки)
//! - Таблицу пригодности биомов для жизни
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::grid::cell_spacing;
use crate::lakes::DEPRESSION_LAKES_DISABLED;

/// Шаблон рельефа
///
/// Сам рельеф строит внешний генератор высот; ядру шаблон нужен для оценки
/// размера карты и широты, а также чтобы не прорывать озёра у атоллов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Template {
    Volcano,
    HighIsland,
    LowIsland,
    #[default]
    Continents,
    Archipelago,
    Atoll,
    Mediterranean,
    Peninsula,
    Pangea,
    Isthmus,
    Shattered,
    Taklamakan,
    OldWorld,
    Fractious,
}

impl Template {
    /// Целевая доля суши для встроенного генератора высот
    ///
    /// # Примеры
    /// ```
    /// use worldgen::config::Template;
    /// assert_eq!(Template::Continents.target_land_ratio(), 0.35);
    /// assert_eq!(Template::Atoll.target_land_ratio(), 0.05);
    /// ```
    #[must_use]
    pub fn target_land_ratio(self) -> f32 {
        match self {
            Template::Volcano => 0.20,
            Template::HighIsland | Template::LowIsland => 0.30,
            Template::Continents | Template::OldWorld => 0.35,
            Template::Archipelago | Template::Shattered | Template::Fractious => 0.25,
            Template::Atoll => 0.05,
            Template::Mediterranean | Template::Taklamakan => 0.60,
            Template::Peninsula | Template::Isthmus => 0.40,
            Template::Pangea => 0.55,
        }
    }

    /// Сила спада высоты к краям карты (0 — без спада)
    #[must_use]
    pub fn edge_falloff(self) -> f32 {
        match self {
            Template::Volcano | Template::HighIsland | Template::LowIsland | Template::Atoll => 1.0,
            Template::Pangea | Template::Continents => 0.6,
            Template::Archipelago | Template::Shattered | Template::Fractious => 0.4,
            Template::Peninsula | Template::Isthmus => 0.3,
            Template::Mediterranean | Template::Taklamakan | Template::OldWorld => 0.0,
        }
    }
}

/// Глобальные климатические настройки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClimateSettings {
    /// Температура на экваторе на уровне моря, °C
    #[serde(default = "default_temperature_equator")]
    pub temperature_equator: f64,

    /// Температура на северном полюсе, °C
    #[serde(default = "default_temperature_north_pole")]
    pub temperature_north_pole: f64,

    /// Температура на южном полюсе, °C
    #[serde(default = "default_temperature_south_pole")]
    pub temperature_south_pole: f64,

    /// Направление ветра (градусы, 0 — с севера) для шести поясов по 30° с севера на юг
    #[serde(default = "default_winds")]
    pub winds: [f64; 6],
}

fn default_temperature_equator() -> f64 {
    27.0
}
fn default_temperature_north_pole() -> f64 {
    -30.0
}
fn default_temperature_south_pole() -> f64 {
    -15.0
}
fn default_winds() -> [f64; 6] {
    [225.0, 45.0, 225.0, 315.0, 135.0, 315.0]
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            temperature_equator: default_temperature_equator(),
            temperature_north_pole: default_temperature_north_pole(),
            temperature_south_pole: default_temperature_south_pole(),
            winds: default_winds(),
        }
    }
}

/// Положение карты на глобусе, в процентах
///
/// Незаданные значения выбираются по шаблону рельефа.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MapPlacement {
    /// Доля глобуса по широте, которую занимает карта (100 — от полюса до полюса)
    #[serde(default)]
    pub map_size: Option<f64>,
    /// Сдвиг по широте (0 — у северного полюса, 100 — у южного)
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Сдвиг по долготе
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Пригодность биомов для жизни, индекс — идентификатор биома
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiomeTable {
    #[serde(default = "default_habitability")]
    pub habitability: Vec<u8>,
}

fn default_habitability() -> Vec<u8> {
    vec![0, 4, 10, 22, 30, 50, 100, 80, 90, 12, 4, 0, 12]
}

impl Default for BiomeTable {
    fn default() -> Self {
        Self {
            habitability: default_habitability(),
        }
    }
}

impl BiomeTable {
    /// Пригодность биома; неизвестные биомы непригодны
    #[must_use]
    pub fn habitability(&self, biome: u8) -> u8 {
        self.habitability.get(biome as usize).copied().unwrap_or(0)
    }
}

/// Основные параметры генерации мира
///
/// Полная конфигурация для одного прогона. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldGenerationParams {
    /// Сид генератора случайных чисел (строка, как в ссылках на карту)
    #[serde(default = "default_seed")]
    pub seed: String,

    /// Ширина карты в пикселях
    #[serde(default = "default_width")]
    pub width: u32,

    /// Высота карты в пикселях
    #[serde(default = "default_height")]
    pub height: u32,

    /// Желаемое число ячеек грубой сетки
    #[serde(default = "default_cells_desired")]
    pub cells_desired: u32,

    /// Шаблон рельефа
    #[serde(default)]
    pub template: Template,

    /// Предел высоты для поиска стока из низин; 80 отключает озёра в низинах
    #[serde(default = "default_lake_elevation_limit")]
    pub lake_elevation_limit: u8,

    /// Показатель степени высоты в формуле падения температуры
    #[serde(default = "default_height_exponent")]
    pub height_exponent: f64,

    /// Влажность мира в процентах (100 — обычная)
    #[serde(default = "default_precipitation")]
    pub precipitation: u32,

    #[serde(default)]
    pub climate: ClimateSettings,

    #[serde(default)]
    pub placement: MapPlacement,

    #[serde(default)]
    pub biomes: BiomeTable,
}

impl WorldGenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = "123456789"
    /// width = 1920
    /// height = 1080
    /// template = "archipelago"
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Проверяет параметры до запуска генерации
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::NonPositiveDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.cells_desired == 0 {
            return Err(ConfigError::ZeroCells);
        }
        let spacing = cell_spacing(
            f64::from(self.width),
            f64::from(self.height),
            self.cells_desired as usize,
        );
        if spacing <= 0.0 {
            return Err(ConfigError::CellsTooDense {
                cells_desired: self.cells_desired as usize,
                width: self.width,
                height: self.height,
            });
        }
        check_range("lake_elevation_limit", f64::from(self.lake_elevation_limit), 0.0, f64::from(DEPRESSION_LAKES_DISABLED))?;
        if !self.height_exponent.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "height_exponent",
                value: self.height_exponent,
            });
        }
        check_range("precipitation", f64::from(self.precipitation), 0.0, 500.0)?;
        for (field, value) in [
            ("map_size", self.placement.map_size),
            ("latitude", self.placement.latitude),
            ("longitude", self.placement.longitude),
        ] {
            if let Some(value) = value {
                check_range(field, value, 0.0, 100.0)?;
            }
        }
        let climate = &self.climate;
        for (field, value) in [
            ("temperature_equator", climate.temperature_equator),
            ("temperature_north_pole", climate.temperature_north_pole),
            ("temperature_south_pole", climate.temperature_south_pole),
        ] {
            check_range(field, value, -50.0, 50.0)?;
        }
        for (tier, &angle) in climate.winds.iter().enumerate() {
            if !(0.0..360.0).contains(&angle) {
                return Err(ConfigError::InvalidWind { tier, angle });
            }
        }
        if self.biomes.habitability.is_empty() {
            return Err(ConfigError::EmptyHabitability);
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn default_seed() -> String {
    crate::rng::generate_seed()
}
fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_cells_desired() -> u32 {
    10_000
}
fn default_lake_elevation_limit() -> u8 {
    20
}
fn default_height_exponent() -> f64 {
    2.0
}
fn default_precipitation() -> u32 {
    100
}

impl Default for WorldGenerationParams {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            width: default_width(),
            height: default_height(),
            cells_desired: default_cells_desired(),
            template: Template::default(),
            lake_elevation_limit: default_lake_elevation_limit(),
            height_exponent: default_height_exponent(),
            precipitation: default_precipitation(),
            climate: ClimateSettings::default(),
            placement: MapPlacement::default(),
            biomes: BiomeTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        WorldGenerationParams::default().validate().unwrap();
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
seed = "4242"
width = 800
height = 600
template = "highIsland"
precipitation = 150

[climate]
temperature_equator = 30

[placement]
latitude = 25
"#
        )
        .unwrap();

        let params = WorldGenerationParams::from_toml_file(file.path()).unwrap();
        assert_eq!(params.seed, "4242");
        assert_eq!((params.width, params.height), (800, 600));
        assert_eq!(params.template, Template::HighIsland);
        assert_eq!(params.precipitation, 150);
        assert_eq!(params.climate.temperature_equator, 30.0);
        assert_eq!(params.climate.temperature_north_pole, -30.0);
        assert_eq!(params.placement.latitude, Some(25.0));
        assert_eq!(params.placement.map_size, None);
        assert_eq!(params.cells_desired, 10_000);
    }

    #[test]
    fn test_zero_width_rejected() {
        let params = WorldGenerationParams {
            width: 0,
            ..WorldGenerationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonPositiveDimensions { width: 0, .. })
        ));
    }

    #[test]
    fn test_too_many_cells_for_map_rejected() {
        let params = WorldGenerationParams {
            width: 1,
            height: 1,
            cells_desired: 100_000,
            ..WorldGenerationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::CellsTooDense { cells_desired: 100_000, .. })
        ));
    }

    #[test]
    fn test_height_exponent_only_needs_to_be_finite() {
        let mut params = WorldGenerationParams::default();
        params.height_exponent = 3.0;
        params.validate().unwrap();
        params.height_exponent = f64::NAN;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonFinite { field: "height_exponent", .. })
        ));
    }

    #[test]
    fn test_bad_wind_rejected() {
        let mut params = WorldGenerationParams::default();
        params.climate.winds[3] = 360.0;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidWind { tier: 3, .. })
        ));
    }

    #[test]
    fn test_placement_out_of_range_rejected() {
        let mut params = WorldGenerationParams::default();
        params.placement.map_size = Some(120.0);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::OutOfRange { field: "map_size", .. })
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "width = \"wide\"").unwrap();
        assert!(matches!(
            WorldGenerationParams::from_toml_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_biome_is_uninhabitable() {
        let table = BiomeTable::default();
        assert_eq!(table.habitability(6), 100);
        assert_eq!(table.habitability(200), 0);
    }
}
