// src/biome.rs
//! Биомы и типы озёр уточнённой сетки
//!
//! Биом выбирается по матрице «влажность × температура» с особыми случаями
//! для ледников, жарких пустынь и болот. Тип озера зависит от его температуры,
//! высоты берегов, размера и баланса притока и испарения.

use serde::{Deserialize, Serialize};

use crate::climate::precipitation_modifier;
use crate::features::{FeatureKind, LakeGroup};
use crate::grid::{Grid, MIN_LAND_HEIGHT};
use crate::mesh::{CellIndex, PackCellId};
use crate::pack::Pack;
use crate::rivers::Drainage;
use crate::rng::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Marine = 0,
    HotDesert = 1,
    ColdDesert = 2,
    Savanna = 3,
    Grassland = 4,
    TropicalSeasonalForest = 5,
    TemperateDeciduousForest = 6,
    TropicalRainforest = 7,
    TemperateRainforest = 8,
    Taiga = 9,
    Tundra = 10,
    Glacier = 11,
    Wetland = 12,
}

const ALL_BIOMES: [Biome; 13] = [
    Biome::Marine,
    Biome::HotDesert,
    Biome::ColdDesert,
    Biome::Savanna,
    Biome::Grassland,
    Biome::TropicalSeasonalForest,
    Biome::TemperateDeciduousForest,
    Biome::TropicalRainforest,
    Biome::TemperateRainforest,
    Biome::Taiga,
    Biome::Tundra,
    Biome::Glacier,
    Biome::Wetland,
];

impl Biome {
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        ALL_BIOMES.get(id as usize).copied()
    }

    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn to_rgb(self) -> [u8; 3] {
        match self {
            Biome::Marine => [70, 110, 171],
            Biome::HotDesert => [251, 231, 159],
            Biome::ColdDesert => [181, 184, 135],
            Biome::Savanna => [210, 208, 130],
            Biome::Grassland => [200, 214, 143],
            Biome::TropicalSeasonalForest => [182, 217, 93],
            Biome::TemperateDeciduousForest => [41, 188, 86],
            Biome::TropicalRainforest => [125, 203, 53],
            Biome::TemperateRainforest => [64, 156, 67],
            Biome::Taiga => [75, 107, 50],
            Biome::Tundra => [150, 120, 75],
            Biome::Glacier => [213, 231, 235],
            Biome::Wetland => [11, 145, 49],
        }
    }
}

use Biome::{
    ColdDesert as CD, Grassland as GR, HotDesert as HD, Savanna as SV, Taiga as TA,
    TemperateDeciduousForest as TD, TemperateRainforest as TR, TropicalRainforest as RF,
    TropicalSeasonalForest as TS, Tundra as TU,
};

/// Жарко ↔ холодно (от >19°C до <-4°C); сухо ↕ влажно
const BIOME_MATRIX: [[Biome; 26]; 5] = [
    [
        HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, CD, CD, CD, CD, CD, CD, CD, CD, CD, CD, CD, CD, TU, TU, TU, TU,
    ],
    [
        SV, SV, SV, GR, GR, GR, GR, GR, GR, GR, GR, GR, GR, GR, GR, TA, TA, TA, TA, TA, TA, TU, TU, TU, TU, TU,
    ],
    [
        TS, TD, TD, TD, TD, TD, TD, TD, TD, TD, TD, TD, TD, TD, TD, TA, TA, TA, TA, TA, TA, TU, TU, TU, TU, TU,
    ],
    [
        TS, RF, RF, RF, RF, RF, RF, TR, TR, TR, TR, TR, TR, TR, TR, TR, TR, TA, TA, TA, TA, TA, TU, TU, TU, TU,
    ],
    [
        RF, RF, RF, RF, RF, TR, TR, TR, TR, TR, TR, TR, TR, TR, TR, TR, TR, TA, TA, TA, TA, TA, TU, TU, TU, TU,
    ],
];

// Пороги болот: у побережья и вдали от него
const WET_LAND_MOISTURE_COAST: f64 = 40.0;
const WET_LAND_MOISTURE_OFF_COAST: f64 = 24.0;
const WET_LAND_TEMPERATURE: i8 = -2;
const WET_LAND_HEIGHT_COAST: u8 = 25;
const WET_LAND_HEIGHT_MIN_OFF_COAST: u8 = 24;
const WET_LAND_HEIGHT_MAX_OFF_COAST: u8 = 60;

/// Болото: влажная тёплая низина у побережья или во внутренних долинах
#[must_use]
pub fn is_wet_land(moisture: f64, temperature: i8, height: u8) -> bool {
    if temperature <= WET_LAND_TEMPERATURE {
        return false;
    }
    (moisture > WET_LAND_MOISTURE_COAST && height < WET_LAND_HEIGHT_COAST)
        || (moisture > WET_LAND_MOISTURE_OFF_COAST
            && height > WET_LAND_HEIGHT_MIN_OFF_COAST
            && height < WET_LAND_HEIGHT_MAX_OFF_COAST)
}

/// Биом по влажности, температуре, высоте и наличию реки
#[must_use]
pub fn biome_id(moisture: f64, temperature: i8, height: u8, has_river: bool) -> Biome {
    if height < MIN_LAND_HEIGHT {
        return Biome::Marine;
    }
    if temperature < -5 {
        return Biome::Glacier;
    }
    if temperature >= 25 && !has_river && moisture < 8.0 {
        return Biome::HotDesert;
    }
    if is_wet_land(moisture, temperature, height) {
        return Biome::Wetland;
    }
    let moisture_band = ((moisture / 5.0).max(0.0) as usize).min(4);
    let temperature_band = (20 - i32::from(temperature)).clamp(0, 25) as usize;
    BIOME_MATRIX[moisture_band][temperature_band]
}

/// Влажность ячейки: осадки её и соседней суши плюс вклад реки
fn cell_moisture(pack: &Pack, grid: &Grid, cell: PackCellId) -> f64 {
    let cells = &pack.cells;
    let prec = |c: PackCellId| f64::from(grid.cells.prec[cells.g[c]]);

    let mut own = prec(cell);
    if cells.r[cell] != 0 {
        own += (f64::from(cells.fl[cell]) / 10.0).max(2.0);
    }
    let (sum, count) = cells.c[cell]
        .iter()
        .filter(|&&c| pack.is_land(c))
        .fold((own, 1.0), |(sum, count), &c| (sum + prec(c), count + 1.0));
    round_to(4.0 + sum / count, 1)
}

/// Заполняет `pack.cells.biome`
pub fn define_biomes(pack: &mut Pack, grid: &Grid) {
    let biomes: Vec<u8> = pack
        .ids()
        .map(|cell| {
            let height = pack.cells.h[cell];
            let temperature = grid.cells.temp[pack.cells.g[cell]];
            let moisture = if height < MIN_LAND_HEIGHT {
                0.0
            } else {
                cell_moisture(pack, grid, cell)
            };
            biome_id(moisture, temperature, height, pack.cells.r[cell] != 0).id()
        })
        .collect();
    pack.cells.biome = biomes.into_iter().collect();
}

/// Водный баланс озера
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LakeBalance {
    pub cells: usize,
    pub first_cell: usize,
    /// Самый низкий берег
    pub shore_height: u8,
    pub temperature: f64,
    /// Приток рек и стока
    pub inflow: f64,
    /// Приток вместе с осадками на зеркало озера
    pub flux: f64,
    pub evaporation: f64,
}

impl LakeBalance {
    #[must_use]
    pub fn group(&self) -> LakeGroup {
        if self.temperature < -3.0 {
            return LakeGroup::Frozen;
        }
        if self.shore_height > 60 && self.cells < 10 && self.first_cell % 10 == 0 {
            return LakeGroup::Lava;
        }
        if self.inflow <= 0.0 {
            if self.evaporation > self.flux * 4.0 {
                return LakeGroup::Dry;
            }
            if self.cells < 3 && self.first_cell % 10 == 0 {
                return LakeGroup::Sinkhole;
            }
        }
        if self.evaporation > self.flux {
            return LakeGroup::Salt;
        }
        LakeGroup::Freshwater
    }
}

/// Испарение с одной ячейки озера
fn evaporation_per_cell(temperature: f64, height: u8) -> f64 {
    let evaporation = (700.0 * (temperature + 0.006 * f64::from(height))) / 50.0 + 75.0;
    (evaporation / (80.0 - temperature).max(1.0)).max(0.0)
}

/// Определяет тип каждого озера уточнённой сетки
pub fn define_lake_groups(pack: &mut Pack, grid: &Grid, drainage: &Drainage) {
    let modifier = precipitation_modifier(grid.len(), 100);
    let mut balances: Vec<Option<LakeBalance>> = vec![None; pack.features.len()];

    for cell in pack.ids() {
        let feature_id = pack.cells.f[cell];
        let Some(feature) = pack.features.get(feature_id) else {
            continue;
        };
        if feature.kind != FeatureKind::Lake {
            continue;
        }
        let balance = balances[feature_id.0 as usize - 1].get_or_insert(LakeBalance {
            cells: 0,
            first_cell: feature.first_cell,
            shore_height: u8::MAX,
            temperature: 0.0,
            inflow: 0.0,
            flux: 0.0,
            evaporation: 0.0,
        });

        let source = pack.cells.g[cell];
        balance.cells += 1;
        balance.temperature += f64::from(grid.cells.temp[source]);
        balance.inflow += drainage.flux.get(cell.index()).copied().unwrap_or(0.0);
        balance.flux += f64::from(grid.cells.prec[source]) / modifier;
        for &c in &pack.cells.c[cell] {
            if pack.is_land(c) {
                balance.shore_height = balance.shore_height.min(pack.cells.h[c]);
            }
        }
    }

    for (feature, balance) in pack.features.iter_mut().zip(balances) {
        let Some(mut balance) = balance else {
            continue;
        };
        balance.temperature = round_to(balance.temperature / balance.cells as f64, 1);
        if balance.shore_height == u8::MAX {
            balance.shore_height = MIN_LAND_HEIGHT;
        }
        balance.flux += balance.inflow;
        balance.evaporation = round_to(
            evaporation_per_cell(balance.temperature, balance.shore_height) * balance.cells as f64,
            2,
        );
        feature.group = Some(balance.group());
    }
}
