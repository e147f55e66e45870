// src/climate.rs
//! Климат грубой сетки: температура и осадки
//!
//! Температура считается построчно: широта строки задаёт температуру на уровне
//! моря, высота ячейки уменьшает её на 6.5°C на километр.
//! Осадки — перенос влаги ветром по строкам и столбцам сетки.

use log::debug;

use crate::config::ClimateSettings;
use crate::coordinates::MapCoordinates;
use crate::error::CalculationError;
use crate::grid::{Grid, GridCells, MIN_LAND_HEIGHT};
use crate::mesh::{CellIndex, GridCellId};
use crate::rng::{RngExt, WorldRng};

/// Границы тропиков: север, юг
const TROPICS: [f64; 2] = [16.0, -20.0];
const TROPICAL_GRADIENT: f64 = 0.15;

/// Множитель влажности по поясам широты в 5°:
/// x4 — экваториальный пояс, x1 — субтропики, x3 — 50-60°, x0.5 — у полюсов
const LATITUDE_MODIFIER: [f64; 18] = [
    4.0, 2.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.5,
];
/// Выше этой высоты ветер не проходит и отдаёт всю влагу
const MAX_PASSABLE_ELEVATION: u8 = 85;
/// Ниже этой температуры влага не переносится (вечная мерзлота)
const PERMAFROST_TEMPERATURE: i8 = -5;

/// Трёхзонная модель температуры на уровне моря и падение с высотой
#[derive(Debug, Clone, Copy)]
pub struct TemperatureModel {
    equator: f64,
    north_tropic: f64,
    northern_gradient: f64,
    south_tropic: f64,
    southern_gradient: f64,
    exponent: f64,
}

impl TemperatureModel {
    #[must_use]
    pub fn new(climate: &ClimateSettings, exponent: f64) -> Self {
        let equator = climate.temperature_equator;
        let north_tropic = equator - TROPICS[0] * TROPICAL_GRADIENT;
        let south_tropic = equator + TROPICS[1] * TROPICAL_GRADIENT;
        Self {
            equator,
            north_tropic,
            northern_gradient: (north_tropic - climate.temperature_north_pole) / (90.0 - TROPICS[0]),
            south_tropic,
            southern_gradient: (south_tropic - climate.temperature_south_pole) / (90.0 + TROPICS[1]),
            exponent,
        }
    }

    /// Температура на уровне моря для широты в `[-90, 90]`
    #[must_use]
    pub fn sea_level(&self, latitude: f64) -> f64 {
        if (TROPICS[1]..=TROPICS[0]).contains(&latitude) {
            return self.equator - latitude.abs() * TROPICAL_GRADIENT;
        }
        if latitude > 0.0 {
            self.north_tropic - (latitude - TROPICS[0]) * self.northern_gradient
        } else {
            self.south_tropic + (latitude - TROPICS[1]) * self.southern_gradient
        }
    }

    /// Падение температуры с высотой, округлённое до градуса
    ///
    /// # Примеры
    /// ```
    /// use worldgen::climate::TemperatureModel;
    /// use worldgen::config::ClimateSettings;
    ///
    /// let model = TemperatureModel::new(&ClimateSettings::default(), 2.0);
    /// assert_eq!(model.altitude_drop(19), 0.0);
    /// assert_eq!(model.altitude_drop(50), 7.0);
    /// ```
    #[must_use]
    pub fn altitude_drop(&self, height: u8) -> f64 {
        if height < MIN_LAND_HEIGHT {
            return 0.0;
        }
        let h = f64::from(height - 18).powf(self.exponent);
        (h / 1000.0 * 6.5).round()
    }

    /// Итоговая температура ячейки, обрезанная до диапазона `i8`
    #[must_use]
    pub fn temperature(&self, latitude: f64, height: u8) -> i8 {
        (self.sea_level(latitude) - self.altitude_drop(height)).clamp(-128.0, 127.0) as i8
    }
}

/// Заполняет `grid.cells.temp`
///
/// Широта строки берётся по первой точке строки и применяется ко всей строке.
pub fn calculate_temperatures(
    grid: &mut Grid,
    coordinates: &MapCoordinates,
    climate: &ClimateSettings,
    height_exponent: f64,
) -> Result<(), CalculationError> {
    grid.check_rows()?;
    let model = TemperatureModel::new(climate, height_exponent);
    let cells_x = grid.cells_x;

    for (_, row_start) in grid.row_starts() {
        let y = grid.points[row_start][1];
        let latitude = coordinates.latitude_at(y, grid.height);
        for i in row_start.index()..row_start.index() + cells_x {
            let cell = GridCellId::from_index(i);
            grid.cells.temp[cell] = model.temperature(latitude, grid.cells.h[cell]);
        }
    }
    Ok(())
}

/// Источник ветра на краю карты
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindSource {
    /// Начало строки с поправкой влажности по широте
    Weighted {
        cell: GridCellId,
        latitude_modifier: f64,
        tier: usize,
    },
    /// Начало столбца без поправки
    Plain(GridCellId),
}

/// Куда дует ветер данного направления (градусы, 0 — с севера)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct WindDirections {
    west: bool,
    east: bool,
    north: bool,
    south: bool,
}

impl WindDirections {
    fn from_angle(angle: f64) -> Self {
        Self {
            west: angle > 40.0 && angle < 140.0,
            east: angle > 220.0 && angle < 320.0,
            north: angle > 100.0 && angle < 260.0,
            south: angle > 280.0 || angle < 80.0,
        }
    }
}

/// Масштаб осадков: плотность сетки и пользовательская влажность
#[must_use]
pub fn precipitation_modifier(cells: usize, precipitation: u32) -> f64 {
    (cells as f64 / 10_000.0).powf(0.25) * f64::from(precipitation) / 100.0
}

fn latitude_band(latitude: f64) -> usize {
    (((latitude.abs() - 1.0) / 5.0).max(0.0) as usize).min(LATITUDE_MODIFIER.len() - 1)
}

/// Пояс ветров 0..=5 с севера на юг, по 30°
fn wind_tier(latitude: f64) -> usize {
    (((latitude - 89.0).abs() / 30.0) as usize).min(5)
}

/// Заполняет `grid.cells.prec`
///
/// Требует рассчитанной температуры: в мерзлоте влага не переносится.
pub fn generate_precipitation(
    grid: &mut Grid,
    coordinates: &MapCoordinates,
    winds: &[f64; 6],
    precipitation: u32,
    rng: &mut WorldRng,
) -> Result<(), CalculationError> {
    grid.check_rows()?;
    let (cells_x, cells_y) = (grid.cells_x, grid.cells_y);
    let n = grid.len();
    let modifier = precipitation_modifier(n, precipitation);
    grid.cells.prec.iter_mut().for_each(|p| *p = 0);

    let mut westerly = Vec::new();
    let mut easterly = Vec::new();
    let mut northerly = 0usize;
    let mut southerly = 0usize;

    for (row, row_start) in grid.row_starts() {
        let latitude = coordinates.lat_n - (row as f64 / cells_y as f64) * coordinates.lat_t;
        let latitude_modifier = LATITUDE_MODIFIER[latitude_band(latitude)];
        let tier = wind_tier(latitude);
        let directions = WindDirections::from_angle(winds[tier]);

        if directions.west {
            westerly.push(WindSource::Weighted {
                cell: row_start,
                latitude_modifier,
                tier,
            });
        }
        if directions.east {
            easterly.push(WindSource::Weighted {
                cell: GridCellId::from_index(row_start.index() + cells_x - 1),
                latitude_modifier,
                tier,
            });
        }
        northerly += usize::from(directions.north);
        southerly += usize::from(directions.south);
    }

    let mut wind = Wind {
        cells: &mut grid.cells,
        modifier,
        rng,
    };

    if !westerly.is_empty() {
        wind.pass(&westerly, 120.0 * modifier, 1, cells_x);
    }
    if !easterly.is_empty() {
        wind.pass(&easterly, 120.0 * modifier, -1, cells_x);
    }

    let vertical = (northerly + southerly) as f64;
    let mean_modifier = LATITUDE_MODIFIER.iter().sum::<f64>() / LATITUDE_MODIFIER.len() as f64;
    let edge_modifier = |latitude: f64| {
        if coordinates.lat_t > 60.0 {
            mean_modifier
        } else {
            LATITUDE_MODIFIER[latitude_band(latitude)]
        }
    };

    if northerly > 0 {
        let max_prec = northerly as f64 / vertical * 60.0 * modifier * edge_modifier(coordinates.lat_n);
        let sources: Vec<_> = (0..cells_x)
            .map(|i| WindSource::Plain(GridCellId::from_index(i)))
            .collect();
        wind.pass(&sources, max_prec, cells_x as isize, cells_y);
    }
    if southerly > 0 {
        let max_prec = southerly as f64 / vertical * 60.0 * modifier * edge_modifier(coordinates.lat_s);
        let sources: Vec<_> = (n - cells_x..n)
            .map(|i| WindSource::Plain(GridCellId::from_index(i)))
            .collect();
        wind.pass(&sources, max_prec, -(cells_x as isize), cells_y);
    }

    debug!(
        "precipitation: {} westerly, {} easterly, {northerly} northerly, {southerly} southerly rows, modifier {modifier:.3}",
        westerly.len(),
        easterly.len()
    );
    Ok(())
}

/// Состояние переноса влаги
struct Wind<'a> {
    cells: &'a mut GridCells,
    modifier: f64,
    rng: &'a mut WorldRng,
}

impl Wind<'_> {
    /// Проводит ветер от каждого источника на `steps` ячеек с шагом `next`
    fn pass(&mut self, sources: &[WindSource], max_prec: f64, next: isize, steps: usize) {
        for source in sources {
            let (first, max_prec) = match *source {
                WindSource::Weighted {
                    cell,
                    latitude_modifier,
                    ..
                } => (cell, (max_prec * latitude_modifier).min(255.0)),
                WindSource::Plain(cell) => (cell, max_prec),
            };

            let mut humidity = max_prec - f64::from(self.cells.h[first]);
            if humidity <= 0.0 {
                // Первая ячейка слишком высока: ветер сухой
                continue;
            }

            for step in 0..steps {
                let current = cell_at(first, next, step);
                let following = (step + 1 < steps).then(|| cell_at(first, next, step + 1));
                if self.cells.temp[current] < PERMAFROST_TEMPERATURE {
                    continue;
                }

                if self.cells.h[current] < MIN_LAND_HEIGHT {
                    match following {
                        Some(land) if self.cells.h[land] >= MIN_LAND_HEIGHT => {
                            // Осадки на побережье
                            let factor = f64::from(self.rng.rand_int(10, 20));
                            deposit(&mut self.cells.prec[land], (humidity / factor).max(1.0));
                        }
                        _ => {
                            // Над водой ветер набирает влагу
                            humidity = (humidity + 5.0 * self.modifier).min(max_prec);
                            deposit(&mut self.cells.prec[current], 5.0 * self.modifier);
                        }
                    }
                    continue;
                }

                let passable = following.is_none_or(|c| self.cells.h[c] <= MAX_PASSABLE_ELEVATION);
                let precipitation = if passable {
                    self.land_precipitation(humidity, current, following)
                } else {
                    humidity
                };
                deposit(&mut self.cells.prec[current], precipitation);
                let evaporation = if precipitation > 1.5 { 1.0 } else { 0.0 };
                humidity = if passable {
                    (humidity - precipitation + evaporation).clamp(0.0, max_prec)
                } else {
                    0.0
                };
            }
        }
    }

    fn land_precipitation(&self, humidity: f64, current: GridCellId, following: Option<GridCellId>) -> f64 {
        let normal_loss = (humidity / (10.0 * self.modifier)).max(1.0);
        let orographic = following.map_or(0.0, |next| {
            let next_height = f64::from(self.cells.h[next]);
            let diff = (next_height - f64::from(self.cells.h[current])).max(0.0);
            diff * (next_height / 70.0).powi(2)
        });
        (normal_loss + orographic).max(1.0).min(humidity)
    }
}

fn cell_at(first: GridCellId, next: isize, step: usize) -> GridCellId {
    GridCellId::from_index((first.index() as isize + next * step as isize) as usize)
}

/// Добавляет осадки с насыщением на 255
fn deposit(prec: &mut u8, amount: f64) {
    *prec = (f64::from(*prec) + amount).clamp(0.0, 255.0) as u8;
}
