// src/grid.rs
//! Грубая сетка (`Grid`) — исходная поверхность симуляции
//!
//! Точки раскладываются регулярной решёткой с шагом `spacing` и случайным
//! смещением, затем по ним строится диаграмма Вороного. Ячейки хранятся
//! построчно: ячейка `row * cells_x + col`, что позволяет климату работать по строкам.

use rand::Rng;

use crate::error::{CalculationError, ConfigError, GenerationError, Stage};
use crate::features::{FeatureId, Features};
use crate::mesh::{CellVec, GridCellId, Point};
use crate::rng::{WorldRng, round_to};
use crate::voronoi::calculate_voronoi;

/// Минимальная высота суши
pub const MIN_LAND_HEIGHT: u8 = 20;
/// Максимальная высота воды
pub const MAX_WATER_HEIGHT: u8 = 19;
/// Верхняя граница высоты
pub const MAX_HEIGHT: u8 = 100;

const SPACING_RADIUS_RATIO: f64 = 0.5;
const JITTERING_MULTIPLIER: f64 = 0.9;

/// Свойства ячеек грубой сетки
#[derive(Debug, Clone, Default)]
pub struct GridCells {
    /// Соседи
    pub c: CellVec<GridCellId, Vec<GridCellId>>,
    /// Касается внешней границы карты
    pub b: CellVec<GridCellId, bool>,
    /// Высота 0..=100, суша при h ≥ 20
    pub h: CellVec<GridCellId, u8>,
    /// Расстояние до берега: 1 — берег суши, -1 — берег воды, ≤ -2 — глубокая вода
    pub t: CellVec<GridCellId, i8>,
    /// Объект (океан, озеро, остров)
    pub f: CellVec<GridCellId, FeatureId>,
    /// Температура, °C
    pub temp: CellVec<GridCellId, i8>,
    /// Осадки
    pub prec: CellVec<GridCellId, u8>,
}

/// Грубая сетка
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub width: f64,
    pub height: f64,
    pub cells_desired: usize,
    /// Номинальное расстояние между точками, всегда > 0
    pub spacing: f64,
    pub cells_x: usize,
    pub cells_y: usize,
    pub points: CellVec<GridCellId, Point>,
    /// Кольцо точек за пределами карты, замыкающее диаграмму
    pub boundary: Vec<Point>,
    pub cells: GridCells,
    pub features: Features,
}

impl Grid {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn is_land(&self, id: GridCellId) -> bool {
        self.cells.h[id] >= MIN_LAND_HEIGHT
    }

    pub fn ids(&self) -> impl Iterator<Item = GridCellId> + use<> {
        (0..self.len()).map(|i| GridCellId(i as u32))
    }

    /// Первая ячейка каждой строки
    pub fn row_starts(&self) -> impl Iterator<Item = (usize, GridCellId)> + use<> {
        let cells_x = self.cells_x.max(1);
        (0..self.cells_y).map(move |row| (row, GridCellId((row * cells_x) as u32)))
    }

    /// Присваивает высоты от внешнего генератора рельефа
    pub fn assign_heights(&mut self, heights: Vec<u8>) -> Result<(), CalculationError> {
        if heights.len() != self.len() {
            return Err(CalculationError::LengthMismatch {
                field: "heights",
                expected: self.len(),
                actual: heights.len(),
            });
        }
        if let Some((cell, &value)) = heights.iter().enumerate().find(|&(_, &h)| h > MAX_HEIGHT) {
            return Err(CalculationError::ElevationOutOfRange { cell, value });
        }
        self.cells.h = CellVec::from_vec(heights);
        Ok(())
    }

    /// Проверяет, что строки сетки согласованы с числом ячеек
    pub fn check_rows(&self) -> Result<(), CalculationError> {
        if self.cells_x * self.cells_y != self.len() || self.is_empty() {
            return Err(CalculationError::RowLayout {
                cells: self.len(),
                cells_x: self.cells_x,
                cells_y: self.cells_y,
            });
        }
        Ok(())
    }
}

/// Шаг решётки для `cells_desired` ячеек на карте `width × height`
///
/// Округляется до сотых, поэтому при слишком плотной сетке становится нулём.
#[must_use]
pub fn cell_spacing(width: f64, height: f64, cells_desired: usize) -> f64 {
    round_to((width * height / cells_desired as f64).sqrt(), 2)
}

/// Строит сетку `width × height` примерно из `cells_desired` ячеек
pub fn generate_grid(
    width: f64,
    height: f64,
    cells_desired: usize,
    rng: &mut WorldRng,
) -> Result<Grid, GenerationError> {
    if !(width > 0.0 && height > 0.0) {
        return Err(ConfigError::NonPositiveDimensions {
            width: width.max(0.0) as u32,
            height: height.max(0.0) as u32,
        }
        .into());
    }
    if cells_desired == 0 {
        return Err(ConfigError::ZeroCells.into());
    }

    let spacing = cell_spacing(width, height, cells_desired);
    if spacing <= 0.0 {
        return Err(ConfigError::CellsTooDense {
            cells_desired,
            width: width as u32,
            height: height as u32,
        }
        .into());
    }
    let boundary = boundary_points(width, height, spacing);
    let (points, cells_x, cells_y) = jittered_grid(width, height, spacing, rng);

    let voronoi = calculate_voronoi(&points, &boundary).map_err(|source| {
        GenerationError::Calculation {
            stage: Stage::Grid,
            source,
        }
    })?;

    let n = points.len();
    let cells = GridCells {
        c: voronoi
            .neighbors
            .into_iter()
            .map(|ns| ns.into_iter().map(|c| GridCellId(c as u32)).collect())
            .collect(),
        b: CellVec::from_vec(voronoi.border),
        h: CellVec::filled(n, 0),
        t: CellVec::filled(n, 0),
        f: CellVec::filled(n, FeatureId::UNMARKED),
        temp: CellVec::filled(n, 0),
        prec: CellVec::filled(n, 0),
    };

    Ok(Grid {
        width,
        height,
        cells_desired,
        spacing,
        cells_x,
        cells_y,
        points: CellVec::from_vec(points),
        boundary,
        cells,
        features: Features::default(),
    })
}

/// Решётка со случайным смещением каждой точки в пределах 0.9 радиуса
fn jittered_grid(width: f64, height: f64, spacing: f64, rng: &mut WorldRng) -> (Vec<Point>, usize, usize) {
    let radius = spacing * SPACING_RADIUS_RATIO;
    let jittering = radius * JITTERING_MULTIPLIER;
    let double_jittering = jittering * 2.0;

    let cells_x = (((width + 0.5 * spacing - 1e-10) / spacing).floor() as usize).max(1);
    let cells_y = (((height + 0.5 * spacing - 1e-10) / spacing).floor() as usize).max(1);

    let mut points = Vec::with_capacity(cells_x * cells_y);
    for row in 0..cells_y {
        let y = radius + row as f64 * spacing;
        for col in 0..cells_x {
            let x = radius + col as f64 * spacing;
            let jx = rng.gen_range(0.0..1.0) * double_jittering - jittering;
            let jy = rng.gen_range(0.0..1.0) * double_jittering - jittering;
            let xj = round_to(x + jx, 2).clamp(0.0, width);
            let yj = round_to(y + jy, 2).clamp(0.0, height);
            points.push([xj, yj]);
        }
    }
    (points, cells_x, cells_y)
}

/// Граничные точки на расстоянии `spacing` от края с шагом `2 * spacing`
fn boundary_points(width: f64, height: f64, spacing: f64) -> Vec<Point> {
    let offset = (-spacing).round();
    let b_spacing = spacing * 2.0;
    let w = width - offset * 2.0;
    let h = height - offset * 2.0;
    let number_x = ((w / b_spacing).ceil() - 1.0).max(1.0);
    let number_y = ((h / b_spacing).ceil() - 1.0).max(1.0);

    let mut points = Vec::new();
    let mut i = 0.5;
    while i < number_x {
        let x = (w * i / number_x + offset).ceil();
        points.push([x, offset]);
        points.push([x, h + offset]);
        i += 1.0;
    }
    let mut i = 0.5;
    while i < number_y {
        let y = (h * i / number_y + offset).ceil();
        points.push([offset, y]);
        points.push([w + offset, y]);
        i += 1.0;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CellIndex;
    use crate::rng::seeded;

    #[test]
    fn test_cell_count_matches_request() {
        let mut rng = seeded("grid");
        let grid = generate_grid(1000.0, 1000.0, 100, &mut rng).unwrap();
        assert_eq!(grid.spacing, 100.0);
        assert_eq!((grid.cells_x, grid.cells_y), (10, 10));
        assert_eq!(grid.len(), 100);
        grid.check_rows().unwrap();
    }

    #[test]
    fn test_point_count_close_to_desired_for_wide_map() {
        let mut rng = seeded("wide");
        let grid = generate_grid(1920.0, 1080.0, 5000, &mut rng).unwrap();
        let ratio = grid.len() as f64 / 5000.0;
        assert!((0.95..=1.05).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn test_jitter_stays_within_radius() {
        let mut rng = seeded("jitter");
        let grid = generate_grid(1000.0, 500.0, 200, &mut rng).unwrap();
        let radius = grid.spacing / 2.0;
        for (id, p) in grid.points.iter_enumerated() {
            let row = id.index() / grid.cells_x;
            let col = id.index() % grid.cells_x;
            let cx = radius + col as f64 * grid.spacing;
            let cy = radius + row as f64 * grid.spacing;
            assert!((p[0] - cx).abs() <= radius * 0.9 + 0.01);
            assert!((p[1] - cy).abs() <= radius * 0.9 + 0.01);
            assert!(p[0] >= 0.0 && p[0] <= 1000.0 && p[1] >= 0.0 && p[1] <= 500.0);
        }
    }

    #[test]
    fn test_same_seed_same_grid() {
        let a = generate_grid(800.0, 600.0, 300, &mut seeded("42")).unwrap();
        let b = generate_grid(800.0, 600.0, 300, &mut seeded("42")).unwrap();
        assert_eq!(a.points, b.points);
        assert_eq!(a.cells.c, b.cells.c);
        assert_eq!(a.cells.b, b.cells.b);
    }

    #[test]
    fn test_outer_ring_is_border() {
        let grid = generate_grid(1000.0, 1000.0, 100, &mut seeded("ring")).unwrap();
        for corner in [0, 9, 90, 99] {
            assert!(grid.cells.b[GridCellId(corner)]);
        }
        for id in grid.ids() {
            let (row, col) = (id.index() / 10, id.index() % 10);
            let inner = (2..8).contains(&row) && (2..8).contains(&col);
            if inner {
                assert!(!grid.cells.b[id], "inner cell {id} marked as border");
            }
        }
    }

    #[test]
    fn test_non_positive_dimensions_rejected() {
        let err = generate_grid(0.0, 100.0, 10, &mut seeded("x")).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Configuration(ConfigError::NonPositiveDimensions { .. })
        ));
        let err = generate_grid(100.0, 100.0, 0, &mut seeded("x")).unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(ConfigError::ZeroCells)));
    }

    #[test]
    fn test_zero_spacing_rejected() {
        assert_eq!(cell_spacing(1.0, 1.0, 100_000), 0.0);
        let err = generate_grid(1.0, 1.0, 100_000, &mut seeded("dense")).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Configuration(ConfigError::CellsTooDense { cells_desired: 100_000, .. })
        ));
    }

    #[test]
    fn test_assign_heights_validates() {
        let mut grid = generate_grid(300.0, 300.0, 9, &mut seeded("h")).unwrap();
        assert!(grid.assign_heights(vec![0; 3]).is_err());
        assert!(matches!(
            grid.assign_heights(vec![101; 9]),
            Err(CalculationError::ElevationOutOfRange { cell: 0, value: 101 })
        ));
        grid.assign_heights(vec![50; 9]).unwrap();
        assert!(grid.is_land(GridCellId(4)));
    }
}
