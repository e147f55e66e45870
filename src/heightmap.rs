// src/heightmap.rs
//! Источник высот для грубой сетки
//!
//! Ядро не строит рельеф само: высоты поставляет реализация [`ElevationSource`].
//! Встроенный [`NoiseHeightmap`] сэмплирует фрактальный шум в точках сетки,
//! ослабляет его к краям карты по шаблону и подгоняет уровень моря под
//! целевую долю суши.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::Template;
use crate::error::CalculationError;
use crate::grid::{Grid, MAX_HEIGHT, MAX_WATER_HEIGHT, MIN_LAND_HEIGHT};
use crate::mesh::Point;
use crate::rng::WorldRng;

/// Внешний генератор рельефа
pub trait ElevationSource {
    /// Высота 0..=100 для каждой ячейки сетки, в порядке индексов
    fn elevations(&self, grid: &Grid, rng: &mut WorldRng) -> Result<Vec<u8>, CalculationError>;
}

/// Готовый массив высот (например, загруженный из файла)
#[derive(Debug, Clone)]
pub struct FixedHeights(pub Vec<u8>);

impl ElevationSource for FixedHeights {
    fn elevations(&self, grid: &Grid, _rng: &mut WorldRng) -> Result<Vec<u8>, CalculationError> {
        if self.0.len() != grid.len() {
            return Err(CalculationError::LengthMismatch {
                field: "heights",
                expected: grid.len(),
                actual: self.0.len(),
            });
        }
        Ok(self.0.clone())
    }
}

/// Рельеф из шума OpenSimplex2 с фрактальным FBm
#[derive(Debug, Clone, Copy)]
pub struct NoiseHeightmap {
    pub template: Template,
    /// Число октав шума
    pub octaves: i32,
    /// Характерное число «материков» по большей стороне карты
    pub scale: f32,
}

impl NoiseHeightmap {
    #[must_use]
    pub fn new(template: Template) -> Self {
        // Адаптируем октавы и масштаб под шаблон
        let (octaves, scale) = match template {
            Template::Pangea | Template::Mediterranean | Template::Taklamakan => (3, 1.5),
            Template::Archipelago | Template::Shattered | Template::Fractious => (4, 4.0),
            Template::Atoll | Template::Volcano => (3, 1.0),
            _ => (5, 2.5),
        };
        Self {
            template,
            octaves,
            scale,
        }
    }

    fn noise(&self, seed: i32, grid: &Grid) -> FastNoiseLite {
        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(seed));
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(self.octaves));
        noise.set_frequency(Some(self.scale / grid.width.max(grid.height) as f32));
        noise
    }
}

/// Шум в точке, ослабленный к краям карты
fn sample(noise: &FastNoiseLite, [x, y]: Point, width: f64, height: f64, falloff: f32) -> f32 {
    let value = (noise.get_noise_2d(x as f32, y as f32) + 1.0) * 0.5;
    let nx = (x / width * 2.0 - 1.0) as f32;
    let ny = (y / height * 2.0 - 1.0) as f32;
    let distance = (nx * nx + ny * ny).sqrt() / std::f32::consts::SQRT_2;
    value - falloff * distance * distance * 0.6
}

impl ElevationSource for NoiseHeightmap {
    fn elevations(&self, grid: &Grid, rng: &mut WorldRng) -> Result<Vec<u8>, CalculationError> {
        if grid.is_empty() {
            return Err(CalculationError::EmptyMesh);
        }
        let noise = self.noise(rng.gen_range(0..i32::MAX), grid);
        let falloff = self.template.edge_falloff();
        let (width, height) = (grid.width, grid.height);
        let points = grid.points.as_slice();

        #[cfg(feature = "parallel")]
        let values: Vec<f32> = points
            .par_iter()
            .map(|&p| sample(&noise, p, width, height, falloff))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let values: Vec<f32> = points
            .iter()
            .map(|&p| sample(&noise, p, width, height, falloff))
            .collect();

        Ok(quantize(&values, self.template.target_land_ratio()))
    }
}

/// Переводит значения шума в высоты так, чтобы сушей стала доля `land_ratio`
fn quantize(values: &[f32], land_ratio: f32) -> Vec<u8> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    // Подбор уровня моря под долю суши
    let water_cells = ((1.0 - land_ratio.clamp(0.0, 1.0)) * n as f32).round() as usize;
    let sea_level = if water_cells >= n {
        f32::INFINITY
    } else {
        sorted[water_cells]
    };

    let land_span = f32::from(MAX_HEIGHT - MIN_LAND_HEIGHT);
    let water_span = f32::from(MAX_WATER_HEIGHT);
    values
        .iter()
        .map(|&v| {
            if v >= sea_level {
                let t = if max > sea_level { (v - sea_level) / (max - sea_level) } else { 0.0 };
                (f32::from(MIN_LAND_HEIGHT) + (t * land_span).round()).min(f32::from(MAX_HEIGHT)) as u8
            } else {
                let t = if sea_level > min && sea_level.is_finite() {
                    (v - min) / (sea_level - min)
                } else {
                    0.5
                };
                (t * water_span).floor().clamp(0.0, water_span) as u8
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::generate_grid;
    use crate::rng::seeded;

    #[test]
    fn test_land_ratio_matches_template() {
        let grid = generate_grid(1200.0, 800.0, 3000, &mut seeded("noise")).unwrap();
        for template in [Template::Continents, Template::Pangea, Template::Archipelago] {
            let heights = NoiseHeightmap::new(template)
                .elevations(&grid, &mut seeded("noise"))
                .unwrap();
            assert_eq!(heights.len(), grid.len());
            assert!(heights.iter().all(|&h| h <= MAX_HEIGHT));
            let land = heights.iter().filter(|&&h| h >= MIN_LAND_HEIGHT).count() as f32;
            let ratio = land / grid.len() as f32;
            let target = template.target_land_ratio();
            assert!((ratio - target).abs() < 0.02, "{template:?}: {ratio} vs {target}");
        }
    }

    #[test]
    fn test_same_rng_same_heights() {
        let grid = generate_grid(600.0, 600.0, 500, &mut seeded("a")).unwrap();
        let source = NoiseHeightmap::new(Template::HighIsland);
        let a = source.elevations(&grid, &mut seeded("b")).unwrap();
        let b = source.elevations(&grid, &mut seeded("b")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_quantize_covers_full_range() {
        let values: Vec<f32> = (0..100).map(|i| i as f32 / 99.0).collect();
        let heights = quantize(&values, 0.3);
        assert_eq!(heights[0], 0);
        assert_eq!(heights[99], MAX_HEIGHT);
        assert_eq!(heights[70], MIN_LAND_HEIGHT);
        assert!(heights[69] <= MAX_WATER_HEIGHT);
        assert_eq!(heights.iter().filter(|&&h| h >= MIN_LAND_HEIGHT).count(), 30);
    }

    #[test]
    fn test_fixed_heights_length_checked() {
        let grid = generate_grid(300.0, 300.0, 9, &mut seeded("f")).unwrap();
        assert!(FixedHeights(vec![1, 2]).elevations(&grid, &mut seeded("f")).is_err());
        assert_eq!(
            FixedHeights(vec![30; 9]).elevations(&grid, &mut seeded("f")).unwrap(),
            vec![30; 9]
        );
    }
}
