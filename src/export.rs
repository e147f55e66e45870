// src/export.rs
//! Отладочные растры и сводка мира
//!
//! Каждый пиксель окрашивается по ближайшей ячейке уточнённой сетки.
//! Поиск ячеек выполняется один раз в [`CellRaster`], после чего все слои
//! строятся простым отображением «ячейка → цвет».

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::biome::Biome;
use crate::error::ExportError;
use crate::grid::{Grid, MAX_HEIGHT};
use crate::mesh::PackCellId;
use crate::pack::Pack;
use crate::pipeline::{World, WorldSummary};
use crate::rivers::MIN_FLUX_TO_FORM_RIVER;

const RIVER_COLOR: Rgb<u8> = Rgb([40, 90, 200]);
const EMPTY: [u8; 3] = [0, 0, 0];

/// Ячейка под каждым пикселем изображения
#[derive(Debug, Clone)]
pub struct CellRaster {
    pub width: u32,
    pub height: u32,
    /// Масштаб «пиксели на единицу карты»
    scale_x: f64,
    scale_y: f64,
    cells: Vec<Option<PackCellId>>,
}

impl CellRaster {
    /// Растр `width × height` пикселей для карты `map_width × map_height`
    #[must_use]
    pub fn new(pack: &Pack, map_width: f64, map_height: f64, width: u32, height: u32) -> Self {
        let scale_x = f64::from(width) / map_width;
        let scale_y = f64::from(height) / map_height;
        let lookup = |index: usize| {
            let x = (index % width as usize) as f64 + 0.5;
            let y = (index / width as usize) as f64 + 0.5;
            pack.q.find(x / scale_x, y / scale_y, None)
        };
        let total = width as usize * height as usize;

        #[cfg(feature = "parallel")]
        let cells = (0..total).into_par_iter().map(lookup).collect();
        #[cfg(not(feature = "parallel"))]
        let cells = (0..total).map(lookup).collect();

        Self {
            width,
            height,
            scale_x,
            scale_y,
            cells,
        }
    }

    #[must_use]
    pub fn cell_at(&self, x: u32, y: u32) -> Option<PackCellId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .flatten()
    }

    fn gray(&self, value: impl Fn(PackCellId) -> u8) -> GrayImage {
        let data = self.cells.iter().map(|c| c.map_or(0, &value)).collect();
        ImageBuffer::from_raw(self.width, self.height, data).unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    fn rgb(&self, color: impl Fn(PackCellId) -> [u8; 3]) -> RgbImage {
        let data = self
            .cells
            .iter()
            .flat_map(|c| c.map_or(EMPTY, &color))
            .collect();
        ImageBuffer::from_raw(self.width, self.height, data).unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Высота в оттенках серого
#[must_use]
pub fn elevation_image(pack: &Pack, raster: &CellRaster) -> GrayImage {
    raster.gray(|i| (u32::from(pack.cells.h[i]) * 255 / u32::from(MAX_HEIGHT)) as u8)
}

/// Температура исходной ячейки: от синего (−30 °C) к красному (+30 °C)
#[must_use]
pub fn temperature_image(pack: &Pack, grid: &Grid, raster: &CellRaster) -> RgbImage {
    raster.rgb(|i| {
        let t = f64::from(grid.cells.temp[pack.cells.g[i]]);
        let k = ((t + 30.0) / 60.0).clamp(0.0, 1.0);
        [(k * 255.0) as u8, 64, ((1.0 - k) * 255.0) as u8]
    })
}

/// Осадки исходной ячейки
#[must_use]
pub fn precipitation_image(pack: &Pack, grid: &Grid, raster: &CellRaster) -> GrayImage {
    raster.gray(|i| grid.cells.prec[pack.cells.g[i]])
}

/// Население, нормированное на максимум
#[must_use]
pub fn population_image(pack: &Pack, raster: &CellRaster) -> GrayImage {
    let max = pack.cells.pop.iter().copied().fold(0.0f32, f32::max);
    raster.gray(|i| {
        if max > 0.0 {
            (pack.cells.pop[i] / max * 255.0) as u8
        } else {
            0
        }
    })
}

/// Биомы с реками поверх
#[must_use]
pub fn biome_image(pack: &Pack, raster: &CellRaster) -> RgbImage {
    let mut img = raster.rgb(|i| Biome::from_id(pack.cells.biome[i]).map_or(EMPTY, Biome::to_rgb));
    for i in pack.ids() {
        let flux = f64::from(pack.cells.fl[i]);
        if pack.cells.r[i] == 0 || flux < MIN_FLUX_TO_FORM_RIVER {
            continue;
        }
        let [x, y] = pack.cells.p[i];
        let center = ((x * raster.scale_x) as i32, (y * raster.scale_y) as i32);
        // Толщина растёт с логарифмом стока
        let radius = (flux / MIN_FLUX_TO_FORM_RIVER).log2().max(0.0) as i32 / 2 + 1;
        draw_filled_circle_mut(&mut img, center, radius, RIVER_COLOR);
    }
    img
}

/// Записывает сводку в JSON
pub fn write_summary(summary: &WorldSummary, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}

/// Сохраняет сводку и все растры в каталог `dir`
pub fn save_world(world: &World, dir: &Path, width: u32, height: u32) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let summary_path = dir.join("summary.json");
    write_summary(&world.summary, &summary_path)?;
    let mut written = vec![summary_path];

    let raster = CellRaster::new(&world.pack, world.grid.width, world.grid.height, width, height);
    let (pack, grid) = (&world.pack, &world.grid);

    let path = dir.join("elevation.png");
    elevation_image(pack, &raster).save(&path)?;
    written.push(path);

    let path = dir.join("temperature.png");
    temperature_image(pack, grid, &raster).save(&path)?;
    written.push(path);

    let path = dir.join("precipitation.png");
    precipitation_image(pack, grid, &raster).save(&path)?;
    written.push(path);

    let path = dir.join("population.png");
    population_image(pack, &raster).save(&path)?;
    written.push(path);

    let path = dir.join("biomes.png");
    biome_image(pack, &raster).save(&path)?;
    written.push(path);

    info!("saved {} files to {}", written.len(), dir.display());
    Ok(written)
}
