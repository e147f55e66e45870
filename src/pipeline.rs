// src/pipeline.rs
//! Конвейер генерации мира
//!
//! Порядок этапов фиксирован: сетка → рельеф → объекты → озёра → положение
//! на глобусе → температура → осадки → уточнённая сетка → реки → биомы →
//! пригодность. Все случайные числа берутся из одного генератора, созданного
//! по сиду, поэтому одинаковые параметры дают одинаковый мир.

use std::time::Instant;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::biome::{define_biomes, define_lake_groups};
use crate::climate::{calculate_temperatures, generate_precipitation};
use crate::config::WorldGenerationParams;
use crate::coordinates::{MapCoordinates, MapSize, calculate_map_coordinates, define_map_size};
use crate::error::{CalculationError, GenerationError, Stage};
use crate::features::{FeatureKind, check_connectivity, markup_grid, markup_pack, split_disconnected_features};
use crate::grid::{Grid, generate_grid};
use crate::heightmap::{ElevationSource, NoiseHeightmap};
use crate::lakes::{add_lakes_in_deep_depressions, open_near_sea_lakes};
use crate::pack::{Pack, re_graph};
use crate::rivers::generate_rivers;
use crate::rng::seeded;
use crate::suitability::rank_cells;

/// Результат прогона
#[derive(Debug, Clone)]
pub struct World {
    pub grid: Grid,
    pub pack: Pack,
    pub map_size: MapSize,
    pub coordinates: MapCoordinates,
    pub summary: WorldSummary,
}

/// Краткая сводка мира для `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSummary {
    pub seed: String,
    pub grid_cells: usize,
    pub pack_cells: usize,
    /// Доля суши на грубой сетке
    pub land_share: f64,
    pub oceans: usize,
    pub lakes: usize,
    pub islands: usize,
    pub rivers: usize,
    pub mean_temperature: f64,
    /// Средние осадки на суше
    pub mean_precipitation: f64,
    pub population: f64,
    pub map_size: MapSize,
    pub coordinates: MapCoordinates,
}

/// Выполняет этап, добавляя к ошибке контекст и замеряя время
fn run_stage<T>(stage: Stage, f: impl FnOnce() -> Result<T, CalculationError>) -> Result<T, GenerationError> {
    let started = Instant::now();
    let result = f().map_err(|source| {
        error!("stage {stage} failed: {source}");
        GenerationError::Calculation { stage, source }
    });
    debug!("stage {stage} took {:?}", started.elapsed());
    result
}

/// Генерирует мир с рельефом по шаблону из конфигурации
pub fn generate_world(params: &WorldGenerationParams) -> Result<World, GenerationError> {
    generate(params, &NoiseHeightmap::new(params.template))
}

/// Генерирует мир с рельефом из внешнего источника
pub fn generate(params: &WorldGenerationParams, elevation: &dyn ElevationSource) -> Result<World, GenerationError> {
    params.validate()?;
    info!(
        "generating world '{}': {}×{}, ~{} cells, {:?}",
        params.seed, params.width, params.height, params.cells_desired, params.template
    );
    let mut rng = seeded(&params.seed);

    let started = Instant::now();
    let mut grid = generate_grid(
        f64::from(params.width),
        f64::from(params.height),
        params.cells_desired as usize,
        &mut rng,
    )
    .inspect_err(|e| error!("stage {} failed: {e}", Stage::Grid))?;
    debug!("stage {} took {:?}: {} cells", Stage::Grid, started.elapsed(), grid.len());

    run_stage(Stage::Heightmap, || {
        let heights = elevation.elevations(&grid, &mut rng)?;
        grid.assign_heights(heights)
    })?;
    if !grid.ids().any(|i| grid.is_land(i)) {
        warn!("heightmap has no land cells");
    }

    run_stage(Stage::Features, || {
        markup_grid(&mut grid);
        Ok(())
    })?;

    run_stage(Stage::Lakes, || {
        let added = add_lakes_in_deep_depressions(&mut grid, params.lake_elevation_limit);
        let opened = open_near_sea_lakes(&mut grid, params.template);
        debug!("lakes: {added} added in depressions, {opened} breached");
        Ok(())
    })?;

    run_stage(Stage::Features, || {
        let split = split_disconnected_features(&mut grid);
        if split > 0 {
            debug!("features: {split} disconnected parts split off");
        }
        check_connectivity(&grid.cells.h, &grid.cells.f, &grid.cells.c, &grid.features)
    })?;

    let (map_size, coordinates) = run_stage(Stage::Placement, || {
        let size = define_map_size(params.template, &grid.features, &params.placement, &mut rng);
        let coordinates = calculate_map_coordinates(&size, grid.width, grid.height);
        debug!("placement: {size:?} → {coordinates:?}");
        Ok((size, coordinates))
    })?;

    run_stage(Stage::Temperature, || {
        calculate_temperatures(&mut grid, &coordinates, &params.climate, params.height_exponent)
    })?;

    run_stage(Stage::Precipitation, || {
        generate_precipitation(
            &mut grid,
            &coordinates,
            &params.climate.winds,
            params.precipitation,
            &mut rng,
        )
    })?;

    let mut pack = run_stage(Stage::ReGraph, || {
        let mut pack = re_graph(&grid)?;
        markup_pack(&mut pack);
        check_connectivity(&pack.cells.h, &pack.cells.f, &pack.cells.c, &pack.features)?;
        Ok(pack)
    })?;

    let drainage = run_stage(Stage::Rivers, || Ok(generate_rivers(&mut pack, &grid)))?;

    run_stage(Stage::Biomes, || {
        define_biomes(&mut pack, &grid);
        define_lake_groups(&mut pack, &grid, &drainage);
        Ok(())
    })?;

    run_stage(Stage::Suitability, || {
        rank_cells(&mut pack, &params.biomes);
        Ok(())
    })?;

    let summary = summarize(params, &grid, &pack, drainage.rivers, map_size, coordinates);
    info!(
        "world '{}' ready: {} pack cells, {} rivers, population {:.0}",
        summary.seed, summary.pack_cells, summary.rivers, summary.population
    );

    Ok(World {
        grid,
        pack,
        map_size,
        coordinates,
        summary,
    })
}

fn summarize(
    params: &WorldGenerationParams,
    grid: &Grid,
    pack: &Pack,
    rivers: usize,
    map_size: MapSize,
    coordinates: MapCoordinates,
) -> WorldSummary {
    let n = grid.len().max(1) as f64;
    let land: Vec<_> = grid.ids().filter(|&i| grid.is_land(i)).collect();
    let mean_precipitation = if land.is_empty() {
        0.0
    } else {
        land.iter().map(|&i| f64::from(grid.cells.prec[i])).sum::<f64>() / land.len() as f64
    };

    WorldSummary {
        seed: params.seed.clone(),
        grid_cells: grid.len(),
        pack_cells: pack.len(),
        land_share: land.len() as f64 / n,
        oceans: pack.features.count(FeatureKind::Ocean),
        lakes: pack.features.count(FeatureKind::Lake),
        islands: pack.features.count(FeatureKind::Island),
        rivers,
        mean_temperature: grid.cells.temp.iter().map(|&t| f64::from(t)).sum::<f64>() / n,
        mean_precipitation,
        population: pack.cells.pop.iter().map(|&p| f64::from(p)).sum(),
        map_size,
        coordinates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_carries_context() {
        let result: Result<(), _> = run_stage(Stage::Rivers, || Err(CalculationError::EmptyMesh));
        let err = result.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Rivers));
        assert!(err.to_string().contains("rivers"));
    }

    #[test]
    fn test_stage_passes_value_through() {
        let value = run_stage(Stage::Grid, || Ok(42)).unwrap();
        assert_eq!(value, 42);
    }
}
