// src/lakes.rs
//! Гидрология грубой сетки: озёра в замкнутых низинах и прорыв прибрежных озёр
//!
//! Оба шага работают по уже размеченной сетке (см. [`crate::features::markup_grid`])
//! и меняют её на месте.

use log::debug;

use crate::config::Template;
use crate::features::{FeatureId, FeatureKind, LAND_COAST, WATER_COAST};
use crate::grid::{Grid, MAX_WATER_HEIGHT, MIN_LAND_HEIGHT};
use crate::mesh::{CellIndex, GridCellId};

/// Значение предела высоты, отключающее поиск озёр в низинах
pub const DEPRESSION_LAKES_DISABLED: u8 = 80;

/// Максимальная высота перемычки, которую может прорвать вода
pub const BREACH_LIMIT: u8 = 22;

/// Добавляет озёра в низинах, из которых вода не может стечь
///
/// Сначала замкнутые водоёмы, найденные разметкой, поднимаются до уровня
/// озера ([`level_lakes`]). Затем для каждой внутренней ячейки суши,
/// являющейся локальным минимумом, ищется путь к воде через ячейки ниже
/// `h + elevation_limit`. Если путь не найден, ячейка и её соседи той же
/// высоты становятся новым озером. Возвращает число добавленных озёр.
pub fn add_lakes_in_deep_depressions(grid: &mut Grid, elevation_limit: u8) -> usize {
    level_lakes(grid);
    if elevation_limit >= DEPRESSION_LAKES_DISABLED {
        return 0;
    }

    let n = grid.len();
    // Отметки посещения с номером обхода, чтобы не чистить массив каждый раз
    let mut checked = vec![0u32; n];
    let mut stamp = 0u32;
    let mut queue = Vec::new();
    let mut added = 0;

    for i in grid.ids() {
        let cells = &grid.cells;
        if cells.b[i] || cells.h[i] < MIN_LAND_HEIGHT {
            continue;
        }
        let Some(min_height) = cells.c[i].iter().map(|&c| cells.h[c]).min() else {
            continue;
        };
        if cells.h[i] > min_height {
            continue;
        }

        stamp += 1;
        let threshold = u16::from(cells.h[i]) + u16::from(elevation_limit);
        let mut deep = true;
        queue.clear();
        queue.push(i);
        checked[i.index()] = stamp;

        'search: while let Some(q) = queue.pop() {
            for &c in &cells.c[q] {
                if checked[c.index()] == stamp || u16::from(cells.h[c]) >= threshold {
                    continue;
                }
                if cells.h[c] < MIN_LAND_HEIGHT {
                    deep = false;
                    break 'search;
                }
                checked[c.index()] = stamp;
                queue.push(c);
            }
        }

        if deep {
            let mut lake_cells = vec![i];
            lake_cells.extend(cells.c[i].iter().copied().filter(|&c| cells.h[c] == cells.h[i]));
            add_lake(grid, &lake_cells);
            added += 1;
        }
    }

    debug!("added {added} depression lakes (elevation limit {elevation_limit})");
    added
}

/// Поднимает дно всех озёр до [`MAX_WATER_HEIGHT`]
///
/// Возвращает число изменённых ячеек.
pub fn level_lakes(grid: &mut Grid) -> usize {
    let mut raised = 0;
    for i in grid.ids() {
        let lake = grid.features.get(grid.cells.f[i]).is_some_and(|f| f.kind == FeatureKind::Lake);
        if lake && grid.cells.h[i] < MAX_WATER_HEIGHT {
            grid.cells.h[i] = MAX_WATER_HEIGHT;
            raised += 1;
        }
    }
    raised
}

fn add_lake(grid: &mut Grid, lake_cells: &[GridCellId]) {
    let lake = grid.features.push(FeatureKind::Lake, false, false);
    let cells = &mut grid.cells;
    for &i in lake_cells {
        cells.h[i] = MAX_WATER_HEIGHT;
        cells.t[i] = WATER_COAST;
        cells.f[i] = lake;
    }
    for &i in lake_cells {
        for k in 0..cells.c[i].len() {
            let n = cells.c[i][k];
            if !lake_cells.contains(&n) {
                cells.t[n] = LAND_COAST;
            }
        }
    }
    let feature = &mut grid.features[lake];
    feature.cells = lake_cells.len();
    feature.first_cell = lake_cells.iter().map(|c| c.index()).min().unwrap_or(0);
}

/// Прорывает озёра, отделённые от океана низкой перемычкой
///
/// Слабое место — прибрежная ячейка суши рядом с озером высотой не более
/// [`BREACH_LIMIT`], у которой есть сосед-океан. Первое найденное слабое место
/// (по возрастанию индекса ячейки, затем по порядку соседей) становится водой,
/// а всё озеро переходит в соседний океан. Проходы повторяются, пока есть что
/// прорывать: озеро, прорванное в океан, может открыть путь соседнему.
/// Для атоллов шаг пропускается. Возвращает число прорванных озёр.
pub fn open_near_sea_lakes(grid: &mut Grid, template: Template) -> usize {
    if template == Template::Atoll {
        return 0;
    }
    if grid.features.count(FeatureKind::Lake) == 0 {
        return 0;
    }

    let mut opened = 0;
    loop {
        let pass = open_lakes_pass(grid);
        if pass == 0 {
            break;
        }
        opened += pass;
    }
    debug!("opened {opened} near-sea lakes");
    opened
}

fn open_lakes_pass(grid: &mut Grid) -> usize {
    let mut opened = 0;
    for i in grid.ids() {
        let lake = grid.cells.f[i];
        if grid.features.get(lake).map(|f| f.kind) != Some(FeatureKind::Lake) {
            continue;
        }
        if let Some((threshold, ocean)) = find_weak_point(grid, i) {
            opened += remove_lake(grid, threshold, lake, ocean);
        }
    }
    opened
}

fn find_weak_point(grid: &Grid, lake_cell: GridCellId) -> Option<(GridCellId, FeatureId)> {
    let cells = &grid.cells;
    for &c in &cells.c[lake_cell] {
        if cells.t[c] != LAND_COAST || cells.h[c] > BREACH_LIMIT {
            continue;
        }
        for &n in &cells.c[c] {
            let ocean = cells.f[n];
            if grid.features.get(ocean).map(|f| f.kind) == Some(FeatureKind::Ocean) {
                return Some((c, ocean));
            }
        }
    }
    None
}

/// Переводит озеро и все озёра у перемычки в океан; возвращает их число
fn remove_lake(grid: &mut Grid, threshold: GridCellId, lake: FeatureId, ocean: FeatureId) -> usize {
    // Перемычка становится океаном, поэтому соседние с ней озёра тоже выходят к морю
    let mut lakes = vec![lake];
    for &n in &grid.cells.c[threshold] {
        let f = grid.cells.f[n];
        if !lakes.contains(&f) && grid.features.get(f).is_some_and(|x| x.kind == FeatureKind::Lake) {
            lakes.push(f);
        }
    }

    let cells = &mut grid.cells;
    cells.h[threshold] = MAX_WATER_HEIGHT;
    cells.t[threshold] = WATER_COAST;
    cells.f[threshold] = ocean;
    for k in 0..cells.c[threshold].len() {
        let n = cells.c[threshold][k];
        if cells.h[n] >= MIN_LAND_HEIGHT {
            cells.t[n] = LAND_COAST;
        }
    }

    for f in cells.f.iter_mut() {
        if lakes.contains(f) {
            *f = ocean;
        }
    }
    for &id in &lakes {
        grid.features[id].kind = FeatureKind::Ocean;
    }
    debug!(
        "lake {} breached into ocean {} at cell {threshold} ({} lakes merged)",
        lake.0,
        ocean.0,
        lakes.len()
    );
    lakes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::{chain_grid, synthetic_grid};
    use crate::features::{check_connectivity, markup_grid, split_disconnected_features};
    use crate::grid::generate_grid;
    use crate::rng::seeded;

    fn id(i: u32) -> GridCellId {
        GridCellId(i)
    }

    #[test]
    fn test_enclosed_pit_becomes_lake() {
        let mut grid = chain_grid(&[5, 30, 25, 30, 5]);
        markup_grid(&mut grid);
        assert_eq!(add_lakes_in_deep_depressions(&mut grid, 3), 1);

        assert_eq!(grid.cells.h[id(2)], MAX_WATER_HEIGHT);
        assert_eq!(grid.cells.t[id(2)], WATER_COAST);
        assert_eq!(grid.cells.t[id(1)], LAND_COAST);
        assert_eq!(grid.cells.t[id(3)], LAND_COAST);
        let lake = &grid.features[grid.cells.f[id(2)]];
        assert_eq!((lake.kind, lake.land, lake.cells), (FeatureKind::Lake, false, 1));
    }

    #[test]
    fn test_pit_with_escape_path_is_not_a_lake() {
        let mut grid = chain_grid(&[5, 30, 25, 30, 5]);
        markup_grid(&mut grid);
        // Порог 35 пропускает через ячейки высотой 30 к океану
        assert_eq!(add_lakes_in_deep_depressions(&mut grid, 10), 0);
        assert_eq!(grid.cells.h[id(2)], 25);
    }

    #[test]
    fn test_disabled_by_sentinel() {
        let mut grid = chain_grid(&[5, 30, 25, 30, 5]);
        markup_grid(&mut grid);
        assert_eq!(add_lakes_in_deep_depressions(&mut grid, DEPRESSION_LAKES_DISABLED), 0);
    }

    #[test]
    fn test_flat_bottom_lake_takes_equal_neighbors() {
        let mut grid = chain_grid(&[5, 40, 25, 25, 40, 5]);
        markup_grid(&mut grid);
        assert_eq!(add_lakes_in_deep_depressions(&mut grid, 5), 1);
        assert_eq!(grid.cells.h[id(2)], MAX_WATER_HEIGHT);
        assert_eq!(grid.cells.h[id(3)], MAX_WATER_HEIGHT);
        assert_eq!(grid.cells.f[id(2)], grid.cells.f[id(3)]);
        assert_eq!(grid.cells.t[id(1)], LAND_COAST);
        assert_eq!(grid.cells.t[id(4)], LAND_COAST);
    }

    #[test]
    fn test_pit_in_generated_mesh() {
        let mut grid = generate_grid(1000.0, 1000.0, 100, &mut seeded("pit")).unwrap();
        let pit = id(55);
        let heights = grid
            .ids()
            .map(|i| match i {
                _ if i == pit => 22,
                _ if grid.cells.b[i] => 10,
                _ => 35,
            })
            .collect();
        grid.assign_heights(heights).unwrap();
        markup_grid(&mut grid);

        assert_eq!(add_lakes_in_deep_depressions(&mut grid, 10), 1);
        assert_eq!(grid.cells.h[pit], MAX_WATER_HEIGHT);
        assert_eq!(grid.cells.t[pit], WATER_COAST);
        assert_eq!(grid.features[grid.cells.f[pit]].kind, FeatureKind::Lake);
        for &n in &grid.cells.c[pit] {
            assert_eq!(grid.cells.t[n], LAND_COAST);
        }
        split_disconnected_features(&mut grid);
        check_connectivity(&grid.cells.h, &grid.cells.f, &grid.cells.c, &grid.features).unwrap();
    }

    #[test]
    fn test_water_pit_is_marked_as_lake() {
        let mut grid = generate_grid(1000.0, 1000.0, 100, &mut seeded("water-pit")).unwrap();
        let pit = id(44);
        let heights = grid.ids().map(|i| if i == pit { 15 } else { 30 }).collect();
        grid.assign_heights(heights).unwrap();
        markup_grid(&mut grid);

        assert_eq!(add_lakes_in_deep_depressions(&mut grid, 10), 0);
        assert_eq!(grid.features[grid.cells.f[pit]].kind, FeatureKind::Lake);
        assert_eq!(grid.cells.h[pit], MAX_WATER_HEIGHT);
        assert_eq!(grid.cells.t[pit], WATER_COAST);
        for &n in &grid.cells.c[pit] {
            assert_eq!(grid.cells.t[n], LAND_COAST);
        }
    }

    #[test]
    fn test_low_isthmus_is_breached() {
        // океан | перемычка 21 | озеро | суша
        let mut grid = chain_grid(&[5, 10, 21, 15, 40, 30]);
        markup_grid(&mut grid);
        let ocean = grid.cells.f[id(0)];
        let lake = grid.cells.f[id(3)];
        assert_eq!(grid.features[lake].kind, FeatureKind::Lake);

        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 1);
        assert_eq!(grid.cells.h[id(2)], MAX_WATER_HEIGHT);
        assert_eq!(grid.cells.t[id(2)], WATER_COAST);
        assert_eq!(grid.cells.f[id(2)], ocean);
        assert_eq!(grid.cells.f[id(3)], ocean);
        assert_eq!(grid.features[lake].kind, FeatureKind::Ocean);
        assert_eq!(grid.cells.t[id(4)], LAND_COAST);

        // Повторный прорыв ничего не меняет
        let before = grid.cells.h.clone();
        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 0);
        assert_eq!(grid.cells.h, before);
    }

    #[test]
    fn test_lakes_are_leveled_even_when_depressions_disabled() {
        let mut grid = chain_grid(&[5, 30, 12, 30, 5]);
        markup_grid(&mut grid);
        assert_eq!(add_lakes_in_deep_depressions(&mut grid, DEPRESSION_LAKES_DISABLED), 0);
        assert_eq!(grid.cells.h[id(2)], MAX_WATER_HEIGHT);
        // Океан не трогаем
        assert_eq!(grid.cells.h[id(0)], 5);
        assert_eq!(level_lakes(&mut grid), 0);
    }

    #[test]
    fn test_breach_merges_every_lake_at_isthmus() {
        // 0 океан, 1 перемычка, 2 и 3 разные озёра по обе стороны от неё
        let heights = [5, 21, 15, 15, 40, 40];
        let links: [&[u32]; 6] = [&[1], &[0, 2, 3], &[1, 4], &[1, 5], &[2, 5], &[3, 4]];
        let neighbors = links
            .iter()
            .map(|ns| ns.iter().map(|&n| GridCellId(n)).collect())
            .collect();
        let mut grid = synthetic_grid(&heights, neighbors, 6, 1);
        grid.cells.b = (0..6).map(|i| i == 0).collect();
        markup_grid(&mut grid);
        let ocean = grid.cells.f[id(0)];
        let (a, b) = (grid.cells.f[id(2)], grid.cells.f[id(3)]);
        assert_ne!(a, b);
        assert_eq!(grid.features[b].kind, FeatureKind::Lake);

        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 2);
        for i in 1..4 {
            assert_eq!(grid.cells.f[id(i)], ocean);
        }
        assert_eq!(grid.features[a].kind, FeatureKind::Ocean);
        assert_eq!(grid.features[b].kind, FeatureKind::Ocean);
        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 0);
    }

    #[test]
    fn test_high_isthmus_holds() {
        let mut grid = chain_grid(&[5, 10, 23, 15, 40, 30]);
        markup_grid(&mut grid);
        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 0);
        assert_eq!(grid.features[grid.cells.f[id(3)]].kind, FeatureKind::Lake);
    }

    #[test]
    fn test_atoll_skips_breaching() {
        let mut grid = chain_grid(&[5, 10, 21, 15, 40, 30]);
        markup_grid(&mut grid);
        assert_eq!(open_near_sea_lakes(&mut grid, Template::Atoll), 0);
        assert_eq!(grid.cells.h[id(2)], 21);
    }

    #[test]
    fn test_chain_of_lakes_opens_in_one_call() {
        // озеро B ближе к началу, но выходит к океану только через озеро A
        let mut grid = chain_grid(&[40, 15, 21, 15, 21, 10, 5]);
        grid.cells.b = (0..7).map(|i| i == 6).collect();
        markup_grid(&mut grid);
        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 2);
        let ocean = grid.cells.f[id(6)];
        assert!((1..7).all(|i| grid.cells.f[id(i)] == ocean));
        assert_eq!(open_near_sea_lakes(&mut grid, Template::Continents), 0);
    }
}
