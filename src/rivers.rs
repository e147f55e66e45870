// src/rivers.rs
//! Сток и реки на уточнённой сетке
//!
//! Каждая ячейка суши получает сток из осадков своей ячейки грубой сетки.
//! Ячейки обходятся от вершин к низинам, и сток передаётся самому низкому
//! соседу. Там, где сток достигает порога, появляется река; встреча двух рек
//! считается слиянием.

use log::debug;

use crate::climate::precipitation_modifier;
use crate::grid::{Grid, MIN_LAND_HEIGHT};
use crate::mesh::{CellIndex, PackCellId};
use crate::pack::Pack;

/// Минимальный сток, образующий реку
pub const MIN_FLUX_TO_FORM_RIVER: f64 = 30.0;

/// Накопленный сток до округления в `u16`
#[derive(Debug, Clone, Default)]
pub struct Drainage {
    /// Сток каждой ячейки уточнённой сетки (в воду тоже)
    pub flux: Vec<f64>,
    /// Число рек
    pub rivers: usize,
}

/// Плотность сетки для нормировки стока
fn cells_number_modifier(grid: &Grid) -> f64 {
    precipitation_modifier(grid.len(), 100)
}

/// Заполняет `fl`, `conf` и `r` уточнённой сетки
pub fn generate_rivers(pack: &mut Pack, grid: &Grid) -> Drainage {
    let n = pack.len();
    let modifier = cells_number_modifier(grid);
    let cells = &mut pack.cells;

    let mut flux = vec![0.0f64; n];
    let mut land: Vec<PackCellId> = Vec::new();
    for (i, &g) in cells.g.iter_enumerated() {
        if cells.h[i] >= MIN_LAND_HEIGHT {
            flux[i.index()] = f64::from(grid.cells.prec[g]) / modifier;
            land.push(i);
        }
    }

    // От вершин к низинам, при равной высоте по индексу
    land.sort_by_key(|&i| std::cmp::Reverse(cells.h[i]));

    let mut river_next: u16 = 1;
    // Идентификаторы насыщаются на u16::MAX, поэтому истоки считаем отдельно
    let mut rivers = 0usize;
    for i in land {
        let Some(&lowest) = cells.c[i].iter().min_by_key(|&&c| cells.h[c]) else {
            continue;
        };
        if cells.h[i] <= cells.h[lowest] {
            // Бессточная низина: вода остаётся на месте
            continue;
        }

        let from_flux = flux[i.index()];
        if from_flux < MIN_FLUX_TO_FORM_RIVER {
            flux[lowest.index()] += from_flux;
            continue;
        }

        if cells.r[i] == 0 {
            cells.r[i] = river_next;
            river_next = river_next.saturating_add(1);
            rivers += 1;
        }
        let river = cells.r[i];

        // Сток вниз по течению
        if cells.h[lowest] >= MIN_LAND_HEIGHT {
            let to_river = cells.r[lowest];
            if to_river == 0 {
                cells.r[lowest] = river;
            } else if to_river != river {
                cells.conf[lowest] = cells.conf[lowest].saturating_add(1);
                // Более полноводная река сохраняет русло
                if from_flux > flux[lowest.index()] {
                    cells.r[lowest] = river;
                }
            }
        }
        flux[lowest.index()] += from_flux;
    }

    for (fl, &value) in cells.fl.iter_mut().zip(&flux) {
        *fl = value.round().min(f64::from(u16::MAX)) as u16;
    }

    debug!("rivers: {rivers} formed on {n} cells");
    Drainage { flux, rivers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::chain_grid;
    use crate::mesh::GridCellId;
    use crate::pack::tests::{chain_pack, synthetic_pack};

    fn rained_grid(n: usize, prec: u8) -> Grid {
        let mut grid = chain_grid(&vec![30; n]);
        grid.cells.prec.iter_mut().for_each(|p| *p = prec);
        grid
    }

    #[test]
    fn test_single_river_reaches_sea() {
        let mut pack = chain_pack(&[5, 30, 40, 50, 60]);
        let grid = rained_grid(5, 20);
        let drainage = generate_rivers(&mut pack, &grid);

        assert_eq!(drainage.rivers, 1);
        for i in 1..5 {
            assert_eq!(pack.cells.r[PackCellId::from_index(i)], 1);
        }
        // В море не помечаем реку, но сток доходит
        assert_eq!(pack.cells.r[PackCellId(0)], 0);
        let per_cell = 20.0 / cells_number_modifier(&grid);
        assert!((drainage.flux[0] - 4.0 * per_cell).abs() < 1e-9);
        assert!(pack.cells.fl[PackCellId(1)] > pack.cells.fl[PackCellId(4)]);
    }

    #[test]
    fn test_confluence_counted() {
        // 2 и 3 стекают в 1, а 1 — в море
        let mut pack = synthetic_pack(&[5, 30, 50, 45], &[&[1], &[0, 2, 3], &[1], &[1]]);
        let grid = rained_grid(4, 20);
        let drainage = generate_rivers(&mut pack, &grid);

        assert_eq!(drainage.rivers, 2);
        assert_eq!(pack.cells.conf[PackCellId(1)], 1);
        assert_eq!(pack.cells.r[PackCellId(1)], pack.cells.r[PackCellId(2)]);
    }

    #[test]
    fn test_river_count_survives_id_saturation() {
        // Звезда: каждая ячейка суши стекает прямо в море
        let springs = usize::from(u16::MAX) + 64;
        let mut heights = vec![30; springs + 1];
        heights[0] = 5;
        let spokes: Vec<usize> = (1..=springs).collect();
        let mut neighbors: Vec<&[usize]> = vec![&spokes];
        neighbors.extend(std::iter::repeat_n(&[0usize][..], springs));
        let mut pack = synthetic_pack(&heights, &neighbors);
        let grid = rained_grid(springs + 1, 100);
        let drainage = generate_rivers(&mut pack, &grid);

        assert_eq!(drainage.rivers, springs);
        assert_eq!(pack.cells.r[PackCellId::from_index(springs)], u16::MAX);
    }

    #[test]
    fn test_low_flux_forms_no_river() {
        let mut pack = chain_pack(&[5, 30, 40, 50, 60]);
        let grid = rained_grid(5, 1);
        let drainage = generate_rivers(&mut pack, &grid);
        assert_eq!(drainage.rivers, 0);
        assert!(pack.cells.r.iter().all(|&r| r == 0));
        assert!(drainage.flux[0] > 0.0);
    }

    #[test]
    fn test_depression_keeps_its_water() {
        let mut pack = chain_pack(&[5, 40, 30, 40]);
        let grid = rained_grid(4, 20);
        generate_rivers(&mut pack, &grid);
        // Ячейка 2 — локальный минимум, сток из 3 приходит туда и остаётся
        assert_ne!(pack.cells.r[PackCellId(2)], 0);
        assert_eq!(pack.cells.r[PackCellId(2)], pack.cells.r[PackCellId(3)]);
        assert!(pack.cells.fl[PackCellId(2)] > pack.cells.fl[PackCellId(3)]);
        assert_eq!(pack.cells.g[PackCellId(2)], GridCellId(2));
    }
}
