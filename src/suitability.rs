// src/suitability.rs
//! Пригодность ячеек для жизни и оценка населения
//!
//! Основа — пригодность биома; её дополняют реки и слияния, высота и
//! близость к воде. Население ячейки пропорционально пригодности и площади.

use crate::config::BiomeTable;
use crate::features::{FeatureKind, LAND_COAST, LakeGroup};
use crate::pack::Pack;

/// Нормирует `value` в `[0, 1]` по отрезку `[min, max]`
fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn lake_shore_bonus(group: Option<LakeGroup>) -> f64 {
    match group {
        Some(LakeGroup::Freshwater) => 30.0,
        Some(LakeGroup::Salt) => 10.0,
        Some(LakeGroup::Frozen) => 1.0,
        Some(LakeGroup::Dry | LakeGroup::Sinkhole) => -5.0,
        Some(LakeGroup::Lava) => -30.0,
        None => 0.0,
    }
}

/// Заполняет `pack.cells.s` и `pack.cells.pop`
pub fn rank_cells(pack: &mut Pack, biomes: &BiomeTable) {
    let cells = &mut pack.cells;
    let mut flowing: Vec<f64> = cells.fl.iter().filter(|&&f| f > 0).map(|&f| f64::from(f)).collect();
    let fl_mean = median(&mut flowing).unwrap_or(0.0);
    let fl_max = f64::from(cells.fl.iter().copied().max().unwrap_or(0))
        + f64::from(cells.conf.iter().copied().max().unwrap_or(0));
    let area_mean = if cells.area.is_empty() {
        0.0
    } else {
        cells.area.iter().map(|&a| f64::from(a)).sum::<f64>() / cells.area.len() as f64
    };

    for i in cells.s.ids() {
        cells.s[i] = 0;
        cells.pop[i] = 0.0;
        if cells.h[i] < crate::grid::MIN_LAND_HEIGHT {
            continue;
        }
        let habitability = biomes.habitability(cells.biome[i]);
        if habitability == 0 {
            continue;
        }

        let mut s = f64::from(habitability);
        if fl_mean > 0.0 {
            // Крупные реки и слияния ценятся
            s += normalize(f64::from(cells.fl[i]) + f64::from(cells.conf[i]), fl_mean, fl_max) * 250.0;
        }
        s -= (f64::from(cells.h[i]) - 50.0) / 5.0;

        if cells.t[i] == LAND_COAST {
            if cells.r[i] != 0 {
                // Устье
                s += 15.0;
            }
            let feature = cells.haven[i].and_then(|haven| pack.features.get(cells.f[haven]));
            match feature {
                Some(lake) if lake.kind == FeatureKind::Lake => s += lake_shore_bonus(lake.group),
                Some(_) => {
                    s += 5.0;
                    if cells.harbor[i] == 1 {
                        // Защищённая гавань
                        s += 20.0;
                    }
                }
                None => {}
            }
        }

        let suitability = (s / 5.0) as i16;
        cells.s[i] = suitability;
        if suitability > 0 && area_mean > 0.0 {
            cells.pop[i] = (f64::from(suitability) * f64::from(cells.area[i]) / area_mean) as f32;
        }
    }
}
