// src/features.rs
//! Географические объекты: океаны, озёра и острова
//!
//! Объект — максимальная связная область ячеек с одинаковым статусом суша/вода.
//! Объекты хранятся в арене [`Features`] и адресуются стабильным [`FeatureId`];
//! идентификатор 0 зарезервирован под «не размечено».

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::error::CalculationError;
use crate::grid::{Grid, MIN_LAND_HEIGHT};
use crate::mesh::{CellIndex, CellVec, PackCellId, dist2};
use crate::pack::Pack;

/// Берег суши
pub const LAND_COAST: i8 = 1;
/// Первое кольцо суши без выхода к воде
pub const LANDLOCKED: i8 = 2;
pub const UNMARKED: i8 = 0;
/// Берег воды
pub const WATER_COAST: i8 = -1;
/// Первое кольцо глубокой воды
pub const DEEP_WATER: i8 = -2;
/// Предел разметки глубины (не включительно)
const DEEP_WATER_LIMIT: i8 = -10;

/// Стабильный идентификатор объекта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

impl FeatureId {
    pub const UNMARKED: FeatureId = FeatureId(0);

    #[must_use]
    pub fn is_marked(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Ocean,
    Lake,
    Island,
}

/// Тип озера (влияет на пригодность берегов для жизни)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LakeGroup {
    Freshwater,
    Salt,
    Frozen,
    Dry,
    Sinkhole,
    Lava,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub land: bool,
    pub border: bool,
    /// Число ячеек
    pub cells: usize,
    /// Наименьший индекс ячейки объекта
    pub first_cell: usize,
    /// Только для озёр
    pub group: Option<LakeGroup>,
}

/// Арена объектов; `FeatureId(n)` хранится в позиции `n - 1`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features {
    records: Vec<Feature>,
}

impl Features {
    /// Идентификатор, который получит следующий объект
    #[must_use]
    pub fn next_id(&self) -> FeatureId {
        FeatureId(self.records.len() as u32 + 1)
    }

    pub fn push(&mut self, kind: FeatureKind, land: bool, border: bool) -> FeatureId {
        let id = self.next_id();
        self.records.push(Feature {
            id,
            kind,
            land,
            border,
            cells: 0,
            first_cell: 0,
            group: None,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        if id.is_marked() {
            self.records.get(id.0 as usize - 1)
        } else {
            None
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Feature> {
        self.records.iter_mut()
    }

    #[must_use]
    pub fn count(&self, kind: FeatureKind) -> usize {
        self.records.iter().filter(|f| f.kind == kind).count()
    }
}

impl Index<FeatureId> for Features {
    type Output = Feature;

    fn index(&self, id: FeatureId) -> &Feature {
        &self.records[id.0 as usize - 1]
    }
}

impl IndexMut<FeatureId> for Features {
    fn index_mut(&mut self, id: FeatureId) -> &mut Feature {
        &mut self.records[id.0 as usize - 1]
    }
}

/// Результат заливки: расстояния до берега, объекты ячеек, арена
struct Markup<I> {
    distance: CellVec<I, i8>,
    feature_ids: CellVec<I, FeatureId>,
    features: Features,
}

/// Заливка связных областей одного статуса суша/вода
fn flood_features<I: CellIndex>(
    heights: &CellVec<I, u8>,
    neighbors: &CellVec<I, Vec<I>>,
    border: &CellVec<I, bool>,
    mut on_coast: impl FnMut(I, I),
) -> Markup<I> {
    let n = heights.len();
    let mut distance = CellVec::filled(n, UNMARKED);
    let mut feature_ids = CellVec::filled(n, FeatureId::UNMARKED);
    let mut features = Features::default();

    let mut next_unmarked = 0;
    let mut stack = Vec::new();
    while let Some(first) = (next_unmarked..n).find(|&i| !feature_ids.as_slice()[i].is_marked()) {
        next_unmarked = first + 1;
        let first = I::from_index(first);
        let feature_id = features.next_id();
        feature_ids[first] = feature_id;

        let land = heights[first] >= MIN_LAND_HEIGHT;
        let mut touches_border = false;
        let mut cells = 1;

        stack.push(first);
        while let Some(cell) = stack.pop() {
            touches_border |= border[cell];
            for &neighbor in &neighbors[cell] {
                let neighbor_land = heights[neighbor] >= MIN_LAND_HEIGHT;
                if land == neighbor_land && !feature_ids[neighbor].is_marked() {
                    feature_ids[neighbor] = feature_id;
                    cells += 1;
                    stack.push(neighbor);
                } else if land && !neighbor_land {
                    distance[cell] = LAND_COAST;
                    distance[neighbor] = WATER_COAST;
                    on_coast(cell, neighbor);
                }
            }
        }

        let kind = if land {
            FeatureKind::Island
        } else if touches_border {
            FeatureKind::Ocean
        } else {
            FeatureKind::Lake
        };
        let id = features.push(kind, land, touches_border);
        features[id].cells = cells;
        features[id].first_cell = first.index();
    }

    Markup {
        distance,
        feature_ids,
        features,
    }
}

/// Волновая разметка расстояния от берега: `start`, `start + increment`, ...
fn markup_distance<I: CellIndex>(
    distance: &mut CellVec<I, i8>,
    neighbors: &CellVec<I, Vec<I>>,
    start: i8,
    increment: i8,
    limit: i8,
) {
    let mut current = start;
    loop {
        if current == limit {
            break;
        }
        let previous = current - increment;
        let mut marked = 0;
        for cell in distance.ids() {
            if distance[cell] != previous {
                continue;
            }
            for &neighbor in &neighbors[cell] {
                if distance[neighbor] == UNMARKED {
                    distance[neighbor] = current;
                    marked += 1;
                }
            }
        }
        if marked == 0 {
            break;
        }
        current = match current.checked_add(increment) {
            Some(next) => next,
            None => break,
        };
    }
}

/// Разметка объектов грубой сетки: `t`, `f` и список объектов
pub fn markup_grid(grid: &mut Grid) {
    let Markup {
        mut distance,
        feature_ids,
        features,
    } = flood_features(&grid.cells.h, &grid.cells.c, &grid.cells.b, |_, _| {});

    markup_distance(&mut distance, &grid.cells.c, DEEP_WATER, -1, DEEP_WATER_LIMIT);

    grid.cells.t = distance;
    grid.cells.f = feature_ids;
    grid.features = features;
}

/// Разметка объектов уточнённой сетки, а также гаваней
pub fn markup_pack(pack: &mut Pack) {
    let n = pack.len();
    let mut haven: CellVec<PackCellId, Option<PackCellId>> = CellVec::filled(n, None);
    let mut harbor: CellVec<PackCellId, u8> = CellVec::filled(n, 0);

    let cells = &pack.cells;
    let Markup {
        mut distance,
        feature_ids,
        features,
    } = flood_features(&cells.h, &cells.c, &cells.b, |cell, _| {
        if haven[cell].is_some() {
            return;
        }
        // Гавань — ближайший водный сосед, причал — число водных соседей
        let water: Vec<PackCellId> = cells.c[cell]
            .iter()
            .copied()
            .filter(|&n| cells.h[n] < MIN_LAND_HEIGHT)
            .collect();
        let closest = water.iter().copied().min_by(|&a, &b| {
            dist2(cells.p[cell], cells.p[a]).total_cmp(&dist2(cells.p[cell], cells.p[b]))
        });
        haven[cell] = closest;
        harbor[cell] = water.len().min(u8::MAX as usize) as u8;
    });

    markup_distance(&mut distance, &pack.cells.c, LANDLOCKED, 1, i8::MAX);
    markup_distance(&mut distance, &pack.cells.c, DEEP_WATER, -1, DEEP_WATER_LIMIT);

    pack.cells.t = distance;
    pack.cells.f = feature_ids;
    pack.cells.haven = haven;
    pack.cells.harbor = harbor;
    pack.features = features;
}

/// Связные компоненты ячеек каждого объекта (метка компоненты на ячейку)
fn feature_components<I: CellIndex>(
    feature_ids: &CellVec<I, FeatureId>,
    neighbors: &CellVec<I, Vec<I>>,
) -> Vec<usize> {
    let mut uf = UnionFind::<usize>::new(feature_ids.len());
    for cell in feature_ids.ids() {
        for &neighbor in &neighbors[cell] {
            if feature_ids[cell] == feature_ids[neighbor] {
                uf.union(cell.index(), neighbor.index());
            }
        }
    }
    uf.into_labeling()
}

/// Разделяет объекты, распавшиеся на несколько компонент
///
/// После добавления озёр и прорывов остров может оказаться разрезан водой.
/// Компонента с наименьшим индексом ячейки сохраняет идентификатор,
/// остальные получают новые записи того же типа. Возвращает число новых объектов.
pub fn split_disconnected_features(grid: &mut Grid) -> usize {
    let labels = feature_components(&grid.cells.f, &grid.cells.c);

    // Для каждого объекта — корни компонент в порядке первой ячейки
    let mut components: BTreeMap<FeatureId, Vec<usize>> = BTreeMap::new();
    for cell in grid.ids() {
        let roots = components.entry(grid.cells.f[cell]).or_default();
        let root = labels[cell.index()];
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    let mut reassigned: BTreeMap<usize, FeatureId> = BTreeMap::new();
    for (feature, roots) in &components {
        if !feature.is_marked() {
            continue;
        }
        for &root in roots.iter().skip(1) {
            let template = &grid.features[*feature];
            let (kind, land) = (template.kind, template.land);
            let id = grid.features.push(kind, land, false);
            reassigned.insert(root, id);
        }
    }

    if !reassigned.is_empty() {
        for cell in grid.ids() {
            if let Some(&id) = reassigned.get(&labels[cell.index()]) {
                grid.cells.f[cell] = id;
            }
        }
    }
    refresh_feature_stats(grid);
    reassigned.len()
}

/// Пересчитывает размер, первую ячейку и касание границы объектов
pub fn refresh_feature_stats(grid: &mut Grid) {
    for feature in grid.features.iter_mut() {
        feature.cells = 0;
        feature.border = false;
        feature.first_cell = usize::MAX;
    }
    for cell in grid.ids() {
        let id = grid.cells.f[cell];
        if !id.is_marked() {
            continue;
        }
        let feature = &mut grid.features[id];
        feature.cells += 1;
        feature.border |= grid.cells.b[cell];
        feature.first_cell = feature.first_cell.min(cell.index());
    }
    for feature in grid.features.iter_mut() {
        if feature.first_cell == usize::MAX {
            feature.first_cell = 0;
        }
    }
}

/// Проверяет, что каждая ячейка принадлежит существующему объекту
/// того же статуса и что ячейки каждого объекта связны
pub fn check_connectivity<I: CellIndex>(
    heights: &CellVec<I, u8>,
    feature_ids: &CellVec<I, FeatureId>,
    neighbors: &CellVec<I, Vec<I>>,
    features: &Features,
) -> Result<(), CalculationError> {
    for (cell, &id) in feature_ids.iter_enumerated() {
        match features.get(id) {
            Some(feature) if feature.land == (heights[cell] >= MIN_LAND_HEIGHT) => {}
            _ => {
                return Err(CalculationError::UnknownFeature {
                    cell: cell.index(),
                    feature: id.0,
                });
            }
        }
    }

    let labels = feature_components(feature_ids, neighbors);
    let mut roots: BTreeMap<FeatureId, Vec<usize>> = BTreeMap::new();
    for (cell, &id) in feature_ids.iter_enumerated() {
        let entry = roots.entry(id).or_default();
        let root = labels[cell.index()];
        if !entry.contains(&root) {
            entry.push(root);
        }
    }
    if let Some((id, r)) = roots.iter().find(|(_, r)| r.len() > 1) {
        return Err(CalculationError::DisconnectedFeature {
            feature: id.0,
            components: r.len(),
        });
    }
    Ok(())
}
