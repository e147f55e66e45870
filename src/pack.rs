// src/pack.rs
//! Уточнённая сетка (`Pack`)
//!
//! Строится из размеченной грубой сетки: глубокий океан и внутренности озёр
//! выбрасываются, вдоль берегов добавляются промежуточные точки, и по
//! полученному набору заново строится диаграмма Вороного.
//! Каждая ячейка хранит ссылку `g` на исходную ячейку грубой сетки.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::CalculationError;
use crate::features::{DEEP_WATER, FeatureId, FeatureKind, Features, LAND_COAST, WATER_COAST};
use crate::grid::{Grid, MIN_LAND_HEIGHT};
use crate::mesh::{CellIndex, CellVec, GridCellId, PackCellId, Point, dist2, polygon_area};
use crate::rng::round_to;
use crate::voronoi::{Voronoi, calculate_voronoi};

/// Свойства ячеек уточнённой сетки
#[derive(Debug, Clone, Default)]
pub struct PackCells {
    pub p: CellVec<PackCellId, Point>,
    /// Исходная ячейка грубой сетки
    pub g: CellVec<PackCellId, GridCellId>,
    pub c: CellVec<PackCellId, Vec<PackCellId>>,
    /// Индексы вершин многоугольника в `Pack::vertices`
    pub v: CellVec<PackCellId, Vec<usize>>,
    pub b: CellVec<PackCellId, bool>,
    pub h: CellVec<PackCellId, u8>,
    /// Площадь многоугольника, не больше `u16::MAX`
    pub area: CellVec<PackCellId, u16>,
    pub t: CellVec<PackCellId, i8>,
    pub f: CellVec<PackCellId, FeatureId>,
    /// Ближайшая водная ячейка для береговой суши
    pub haven: CellVec<PackCellId, Option<PackCellId>>,
    /// Число соседних водных ячеек
    pub harbor: CellVec<PackCellId, u8>,
    /// Речной сток
    pub fl: CellVec<PackCellId, u16>,
    /// Число сливающихся рек
    pub conf: CellVec<PackCellId, u8>,
    /// Номер реки, 0 — нет реки
    pub r: CellVec<PackCellId, u16>,
    pub biome: CellVec<PackCellId, u8>,
    /// Пригодность для жизни
    pub s: CellVec<PackCellId, i16>,
    /// Население
    pub pop: CellVec<PackCellId, f32>,
}

/// Уточнённая сетка
#[derive(Debug, Clone, Default)]
pub struct Pack {
    pub cells: PackCells,
    pub vertices: Vec<Point>,
    pub features: Features,
    /// Поиск ближайшей ячейки по координатам
    pub q: PointIndex,
}

impl Pack {
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.p.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.p.is_empty()
    }

    #[must_use]
    pub fn is_land(&self, id: PackCellId) -> bool {
        self.cells.h[id] >= MIN_LAND_HEIGHT
    }

    pub fn ids(&self) -> impl Iterator<Item = PackCellId> + use<> {
        (0..self.len()).map(PackCellId::from_index)
    }

    /// Координаты многоугольника ячейки
    #[must_use]
    pub fn polygon(&self, id: PackCellId) -> Vec<Point> {
        self.cells.v[id].iter().map(|&v| self.vertices[v]).collect()
    }
}

/// Корзины точек для поиска ближайшей ячейки
#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    bucket_size: f64,
    buckets_x: usize,
    buckets_y: usize,
    buckets: Vec<Vec<PackCellId>>,
    points: Vec<Point>,
}

impl PointIndex {
    #[must_use]
    pub fn new(points: &CellVec<PackCellId, Point>, width: f64, height: f64, bucket_size: f64) -> Self {
        let bucket_size = bucket_size.max(1.0);
        let buckets_x = (width / bucket_size) as usize + 1;
        let buckets_y = (height / bucket_size) as usize + 1;
        let mut index = Self {
            bucket_size,
            buckets_x,
            buckets_y,
            buckets: vec![Vec::new(); buckets_x * buckets_y],
            points: points.as_slice().to_vec(),
        };
        for (id, &p) in points.iter_enumerated() {
            let (bx, by) = index.bucket_of(p);
            index.buckets[by * buckets_x + bx].push(id);
        }
        index
    }

    fn bucket_of(&self, [x, y]: Point) -> (usize, usize) {
        let bx = (x / self.bucket_size).floor().max(0.0) as usize;
        let by = (y / self.bucket_size).floor().max(0.0) as usize;
        (bx.min(self.buckets_x - 1), by.min(self.buckets_y - 1))
    }

    /// Ближайшая ячейка к точке; с `radius` — только в пределах радиуса
    #[must_use]
    pub fn find(&self, x: f64, y: f64, radius: Option<f64>) -> Option<PackCellId> {
        if self.points.is_empty() {
            return None;
        }
        let target = [x, y];
        let (cx, cy) = self.bucket_of(target);
        let max_ring = self.buckets_x.max(self.buckets_y);
        let mut best: Option<(f64, PackCellId)> = None;

        for ring in 0..=max_ring {
            let ring_i = ring as isize;
            for dy in -ring_i..=ring_i {
                for dx in -ring_i..=ring_i {
                    if dx.abs() != ring_i && dy.abs() != ring_i {
                        continue;
                    }
                    let bx = cx as isize + dx;
                    let by = cy as isize + dy;
                    if bx < 0 || by < 0 || bx as usize >= self.buckets_x || by as usize >= self.buckets_y {
                        continue;
                    }
                    for &id in &self.buckets[by as usize * self.buckets_x + bx as usize] {
                        let d = dist2(target, self.points[id.index()]);
                        if best.is_none_or(|(bd, bid)| d < bd || (d == bd && id < bid)) {
                            best = Some((d, id));
                        }
                    }
                }
            }
            // Точки следующих колец не ближе ring * bucket_size
            let reach = ring as f64 * self.bucket_size;
            if best.is_some_and(|(d, _)| d <= reach * reach) {
                break;
            }
        }

        let (d, id) = best?;
        match radius {
            Some(r) if d > r * r => None,
            _ => Some(id),
        }
    }
}

/// Строит уточнённую сетку по размеченной грубой
pub fn re_graph(grid: &Grid) -> Result<Pack, CalculationError> {
    let cells = &grid.cells;
    let spacing2 = grid.spacing * grid.spacing;

    let mut points: Vec<Point> = Vec::new();
    let mut sources: Vec<GridCellId> = Vec::new();
    let mut heights: Vec<u8> = Vec::new();
    let mut add_point = |source: GridCellId, point: Point| {
        points.push(point);
        sources.push(source);
        heights.push(cells.h[source]);
    };

    for i in grid.ids() {
        let height = cells.h[i];
        let kind = cells.t[i];

        // Глубокий океан
        if height < MIN_LAND_HEIGHT && kind != WATER_COAST && kind != DEEP_WATER {
            continue;
        }
        // Часть неприбрежной воды и вся внутренность неразорванных озёр
        let in_lake = grid
            .features
            .get(cells.f[i])
            .is_some_and(|f| f.kind == FeatureKind::Lake);
        if kind == DEEP_WATER && (i.index() % 4 == 0 || in_lake) {
            continue;
        }

        let [x, y] = grid.points[i];
        add_point(i, [x, y]);

        // Дополнительные точки вдоль берега
        if (kind == LAND_COAST || kind == WATER_COAST) && !cells.b[i] {
            for &e in &cells.c[i] {
                if i > e || cells.t[e] != kind {
                    continue;
                }
                let other = grid.points[e];
                if dist2([x, y], other) < spacing2 {
                    continue;
                }
                let midpoint = [round_to((x + other[0]) / 2.0, 1), round_to((y + other[1]) / 2.0, 1)];
                add_point(i, midpoint);
            }
        }
    }

    let voronoi = calculate_voronoi(&points, &grid.boundary)?;
    let area = cell_areas(&voronoi);
    let n = points.len();

    let Voronoi {
        neighbors,
        polygons,
        border,
        vertices,
    } = voronoi;

    let p = CellVec::from_vec(points);
    let q = PointIndex::new(&p, grid.width, grid.height, grid.spacing);

    let cells = PackCells {
        p,
        g: CellVec::from_vec(sources),
        c: neighbors
            .into_iter()
            .map(|ns| ns.into_iter().map(PackCellId::from_index).collect())
            .collect(),
        v: CellVec::from_vec(polygons),
        b: CellVec::from_vec(border),
        h: CellVec::from_vec(heights),
        area: CellVec::from_vec(area),
        t: CellVec::filled(n, 0),
        f: CellVec::filled(n, FeatureId::UNMARKED),
        haven: CellVec::filled(n, None),
        harbor: CellVec::filled(n, 0),
        fl: CellVec::filled(n, 0),
        conf: CellVec::filled(n, 0),
        r: CellVec::filled(n, 0),
        biome: CellVec::filled(n, 0),
        s: CellVec::filled(n, 0),
        pop: CellVec::filled(n, 0.0),
    };

    Ok(Pack {
        cells,
        vertices,
        features: Features::default(),
        q,
    })
}

fn cell_area(voronoi: &Voronoi, cell: usize) -> u16 {
    polygon_area(&voronoi.polygon(cell)).abs().min(f64::from(u16::MAX)) as u16
}

#[cfg(feature = "parallel")]
fn cell_areas(voronoi: &Voronoi) -> Vec<u16> {
    (0..voronoi.polygons.len())
        .into_par_iter()
        .map(|cell| cell_area(voronoi, cell))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn cell_areas(voronoi: &Voronoi) -> Vec<u16> {
    (0..voronoi.polygons.len())
        .map(|cell| cell_area(voronoi, cell))
        .collect()
}
