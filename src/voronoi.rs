// src/voronoi.rs
//! Диаграмма Вороного как двойственный граф триангуляции Делоне
//!
//! Точки ячеек дополняются кольцом граничных точек, чтобы крайние ячейки были
//! замкнуты. Соседи ячейки — вершины веера треугольников вокруг её точки
//! (без граничных точек); ячейка считается пограничной, если в веере есть
//! граничная точка. Вершины многоугольников — центры описанных окружностей.

use delaunator::{EMPTY, triangulate};

use crate::error::CalculationError;
use crate::mesh::Point;

/// Результат построения: смежность, пограничность и многоугольники ячеек
#[derive(Debug, Clone, Default)]
pub struct Voronoi {
    /// Соседние ячейки (только настоящие точки, без граничных)
    pub neighbors: Vec<Vec<usize>>,
    /// Индексы вершин многоугольника каждой ячейки
    pub polygons: Vec<Vec<usize>>,
    /// Ячейка касается внешней границы
    pub border: Vec<bool>,
    /// Координаты вершин (центры описанных окружностей треугольников)
    pub vertices: Vec<Point>,
}

impl Voronoi {
    /// Координаты многоугольника ячейки
    #[must_use]
    pub fn polygon(&self, cell: usize) -> Vec<Point> {
        self.polygons[cell]
            .iter()
            .map(|&v| self.vertices[v])
            .collect()
    }
}

#[inline]
fn next_halfedge(e: usize) -> usize {
    if e % 3 == 2 { e - 2 } else { e + 1 }
}

/// Строит диаграмму для `points`, замыкая её точками `boundary`
pub fn calculate_voronoi(points: &[Point], boundary: &[Point]) -> Result<Voronoi, CalculationError> {
    let points_n = points.len();
    if points_n == 0 {
        return Err(CalculationError::EmptyMesh);
    }

    let all: Vec<delaunator::Point> = points
        .iter()
        .chain(boundary)
        .map(|&[x, y]| delaunator::Point { x, y })
        .collect();
    let delaunay = triangulate(&all);
    if delaunay.triangles.is_empty() {
        return Err(CalculationError::Triangulation { points: all.len() });
    }

    let triangles = &delaunay.triangles;
    let halfedges = &delaunay.halfedges;

    let mut neighbors = vec![Vec::new(); points_n];
    let mut polygons = vec![Vec::new(); points_n];
    let mut border = vec![false; points_n];
    let mut visited = vec![false; points_n];

    for e in 0..triangles.len() {
        let p = triangles[next_halfedge(e)];
        if p >= points_n || visited[p] {
            continue;
        }
        visited[p] = true;

        // Обход веера полурёбер вокруг точки p
        let mut fan = Vec::new();
        let mut incoming = e;
        loop {
            fan.push(incoming);
            let outgoing = next_halfedge(incoming);
            incoming = halfedges[outgoing];
            if incoming == EMPTY || incoming == e {
                break;
            }
        }

        polygons[p] = fan.iter().map(|&edge| edge / 3).collect();
        neighbors[p] = fan
            .iter()
            .map(|&edge| triangles[edge])
            .filter(|&c| c < points_n)
            .collect();
        border[p] = fan.len() > neighbors[p].len();
    }

    let vertices = (0..triangles.len() / 3)
        .map(|t| {
            circumcenter(
                &all[triangles[3 * t]],
                &all[triangles[3 * t + 1]],
                &all[triangles[3 * t + 2]],
            )
        })
        .collect();

    Ok(Voronoi {
        neighbors,
        polygons,
        border,
        vertices,
    })
}

fn circumcenter(a: &delaunator::Point, b: &delaunator::Point, c: &delaunator::Point) -> Point {
    let ad = a.x * a.x + a.y * a.y;
    let bd = b.x * b.x + b.y * b.y;
    let cd = c.x * c.x + c.y * c.y;
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < f64::EPSILON {
        // Вырожденный треугольник: берём центр масс
        return [(a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0];
    }
    [
        (ad * (b.y - c.y) + bd * (c.y - a.y) + cd * (a.y - b.y)) / d,
        (ad * (c.x - b.x) + bd * (a.x - c.x) + cd * (b.x - a.x)) / d,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_lattice(n: usize, step: f64) -> (Vec<Point>, Vec<Point>) {
        let mut points = Vec::new();
        for y in 0..n {
            for x in 0..n {
                // Небольшой сдвиг убирает вырожденные (кокруговые) четвёрки
                let jitter = ((x * 7 + y * 13) % 5) as f64 * 0.01 * step;
                points.push([
                    step * (x as f64 + 0.5) + jitter,
                    step * (y as f64 + 0.5) - jitter,
                ]);
            }
        }
        let size = step * n as f64;
        let mut boundary = Vec::new();
        let mut v = -step;
        while v <= size + step {
            boundary.push([v, -step]);
            boundary.push([v, size + step]);
            boundary.push([-step, v]);
            boundary.push([size + step, v]);
            v += 2.0 * step;
        }
        (points, boundary)
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let (points, boundary) = square_lattice(6, 10.0);
        let voronoi = calculate_voronoi(&points, &boundary).unwrap();
        for (i, ns) in voronoi.neighbors.iter().enumerate() {
            assert!(!ns.is_empty());
            for &n in ns {
                assert!(voronoi.neighbors[n].contains(&i), "{i} -> {n} not reciprocal");
                assert_eq!(ns.iter().filter(|&&m| m == n).count(), 1);
            }
        }
    }

    #[test]
    fn test_border_cells_are_on_the_edge() {
        let (points, boundary) = square_lattice(6, 10.0);
        let voronoi = calculate_voronoi(&points, &boundary).unwrap();
        // Центральные ячейки не касаются границы
        for (x, y) in [(2, 2), (3, 3), (2, 3)] {
            assert!(!voronoi.border[y * 6 + x]);
        }
        // Угловые касаются
        assert!(voronoi.border[0]);
        assert!(voronoi.border[35]);
    }

    #[test]
    fn test_interior_polygon_area_close_to_lattice_cell() {
        let (points, boundary) = square_lattice(6, 10.0);
        let voronoi = calculate_voronoi(&points, &boundary).unwrap();
        let area = crate::mesh::polygon_area(&voronoi.polygon(14)).abs();
        assert!(area > 60.0 && area < 140.0, "area {area}");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            calculate_voronoi(&[], &[]),
            Err(CalculationError::EmptyMesh)
        ));
    }
}
