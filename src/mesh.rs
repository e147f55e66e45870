// src/mesh.rs
//! Типизированные индексы ячеек и массивы «структура массивов»
//!
//! Сетка (`Grid`) и упаковка (`Pack`) хранят свойства ячеек параллельными векторами.
//! Чтобы индекс одной сетки нельзя было случайно применить к другой, каждая
//! сетка имеет свой тип индекса, а [`CellVec`] индексируется только им.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Индекс ячейки конкретной сетки
pub trait CellIndex: Copy + Eq + Ord + fmt::Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! cell_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl CellIndex for $name {
            #[inline]
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

cell_id!(
    /// Ячейка грубой сетки
    GridCellId
);
cell_id!(
    /// Ячейка уточнённой сетки (pack)
    PackCellId
);

/// Вектор значений, индексируемый только своим типом ячеек
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellVec<I, T> {
    data: Vec<T>,
    #[serde(skip)]
    marker: PhantomData<I>,
}

impl<I: CellIndex, T> CellVec<I, T> {
    #[must_use]
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            data,
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn filled(len: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self::from_vec(vec![value; len])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Проверяемый доступ
    #[must_use]
    pub fn get(&self, id: I) -> Option<&T> {
        self.data.get(id.index())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// Пары (индекс, значение) в порядке возрастания индекса
    pub fn iter_enumerated(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (I::from_index(i), v))
    }

    /// Все индексы `0..len`
    pub fn ids(&self) -> impl Iterator<Item = I> + use<I, T> {
        (0..self.data.len()).map(I::from_index)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<I, T> Default for CellVec<I, T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            marker: PhantomData,
        }
    }
}

impl<I: CellIndex, T> Index<I> for CellVec<I, T> {
    type Output = T;

    #[inline]
    fn index(&self, id: I) -> &T {
        &self.data[id.index()]
    }
}

impl<I: CellIndex, T> IndexMut<I> for CellVec<I, T> {
    #[inline]
    fn index_mut(&mut self, id: I) -> &mut T {
        &mut self.data[id.index()]
    }
}

impl<I: CellIndex, T> FromIterator<T> for CellVec<I, T> {
    fn from_iter<It: IntoIterator<Item = T>>(iter: It) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Точка на плоскости карты
pub type Point = [f64; 2];

/// Квадрат расстояния между точками
#[must_use]
pub fn dist2(a: Point, b: Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

/// Ориентированная площадь многоугольника (формула шнурков)
#[must_use]
pub fn polygon_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let mut b = polygon[n - 1];
    for &a in polygon {
        area += b[1] * a[0] - b[0] * a[1];
        b = a;
    }
    area / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_vec_indexing() {
        let mut heights: CellVec<GridCellId, u8> = CellVec::filled(3, 0);
        heights[GridCellId(1)] = 42;
        assert_eq!(heights[GridCellId(1)], 42);
        assert_eq!(heights.get(GridCellId(3)), None);
        let ids: Vec<_> = heights.ids().collect();
        assert_eq!(ids, vec![GridCellId(0), GridCellId(1), GridCellId(2)]);
    }

    #[test]
    fn test_polygon_area_square() {
        let square = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        assert!((polygon_area(&square).abs() - 100.0).abs() < 1e-9);
        let reversed: Vec<_> = square.iter().rev().copied().collect();
        assert!((polygon_area(&square) + polygon_area(&reversed)).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_polygon_has_no_area() {
        assert_eq!(polygon_area(&[[0.0, 0.0], [1.0, 1.0]]), 0.0);
    }
}
