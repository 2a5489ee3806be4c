//! Топология растровой сетки: связность и зацикливание краёв.
//!
//! Порядок соседей фиксирован, поэтому все обходы (заливка, BFS, выбор
//! нижнего соседа) детерминированы и не зависят от порядка хеш-контейнеров.

use serde::{Deserialize, Serialize};

/// Север, юг, восток, запад.
const OFFSETS_4: [(i32, i32); 4] = [(0, -1), (0, 1), (1, 0), (-1, 0)];

const OFFSETS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Связность клетки растра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Connectivity {
    /// Соседи по сторонам
    #[default]
    Four,
    /// Соседи по сторонам и диагоналям
    Eight,
}

impl Connectivity {
    #[must_use]
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Connectivity::Four => &OFFSETS_4,
            Connectivity::Eight => &OFFSETS_8,
        }
    }
}

/// Связность плюс режим краёв.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GridTopology {
    #[serde(default)]
    pub connectivity: Connectivity,
    /// Края склеены (тор): сосед за правым краем — левый столбец и т.д.
    #[serde(default)]
    pub wrap: bool,
}

impl GridTopology {
    #[must_use]
    pub fn new(connectivity: Connectivity, wrap: bool) -> Self {
        Self { connectivity, wrap }
    }

    /// Соседи `(x, y)` в фиксированном порядке. Клетка никогда не соседствует сама с собой.
    pub fn neighbors(
        self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = (u32, u32)> {
        self.connectivity
            .offsets()
            .iter()
            .filter_map(move |&(dx, dy)| self.offset(x, y, dx, dy, width, height))
            .filter(move |&(nx, ny)| nx != x || ny != y)
    }

    /// Индексная версия [`Self::neighbors`] для плоских массивов `y * width + x`.
    pub fn neighbor_indices(self, idx: usize, width: u32, height: u32) -> impl Iterator<Item = usize> {
        let x = (idx % width as usize) as u32;
        let y = (idx / width as usize) as u32;
        self.neighbors(x, y, width, height)
            .map(move |(nx, ny)| ny as usize * width as usize + nx as usize)
    }

    fn offset(self, x: u32, y: u32, dx: i32, dy: i32, width: u32, height: u32) -> Option<(u32, u32)> {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if self.wrap {
            Some((
                nx.rem_euclid(width as i32) as u32,
                ny.rem_euclid(height as i32) as u32,
            ))
        } else if nx >= 0 && ny >= 0 && nx < width as i32 && ny < height as i32 {
            Some((nx as u32, ny as u32))
        } else {
            None
        }
    }
}

/// Клетка лежит на границе области.
#[must_use]
pub fn is_border(x: u32, y: u32, width: u32, height: u32) -> bool {
    x == 0 || y == 0 || x + 1 == width || y + 1 == height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_has_two_neighbors_without_wrap() {
        let topo = GridTopology::new(Connectivity::Four, false);
        let n: Vec<_> = topo.neighbors(0, 0, 5, 5).collect();
        assert_eq!(n, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn wrap_reaches_opposite_edge() {
        let topo = GridTopology::new(Connectivity::Four, true);
        let n: Vec<_> = topo.neighbors(0, 0, 5, 5).collect();
        assert_eq!(n, vec![(0, 4), (0, 1), (1, 0), (4, 0)]);
    }

    #[test]
    fn eight_connectivity_in_interior() {
        let topo = GridTopology::new(Connectivity::Eight, false);
        assert_eq!(topo.neighbors(2, 2, 5, 5).count(), 8);
        assert_eq!(topo.neighbors(0, 2, 5, 5).count(), 5);
    }

    #[test]
    fn neighbor_relation_is_symmetric() {
        for topo in [
            GridTopology::new(Connectivity::Four, false),
            GridTopology::new(Connectivity::Eight, true),
        ] {
            for idx in 0..36 {
                for n in topo.neighbor_indices(idx, 6, 6) {
                    assert!(topo.neighbor_indices(n, 6, 6).any(|m| m == idx));
                }
            }
        }
    }
}
