//! Граф регионов: клетки, смежность, суша/океан, береговая линия
//!
//! Клетки принадлежат [`RegionGraph`] и адресуются стабильным индексом.
//! Смежность хранится в `petgraph` (для потребителей) и продублирована в
//! отсортированных списках соседей: фиксированный порядок нужен гидрологии
//! для детерминированного выбора при равных высотах.

pub mod graph;
pub mod partition;

use crate::config::ReprofileSettings;
use crate::error::{MapgenError, Result};
use crate::grid::{GridTopology, is_border};
use crate::heightmap::HeightField;
use crate::random::RandomSource;
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

pub use graph::{partition_adjacency, raster_adjacency, sorted_neighbors};
pub use partition::{scatter_sites, site_elevations, voronoi_partition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellType {
    Land,
    Ocean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub index: usize,
    pub elevation: f32,
    pub cell_type: CellType,
    /// Суша, граничащая с океаном
    pub coastal: bool,
    /// Шаги BFS от берега: 1 у береговых клеток, 0 у океана и недостижимой суши
    pub distance_from_coast: u32,
    /// Клетка касается границы области (вода может уйти за край)
    pub on_edge: bool,
    /// Центр клетки в координатах карты высот
    pub center: (f32, f32),
    /// Собственная вода клетки
    pub water: f32,
    /// Сток, прошедший через клетку
    pub discharge: f32,
    /// Самый низкий сосед ниже клетки
    pub downstream: Option<usize>,
}

impl Cell {
    fn new(index: usize, elevation: f32, on_edge: bool, center: (f32, f32)) -> Self {
        Self {
            index,
            elevation,
            cell_type: CellType::Land,
            coastal: false,
            distance_from_coast: 0,
            on_edge,
            center,
            water: 0.0,
            discharge: 0.0,
            downstream: None,
        }
    }

    pub fn is_land(&self) -> bool {
        self.cell_type == CellType::Land
    }

    pub fn is_ocean(&self) -> bool {
        self.cell_type == CellType::Ocean
    }
}

#[derive(Debug, Clone)]
pub struct RegionGraph {
    pub cells: Vec<Cell>,
    /// Неориентированный граф смежности, вес узла равен индексу клетки
    pub graph: UnGraph<u32, ()>,
    pub sea_level: f32,
    neighbors: Vec<Vec<usize>>,
}

impl RegionGraph {
    /// Клетка на каждый пиксель поля высот.
    pub fn from_heightfield(field: &HeightField, sea_level: f32, topology: GridTopology) -> Result<Self> {
        let total = (field.width * field.height) as usize;
        if field.data.len() != total {
            return Err(MapgenError::SizeMismatch {
                expected: total,
                actual: field.data.len(),
            });
        }

        let cells = field
            .data
            .iter()
            .enumerate()
            .map(|(i, &elevation)| {
                let x = i as u32 % field.width;
                let y = i as u32 / field.width;
                let on_edge = !topology.wrap && is_border(x, y, field.width, field.height);
                Cell::new(i, elevation, on_edge, (x as f32 + 0.5, y as f32 + 0.5))
            })
            .collect();

        let graph = raster_adjacency(field.width, field.height, topology);
        Ok(Self::assemble(cells, graph, sea_level))
    }

    /// Клетки внешнего разбиения: `labels[pixel]` — индекс региона,
    /// `elevations[region]` — его высота. Соседство — по общим границам.
    pub fn from_partition(
        labels: &[u32],
        width: u32,
        height: u32,
        elevations: &[f32],
        sea_level: f32,
        wrap: bool,
    ) -> Result<Self> {
        let total = (width * height) as usize;
        if labels.len() != total {
            return Err(MapgenError::SizeMismatch {
                expected: total,
                actual: labels.len(),
            });
        }
        let count = elevations.len();
        if let Some(&bad) = labels.iter().find(|&&id| id as usize >= count) {
            return Err(MapgenError::SizeMismatch {
                expected: count,
                actual: bad as usize + 1,
            });
        }

        // Центроиды и касание края
        let mut sums = vec![(0.0f64, 0.0f64, 0usize); count];
        let mut on_edge = vec![false; count];
        for (i, &id) in labels.iter().enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            let entry = &mut sums[id as usize];
            entry.0 += f64::from(x) + 0.5;
            entry.1 += f64::from(y) + 0.5;
            entry.2 += 1;
            if !wrap && is_border(x, y, width, height) {
                on_edge[id as usize] = true;
            }
        }

        let cells = elevations
            .iter()
            .enumerate()
            .map(|(i, &elevation)| {
                let (sx, sy, n) = sums[i];
                let center = if n == 0 {
                    (0.0, 0.0)
                } else {
                    ((sx / n as f64) as f32, (sy / n as f64) as f32)
                };
                Cell::new(i, elevation, on_edge[i], center)
            })
            .collect();

        let graph = partition_adjacency(labels, width, height, count, wrap);
        Ok(Self::assemble(cells, graph, sea_level))
    }

    fn assemble(cells: Vec<Cell>, graph: UnGraph<u32, ()>, sea_level: f32) -> Self {
        let neighbors = sorted_neighbors(&graph);
        let mut region = Self {
            cells,
            graph,
            sea_level,
            neighbors,
        };
        region.classify();
        region.compute_distance_from_coast();
        debug!(
            cells = region.cells.len(),
            land = region.land_count(),
            coastal = region.cells.iter().filter(|c| c.coastal).count(),
            "region graph built"
        );
        region
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Соседи клетки по возрастанию индекса.
    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.neighbors[idx]
    }

    pub fn land_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_land()).count()
    }

    pub fn coastal_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().filter(|c| c.coastal).map(|c| c.index)
    }

    /// Океан лежит строго ниже уровня моря. Берег: суша с соседом-океаном.
    fn classify(&mut self) {
        for cell in &mut self.cells {
            cell.cell_type = if cell.elevation < self.sea_level {
                CellType::Ocean
            } else {
                CellType::Land
            };
        }
        for i in 0..self.cells.len() {
            let coastal = self.cells[i].is_land()
                && self.neighbors[i].iter().any(|&n| self.cells[n].is_ocean());
            self.cells[i].coastal = coastal;
        }
    }

    /// BFS от всех береговых клеток одновременно, только по суше.
    fn compute_distance_from_coast(&mut self) {
        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        for cell in &mut self.cells {
            cell.distance_from_coast = 0;
            if cell.coastal {
                cell.distance_from_coast = 1;
                visited[cell.index] = true;
                queue.push_back(cell.index);
            }
        }

        while let Some(idx) = queue.pop_front() {
            let next = self.cells[idx].distance_from_coast + 1;
            for &n in &self.neighbors[idx] {
                if !visited[n] && self.cells[n].is_land() {
                    visited[n] = true;
                    self.cells[n].distance_from_coast = next;
                    queue.push_back(n);
                }
            }
        }
    }

    /// Переопределяет высоту суши: подъём от берега вглубь материка плюс небольшой шум.
    /// Классификация не меняется: новая высота суши не ниже уровня моря.
    pub fn reprofile(&mut self, settings: &ReprofileSettings, rng: &mut dyn RandomSource) {
        for cell in &mut self.cells {
            if cell.is_land() {
                let jitter = rng.uniform_real(settings.jitter_min, settings.jitter_max);
                cell.elevation = self.sea_level
                    + cell.distance_from_coast as f32 * settings.gradient
                    + jitter.max(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depression::{fill_depressions, next_up};
    use crate::grid::Connectivity;
    use crate::random::seeded_rng;

    fn four() -> GridTopology {
        GridTopology::new(Connectivity::Four, false)
    }

    /// Остров 3×3 в центре океана 5×5
    fn island() -> HeightField {
        let mut data = vec![0.0; 25];
        for y in 1..4 {
            for x in 1..4 {
                data[y * 5 + x] = 5.0;
            }
        }
        HeightField::from_data(5, 5, data).unwrap()
    }

    #[test]
    fn classification_and_coast() {
        let region = RegionGraph::from_heightfield(&island(), 1.0, four()).unwrap();
        assert_eq!(region.land_count(), 9);
        for cell in &region.cells {
            if cell.coastal {
                assert!(cell.is_land());
                assert!(region.neighbors(cell.index).iter().any(|&n| region.cells[n].is_ocean()));
            }
        }
        // Центр острова не касается океана
        assert!(!region.cells[12].coastal);
        assert_eq!(region.cells[12].distance_from_coast, 2);
        assert_eq!(region.cells[6].distance_from_coast, 1);
        assert_eq!(region.cells[0].distance_from_coast, 0);
    }

    #[test]
    fn elevation_equal_to_sea_level_is_land() {
        let region = RegionGraph::from_heightfield(&island(), 5.0, four()).unwrap();
        assert_eq!(region.land_count(), 9);
        let region = RegionGraph::from_heightfield(&island(), next_up(5.0), four()).unwrap();
        assert_eq!(region.land_count(), 0);
        assert!(region.cells.iter().all(|c| c.distance_from_coast == 0));
    }

    #[test]
    fn filled_pit_next_to_boundary_is_one_step_from_coast() {
        let mut data = vec![10.0; 25];
        data[12] = 0.0;
        let field = HeightField::from_data(5, 5, data).unwrap();
        let filled = fill_depressions(&field, four()).unwrap().field;
        let region = RegionGraph::from_heightfield(&filled, next_up(10.0), four()).unwrap();
        assert_eq!(region.cells[6].distance_from_coast, 1);
        assert_eq!(region.cells[7].distance_from_coast, 1);
        assert_eq!(region.cells[12].distance_from_coast, 2);
    }

    #[test]
    fn unreached_land_keeps_zero_distance() {
        // Суша без океана вовсе
        let field = HeightField::from_data(3, 3, vec![4.0; 9]).unwrap();
        let region = RegionGraph::from_heightfield(&field, 1.0, four()).unwrap();
        assert!(region.cells.iter().all(|c| c.is_land() && !c.coastal));
        assert!(region.cells.iter().all(|c| c.distance_from_coast == 0));
    }

    #[test]
    fn edges_are_flagged_only_without_wrap() {
        let open = RegionGraph::from_heightfield(&island(), 1.0, four()).unwrap();
        assert!(open.cells[0].on_edge && !open.cells[12].on_edge);
        let wrapped =
            RegionGraph::from_heightfield(&island(), 1.0, GridTopology::new(Connectivity::Four, true)).unwrap();
        assert!(wrapped.cells.iter().all(|c| !c.on_edge));
    }

    #[test]
    fn partition_cells_take_site_elevations() {
        // 0 0 1 1
        // 0 0 1 1
        // 2 2 2 2
        let labels = [0, 0, 1, 1, 0, 0, 1, 1, 2, 2, 2, 2];
        let region = RegionGraph::from_partition(&labels, 4, 3, &[5.0, 6.0, 0.0], 1.0, false).unwrap();
        assert_eq!(region.len(), 3);
        assert!(region.cells[2].is_ocean());
        assert!(region.cells[0].coastal && region.cells[1].coastal);
        assert_eq!(region.neighbors(0), &[1, 2]);
        assert_eq!(region.cells[0].center, (1.0, 1.0));
        assert_eq!(region.graph.edge_count(), 3);
    }

    #[test]
    fn partition_with_unknown_label_is_rejected() {
        let err = RegionGraph::from_partition(&[0, 3], 2, 1, &[1.0, 2.0], 0.0, false).unwrap_err();
        assert!(matches!(err, MapgenError::SizeMismatch { .. }));
    }

    #[test]
    fn reprofile_rises_inland() {
        let mut region = RegionGraph::from_heightfield(&island(), 1.0, four()).unwrap();
        region.reprofile(&ReprofileSettings::default(), &mut seeded_rng(1));
        let coast = region.cells[6].elevation;
        let inland = region.cells[12].elevation;
        assert!(coast >= 1.0 + 7.0 + 1.0 && coast < 1.0 + 7.0 + 3.9);
        assert!(inland > coast);
        assert_eq!(region.cells[0].elevation, 0.0);
    }
}
