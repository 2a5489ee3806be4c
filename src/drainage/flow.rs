use crate::error::{MapgenError, Result};
use crate::region::RegionGraph;
use tracing::debug;

/// Самый низкий сосед строго ниже клетки; при равенстве первый по индексу.
pub fn lowest_neighbor(graph: &RegionGraph, idx: usize) -> Option<usize> {
    let mut min_h = graph.cells[idx].elevation;
    let mut target = None;
    for &n in graph.neighbors(idx) {
        let h = graph.cells[n].elevation;
        if h < min_h {
            min_h = h;
            target = Some(n);
        }
    }
    target
}

/// Накопление стока.
///
/// Каждая клетка суши получает `initial_water`, сток направлен к
/// самому низкому соседу. Затем проходы в порядке индексов передают
/// накопленную воду вниз, пока вся она не осядет в океане или в
/// бессточных клетках. Возвращает число проходов.
pub fn accumulate_flow(graph: &mut RegionGraph, initial_water: f32, max_passes: u32) -> Result<u32> {
    let total = graph.len();

    for idx in 0..total {
        let downstream = if graph.cells[idx].is_land() {
            lowest_neighbor(graph, idx)
        } else {
            None
        };
        let cell = &mut graph.cells[idx];
        cell.downstream = downstream;
        cell.water = if cell.is_land() { initial_water } else { 0.0 };
        cell.discharge = cell.water;
    }

    let mut pending: Vec<f32> = graph.cells.iter().map(|c| c.water).collect();
    let mut passes = 0;

    while pending.iter().any(|&p| p > 0.0) {
        if passes >= max_passes {
            return Err(MapgenError::FlowDidNotConverge { passes });
        }
        passes += 1;

        for idx in 0..total {
            let amount = pending[idx];
            if amount <= 0.0 {
                continue;
            }
            pending[idx] = 0.0;

            // Вода, пришедшая в океан или в бессточную клетку, дальше не идёт
            let Some(target) = graph.cells[idx].downstream else {
                continue;
            };
            if graph.cells[target].is_land() {
                graph.cells[target].discharge += amount;
                pending[target] += amount;
            }
        }
    }

    debug!(passes, cells = total, "flow accumulated");
    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Connectivity, GridTopology};
    use crate::heightmap::HeightField;

    fn slope() -> RegionGraph {
        // Одна строка: океан слева, подъём вправо
        let field = HeightField::from_data(5, 1, vec![0.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        RegionGraph::from_heightfield(&field, 1.0, GridTopology::new(Connectivity::Four, false)).unwrap()
    }

    #[test]
    fn water_runs_downhill_and_accumulates() {
        let mut graph = slope();
        accumulate_flow(&mut graph, 5.0, 100).unwrap();
        let discharge: Vec<f32> = graph.cells.iter().map(|c| c.discharge).collect();
        assert_eq!(discharge, vec![0.0, 20.0, 15.0, 10.0, 5.0]);
        assert_eq!(graph.cells[1].downstream, Some(0));
        assert_eq!(graph.cells[4].downstream, Some(3));
        assert_eq!(graph.cells[0].downstream, None);
    }

    #[test]
    fn ties_pick_the_lowest_index() {
        // Центр 3×3 с двумя равными низшими соседями: 1 и 3
        let mut data = vec![9.0; 9];
        data[4] = 5.0;
        data[1] = 2.0;
        data[3] = 2.0;
        let field = HeightField::from_data(3, 3, data).unwrap();
        let graph = RegionGraph::from_heightfield(&field, 0.0, GridTopology::new(Connectivity::Four, false)).unwrap();
        assert_eq!(lowest_neighbor(&graph, 4), Some(1));
    }

    #[test]
    fn sink_keeps_its_water() {
        let field = HeightField::from_data(3, 1, vec![4.0, 1.0, 4.0]).unwrap();
        let mut graph =
            RegionGraph::from_heightfield(&field, 0.0, GridTopology::new(Connectivity::Four, false)).unwrap();
        accumulate_flow(&mut graph, 5.0, 10).unwrap();
        assert_eq!(graph.cells[1].downstream, None);
        assert_eq!(graph.cells[1].discharge, 15.0);
    }

    #[test]
    fn tiny_pass_cap_reports_non_convergence() {
        // Вода идёт против порядка индексов: по одной клетке за проход
        let mut graph = slope();
        let err = accumulate_flow(&mut graph, 5.0, 1).unwrap_err();
        assert!(matches!(err, MapgenError::FlowDidNotConverge { passes: 1 }));
    }
}
