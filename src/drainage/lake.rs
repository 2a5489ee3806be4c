use crate::depression::next_up;
use crate::region::RegionGraph;
use std::collections::VecDeque;
use tracing::trace;

/// Результат затопления котловины
#[derive(Debug, Clone, PartialEq)]
pub struct LakeFlood {
    /// Затопленные клетки на последнем уровне без перелива
    pub cells: Vec<usize>,
    pub level: f32,
    /// Первая клетка ниже дна озера; `None`, если уровни кончились
    pub spill: Option<usize>,
    /// Сколько уровней перебрано
    pub levels: u32,
}

/// Связная область от `start` с высотой не выше `level`, в порядке BFS.
fn flood_set(graph: &RegionGraph, start: usize, level: f32, excluded: &dyn Fn(usize) -> bool) -> Vec<usize> {
    let mut visited = vec![false; graph.len()];
    let mut set = vec![start];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(idx) = queue.pop_front() {
        for &n in graph.neighbors(idx) {
            if visited[n] || excluded(n) || graph.cells[n].elevation > level {
                continue;
            }
            visited[n] = true;
            set.push(n);
            queue.push_back(n);
        }
    }
    set
}

/// Поднимает уровень воды от клетки `start`, пока затопленная область не
/// дотянется до клетки ниже своего прежнего дна.
///
/// Клетки из `excluded` (реки, другие озёра, текущий путь) не затапливаются.
/// Океан может оказаться точкой перелива, но членом озера не бывает: он
/// всегда ниже дна.
pub fn flood_lake(
    graph: &RegionGraph,
    start: usize,
    excluded: &dyn Fn(usize) -> bool,
    step: f32,
    max_levels: u32,
) -> LakeFlood {
    let mut level = graph.cells[start].elevation;
    let mut lake = vec![start];
    let mut lake_level = level;
    let mut floor = level;

    for levels in 1..=max_levels {
        let set = flood_set(graph, start, level, excluded);
        if let Some(&spill) = set.iter().find(|&&c| graph.cells[c].elevation < floor) {
            trace!(start, spill, level, levels, "spill point found");
            return LakeFlood {
                cells: lake,
                level: lake_level,
                spill: Some(spill),
                levels,
            };
        }

        floor = set
            .iter()
            .map(|&c| graph.cells[c].elevation)
            .fold(floor, f32::min);
        lake = set;
        lake_level = level;
        // Шаг не меньше одного ulp, иначе на больших высотах уровень не растёт
        level = (level + step).max(next_up(level));
    }

    LakeFlood {
        cells: lake,
        level: lake_level,
        spill: None,
        levels: max_levels,
    }
}
