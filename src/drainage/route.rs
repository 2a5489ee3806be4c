//! Прокладка реки курсором от бессточной клетки
//!
//! Курсор спускается по `downstream`, собирая путь. Путь превращается в
//! сегменты только когда известен его конец: океан, край, существующая
//! река или озеро. Из озера курсор продолжает путь от точки перелива.

use super::lake::flood_lake;
use super::{Downstream, DrainageNetwork, Lake, LakeId, SegmentId};
use crate::error::{MapgenError, Result};
use crate::region::RegionGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Состояние курсора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteState {
    Flowing { cell: usize, on_river: bool },
    EnteringLake { cell: usize },
    Flooding { cell: usize },
    SpillFound { lake: LakeId, spill: usize },
    ReachedOcean { cell: usize },
    ReachedEdge { cell: usize },
}

impl RouteState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteState::ReachedOcean { .. } | RouteState::ReachedEdge { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    state: RouteState,
    path: Vec<usize>,
    on_path: HashSet<usize>,
    /// Озеро, из которого вытекает текущий путь
    source_lake: Option<LakeId>,
    /// Сток, вынесенный из озёр выше по течению
    carried: f32,
}

impl Router {
    pub fn new(source: usize, network: &DrainageNetwork) -> Self {
        Self {
            state: RouteState::Flowing {
                cell: source,
                on_river: network.is_river(source),
            },
            path: Vec::new(),
            on_path: HashSet::new(),
            source_lake: None,
            carried: 0.0,
        }
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    /// Один переход автомата. Для конечных состояний ничего не делает.
    pub fn step(
        &mut self,
        graph: &RegionGraph,
        network: &mut DrainageNetwork,
        level_step: f32,
        max_levels: u32,
    ) -> Result<RouteState> {
        let next = match self.state {
            RouteState::Flowing { cell, on_river: false } => self.flow(graph, network, cell)?,
            RouteState::Flowing { cell, on_river: true } => {
                // Присоединение к существующей реке; дальше путь уже проложен
                if let Some(segment) = network.segment_of(cell) {
                    self.finish_path(graph, network, Downstream::Segment(segment))?;
                    ride_segment(graph, network, segment, max_levels)?
                } else {
                    RouteState::Flowing { cell, on_river: false }
                }
            }
            RouteState::EnteringLake { cell } => RouteState::Flooding { cell },
            RouteState::Flooding { cell } => self.flood(graph, network, cell, level_step, max_levels)?,
            RouteState::SpillFound { spill, .. } => RouteState::Flowing {
                cell: spill,
                on_river: network.is_river(spill),
            },
            terminal => terminal,
        };
        trace!(?next, "route step");
        self.state = next;
        Ok(next)
    }

    /// Шагает до океана или края.
    pub fn run(
        mut self,
        graph: &RegionGraph,
        network: &mut DrainageNetwork,
        level_step: f32,
        max_levels: u32,
    ) -> Result<RouteState> {
        while !self.state.is_terminal() {
            self.step(graph, network, level_step, max_levels)?;
        }
        debug!(state = ?self.state, "route finished");
        Ok(self.state)
    }

    fn flow(&mut self, graph: &RegionGraph, network: &mut DrainageNetwork, cell: usize) -> Result<RouteState> {
        let c = &graph.cells[cell];
        if c.is_ocean() {
            self.finish_path(graph, network, Downstream::Ocean(cell))?;
            return Ok(RouteState::ReachedOcean { cell });
        }
        if let Some(lake) = network.lake_of(cell) {
            self.finish_path(graph, network, Downstream::Lake(lake))?;
            return ride_lake(graph, network, lake, 0);
        }
        match c.downstream {
            Some(next) => {
                self.push_path(cell);
                Ok(RouteState::Flowing {
                    cell: next,
                    on_river: network.is_river(next),
                })
            }
            None if c.on_edge => {
                self.push_path(cell);
                self.finish_path(graph, network, Downstream::Edge)?;
                Ok(RouteState::ReachedEdge { cell })
            }
            None => Ok(RouteState::EnteringLake { cell }),
        }
    }

    fn flood(
        &mut self,
        graph: &RegionGraph,
        network: &mut DrainageNetwork,
        cell: usize,
        level_step: f32,
        max_levels: u32,
    ) -> Result<RouteState> {
        let flood = {
            let net: &DrainageNetwork = network;
            let on_path = &self.on_path;
            let excluded = |n: usize| net.is_river(n) || net.lake_of(n).is_some() || on_path.contains(&n);
            flood_lake(graph, cell, &excluded, level_step, max_levels)
        };

        let lake_id = network.lakes.len();
        let upstream = self.finish_path(graph, network, Downstream::Lake(lake_id))?;
        let inflow = match upstream {
            Some(segment) => network.segments[segment].discharge,
            None => graph.cells[cell].discharge + self.carried,
        };
        network.push_lake(Lake {
            cells: flood.cells,
            level: flood.level,
            basin: cell,
            spill: flood.spill,
            upstream,
            inflow,
        });

        match flood.spill {
            Some(spill) => {
                self.source_lake = Some(lake_id);
                self.carried = inflow;
                Ok(RouteState::SpillFound { lake: lake_id, spill })
            }
            None => Err(MapgenError::NoSpillFound {
                cell,
                levels: flood.levels,
            }),
        }
    }

    fn push_path(&mut self, cell: usize) {
        self.path.push(cell);
        self.on_path.insert(cell);
    }

    /// Превращает путь в сегменты от конца к началу и возвращает последний
    /// (ближайший к `terminal`).
    fn finish_path(
        &mut self,
        graph: &RegionGraph,
        network: &mut DrainageNetwork,
        terminal: Downstream,
    ) -> Result<Option<SegmentId>> {
        let mut downstream = terminal;
        let mut last = None;

        for (i, &cell) in self.path.iter().enumerate().rev() {
            let discharge = graph.cells[cell].discharge + self.carried;
            let segment = network.push_segment(cell, discharge, downstream)?;
            if let Downstream::Segment(parent) = downstream {
                network.add_upstream(parent, segment);
            }
            if i == 0 {
                network.segments[segment].source_lake = self.source_lake;
            }
            if last.is_none() {
                last = Some(segment);
            }
            downstream = Downstream::Segment(segment);
        }

        self.path.clear();
        self.on_path.clear();
        self.source_lake = None;
        Ok(last)
    }
}

/// Следует по уже проложенной реке до её конца.
fn ride_segment(
    graph: &RegionGraph,
    network: &DrainageNetwork,
    segment: SegmentId,
    max_levels: u32,
) -> Result<RouteState> {
    let mut current = segment;
    loop {
        let s = &network.segments[current];
        match s.downstream {
            Downstream::Segment(next) => current = next,
            Downstream::Ocean(cell) => return Ok(RouteState::ReachedOcean { cell }),
            Downstream::Edge => return Ok(RouteState::ReachedEdge { cell: s.cell }),
            Downstream::Lake(lake) => return ride_lake(graph, network, lake, max_levels),
        }
    }
}

fn ride_lake(graph: &RegionGraph, network: &DrainageNetwork, lake: LakeId, max_levels: u32) -> Result<RouteState> {
    let l = &network.lakes[lake];
    match l.spill {
        None => Err(MapgenError::NoSpillFound {
            cell: l.basin,
            levels: max_levels,
        }),
        Some(spill) if graph.cells[spill].is_ocean() => Ok(RouteState::ReachedOcean { cell: spill }),
        Some(spill) => Ok(RouteState::Flowing {
            cell: spill,
            on_river: network.is_river(spill),
        }),
    }
}
