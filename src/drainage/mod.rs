//! Речная сеть и озёра
//!
//! Порядок работы [`route`]:
//! 1. накопление стока по направлению наискорейшего спуска ([`accumulate_flow`]);
//! 2. выделение рек от устьев вверх по течению ([`extract_rivers`]);
//! 3. прокладка рек из бессточных клеток через озёра ([`Router`]).
//!
//! Сегменты и озёра ссылаются на клетки [`RegionGraph`] только по индексу.

pub mod flow;
pub mod lake;
pub mod rivers;
pub mod route;

use crate::config::HydrologySettings;
use crate::error::{MapgenError, Result};
use crate::region::RegionGraph;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

pub use flow::accumulate_flow;
pub use lake::{LakeFlood, flood_lake};
pub use rivers::extract_rivers;
pub use route::{RouteState, Router};

pub type SegmentId = usize;
pub type LakeId = usize;

/// Куда уходит вода из сегмента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Downstream {
    Segment(SegmentId),
    Lake(LakeId),
    /// Впадает в океан через указанную клетку
    Ocean(usize),
    /// Уходит за край области
    Edge,
}

/// Одна речная клетка
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverSegment {
    pub cell: usize,
    pub discharge: f32,
    /// Притоки по убыванию стока: первый считается стволом, остальные ветвями
    pub upstream: Vec<SegmentId>,
    pub downstream: Downstream,
    /// Озеро, из которого вытекает этот сегмент
    pub source_lake: Option<LakeId>,
}

impl RiverSegment {
    pub fn trunk(&self) -> Option<SegmentId> {
        self.upstream.first().copied()
    }

    pub fn branches(&self) -> &[SegmentId] {
        self.upstream.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lake {
    /// Клетки, затопленные на уровне `level`
    pub cells: Vec<usize>,
    pub level: f32,
    /// Клетка, где вода остановилась
    pub basin: usize,
    /// Точка перелива. `None` у бессточного озера
    pub spill: Option<usize>,
    /// Сегмент, питающий озеро
    pub upstream: Option<SegmentId>,
    /// Сток, приходящий в озеро
    pub inflow: f32,
}

impl Lake {
    pub fn is_endorheic(&self) -> bool {
        self.spill.is_none()
    }
}

/// Сводка по одной реке (дереву сегментов с общим низовьем)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiverSummary {
    pub root: SegmentId,
    pub segments: usize,
    /// Речные клетки плюс клетки озёр выше по течению
    pub cells: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrainageNetwork {
    pub segments: Vec<RiverSegment>,
    pub lakes: Vec<Lake>,
    /// Проходов накопления стока до неподвижной точки
    pub flow_passes: u32,
    #[serde(skip)]
    segment_of: Vec<Option<SegmentId>>,
    #[serde(skip)]
    lake_of: Vec<Option<LakeId>>,
}

impl DrainageNetwork {
    pub fn new(cell_count: usize) -> Self {
        Self {
            segments: Vec::new(),
            lakes: Vec::new(),
            flow_passes: 0,
            segment_of: vec![None; cell_count],
            lake_of: vec![None; cell_count],
        }
    }

    pub fn segment_of(&self, cell: usize) -> Option<SegmentId> {
        self.segment_of[cell]
    }

    pub fn lake_of(&self, cell: usize) -> Option<LakeId> {
        self.lake_of[cell]
    }

    pub fn is_river(&self, cell: usize) -> bool {
        self.segment_of[cell].is_some()
    }

    /// Делает клетку речной. Повторное назначение считается ошибкой логики.
    pub fn push_segment(&mut self, cell: usize, discharge: f32, downstream: Downstream) -> Result<SegmentId> {
        if let Some(segment) = self.segment_of[cell] {
            return Err(MapgenError::DuplicateRiverAssignment { cell, segment });
        }
        let id = self.segments.len();
        self.segments.push(RiverSegment {
            cell,
            discharge,
            upstream: Vec::new(),
            downstream,
            source_lake: None,
        });
        self.segment_of[cell] = Some(id);
        Ok(id)
    }

    /// Вставляет приток, сохраняя порядок по убыванию стока (при равенстве по id).
    pub fn add_upstream(&mut self, parent: SegmentId, child: SegmentId) {
        let discharge = self.segments[child].discharge;
        let segments = &self.segments;
        let pos = segments[parent].upstream.partition_point(|&s| {
            let d = segments[s].discharge;
            d > discharge || (d == discharge && s < child)
        });
        self.segments[parent].upstream.insert(pos, child);
    }

    pub fn push_lake(&mut self, lake: Lake) -> LakeId {
        let id = self.lakes.len();
        for &cell in &lake.cells {
            self.lake_of[cell] = Some(id);
        }
        self.lakes.push(lake);
        id
    }

    /// Сегменты, за которыми нет другого сегмента: устья, краевые выходы, впадения в озёра.
    pub fn roots(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !matches!(s.downstream, Downstream::Segment(_)))
            .map(|(id, _)| id)
    }

    /// Число сегментов и клеток в дереве с корнем `root`, включая озёра выше по течению.
    pub fn summarize(&self, root: SegmentId) -> RiverSummary {
        let mut segments = 0;
        let mut cells = 0;
        let mut seen_lakes = vec![false; self.lakes.len()];
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let segment = &self.segments[id];
            segments += 1;
            cells += 1;
            stack.extend(segment.upstream.iter().copied());

            if let Some(lake_id) = segment.source_lake {
                if !seen_lakes[lake_id] {
                    seen_lakes[lake_id] = true;
                    let lake = &self.lakes[lake_id];
                    cells += lake.cells.len();
                    stack.extend(lake.upstream);
                }
            }
        }
        RiverSummary {
            root,
            segments,
            cells,
        }
    }

    /// Число шагов по суше до ближайшей речной клетки; `None` для океана и недостижимых клеток.
    pub fn distance_from_river(&self, graph: &RegionGraph) -> Vec<Option<u32>> {
        let mut distance = vec![None; graph.len()];
        let mut queue = VecDeque::new();
        for segment in &self.segments {
            if distance[segment.cell].is_none() {
                distance[segment.cell] = Some(0);
                queue.push_back(segment.cell);
            }
        }
        while let Some(idx) = queue.pop_front() {
            let next = distance[idx].map_or(0, |d| d + 1);
            for &n in graph.neighbors(idx) {
                if distance[n].is_none() && graph.cells[n].is_land() {
                    distance[n] = Some(next);
                    queue.push_back(n);
                }
            }
        }
        distance
    }
}

/// Полный расчёт гидрологии поверх графа регионов.
///
/// Бессточные озёра (`NoSpillFound`) не прерывают расчёт: озеро остаётся без
/// выхода, остальные реки строятся дальше.
pub fn route(graph: &mut RegionGraph, settings: &HydrologySettings) -> Result<DrainageNetwork> {
    let flow_passes = accumulate_flow(graph, settings.initial_water, settings.max_flow_passes)?;

    let mut network = DrainageNetwork::new(graph.len());
    network.flow_passes = flow_passes;
    extract_rivers(graph, &mut network, settings.river_threshold)?;

    if settings.route_sinks {
        for cell in 0..graph.len() {
            let c = &graph.cells[cell];
            let is_sink = c.is_land() && c.downstream.is_none() && !c.on_edge;
            if !is_sink
                || c.discharge <= settings.river_threshold
                || network.is_river(cell)
                || network.lake_of(cell).is_some()
            {
                continue;
            }
            let router = Router::new(cell, &network);
            match router.run(graph, &mut network, settings.lake_level_step, settings.max_lake_levels) {
                Ok(_) => {}
                Err(MapgenError::NoSpillFound { cell, levels }) => {
                    warn!(cell, levels, "basin has no spill point, leaving an endorheic lake");
                }
                Err(err) => return Err(err),
            }
        }
    }

    info!(
        flow_passes,
        segments = network.segments.len(),
        lakes = network.lakes.len(),
        "drainage network built"
    );
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_with(discharges: &[f32]) -> DrainageNetwork {
        let mut network = DrainageNetwork::new(discharges.len());
        for (cell, &d) in discharges.iter().enumerate() {
            network.push_segment(cell, d, Downstream::Edge).unwrap();
        }
        network
    }

    #[test]
    fn upstream_stays_sorted_by_discharge() {
        let mut network = network_with(&[500.0, 60.0, 100.0, 80.0, 100.0]);
        for child in 1..5 {
            network.add_upstream(0, child);
        }
        let root = &network.segments[0];
        assert_eq!(root.upstream, vec![2, 4, 3, 1]);
        assert_eq!(root.trunk(), Some(2));
        assert_eq!(root.branches(), &[4, 3, 1]);
    }

    #[test]
    fn cell_cannot_join_two_rivers() {
        let mut network = DrainageNetwork::new(3);
        let first = network.push_segment(1, 10.0, Downstream::Edge).unwrap();
        let err = network.push_segment(1, 10.0, Downstream::Edge).unwrap_err();
        assert!(matches!(
            err,
            MapgenError::DuplicateRiverAssignment { cell: 1, segment } if segment == first
        ));
    }

    #[test]
    fn segment_without_upstream_has_no_trunk() {
        let network = network_with(&[1.0]);
        assert_eq!(network.segments[0].trunk(), None);
        assert!(network.segments[0].branches().is_empty());
    }

    #[test]
    fn summary_counts_lakes_upstream() {
        let mut network = DrainageNetwork::new(10);
        let mouth = network.push_segment(0, 50.0, Downstream::Ocean(9)).unwrap();
        let spill = network.push_segment(1, 40.0, Downstream::Segment(mouth)).unwrap();
        network.add_upstream(mouth, spill);
        let feeder = network.push_segment(5, 30.0, Downstream::Lake(0)).unwrap();
        let lake = network.push_lake(Lake {
            cells: vec![2, 3, 4],
            level: 3.0,
            basin: 2,
            spill: Some(1),
            upstream: Some(feeder),
            inflow: 30.0,
        });
        network.segments[spill].source_lake = Some(lake);

        assert_eq!(network.roots().collect::<Vec<_>>(), vec![mouth, feeder]);
        let summary = network.summarize(mouth);
        assert_eq!(summary.segments, 3);
        assert_eq!(summary.cells, 6);
        assert_eq!(network.lake_of(3), Some(lake));
    }
}
