use super::{Downstream, DrainageNetwork, SegmentId};
use crate::error::Result;
use crate::region::RegionGraph;
use std::cmp::Ordering;
use tracing::debug;

/// Океанская клетка, в которую впадает устье.
fn outlet(graph: &RegionGraph, mouth: usize) -> Option<usize> {
    graph.cells[mouth]
        .downstream
        .filter(|&d| graph.cells[d].is_ocean())
        .or_else(|| graph.neighbors(mouth).iter().copied().find(|&n| graph.cells[n].is_ocean()))
}

/// Выделяет реки от устьев вверх по течению.
///
/// Устье — береговая клетка со стоком выше порога. Притоком клетки
/// становится сосед-суша выше неё, со стоком выше порога, но меньше её
/// собственного, ещё не принадлежащий реке. Береговой приток ведёт
/// реку вверх так же, как внутренний.
pub fn extract_rivers(graph: &RegionGraph, network: &mut DrainageNetwork, threshold: f32) -> Result<usize> {
    let mut mouths = 0;

    for mouth in 0..graph.len() {
        let cell = &graph.cells[mouth];
        if !cell.coastal || cell.discharge <= threshold || network.is_river(mouth) {
            continue;
        }
        let Some(ocean) = outlet(graph, mouth) else {
            continue;
        };

        let root = network.push_segment(mouth, cell.discharge, Downstream::Ocean(ocean))?;
        mouths += 1;

        let mut stack: Vec<(usize, SegmentId)> = vec![(mouth, root)];
        while let Some((idx, segment)) = stack.pop() {
            let current = &graph.cells[idx];
            let mut sources: Vec<usize> = graph
                .neighbors(idx)
                .iter()
                .copied()
                .filter(|&n| {
                    let c = &graph.cells[n];
                    c.is_land()
                        && c.elevation > current.elevation
                        && c.discharge > threshold
                        && c.discharge < current.discharge
                        && !network.is_river(n)
                })
                .collect();
            sources.sort_by(|&a, &b| {
                graph.cells[b]
                    .discharge
                    .partial_cmp(&graph.cells[a].discharge)
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });

            for n in sources {
                let child = network.push_segment(n, graph.cells[n].discharge, Downstream::Segment(segment))?;
                network.add_upstream(segment, child);
                stack.push((n, child));
            }
        }
    }

    debug!(mouths, segments = network.segments.len(), "rivers extracted");
    Ok(mouths)
}
