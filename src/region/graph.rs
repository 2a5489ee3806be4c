use crate::grid::{Connectivity, GridTopology};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashSet;

/// Граф смежности растра: узел на каждый пиксель, вес узла равен его индексу.
pub fn raster_adjacency(width: u32, height: u32, topology: GridTopology) -> UnGraph<u32, ()> {
    let total = (width * height) as usize;
    let mut graph = UnGraph::with_capacity(total, total * topology.connectivity.offsets().len() / 2);
    for idx in 0..total {
        graph.add_node(idx as u32);
    }

    let mut edges = HashSet::new();
    for idx in 0..total {
        for n in topology.neighbor_indices(idx, width, height) {
            let (a, b) = if idx < n { (idx, n) } else { (n, idx) };
            if edges.insert((a, b)) {
                graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
            }
        }
    }
    graph
}

/// Граф смежности разбиения: регионы соседствуют, если их пиксели касаются сторонами.
pub fn partition_adjacency(labels: &[u32], width: u32, height: u32, count: usize, wrap: bool) -> UnGraph<u32, ()> {
    let mut graph = UnGraph::new_undirected();
    for id in 0..count {
        graph.add_node(id as u32);
    }

    let topology = GridTopology::new(Connectivity::Four, wrap);
    let mut edges = HashSet::new();

    for (idx, &id) in labels.iter().enumerate() {
        for n in topology.neighbor_indices(idx, width, height) {
            let n_id = labels[n];
            if n_id != id {
                let (a, b) = if id < n_id { (id, n_id) } else { (n_id, id) };
                if edges.insert((a, b)) {
                    graph.add_edge(NodeIndex::new(a as usize), NodeIndex::new(b as usize), ());
                }
            }
        }
    }
    graph
}

/// Списки соседей, отсортированные по индексу: фиксированный порядок обхода.
pub fn sorted_neighbors(graph: &UnGraph<u32, ()>) -> Vec<Vec<usize>> {
    graph
        .node_indices()
        .map(|node| {
            let mut list: Vec<usize> = graph.neighbors(node).map(NodeIndex::index).collect();
            list.sort_unstable();
            list.dedup();
            list
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_edge_count_matches_grid() {
        let graph = raster_adjacency(4, 3, GridTopology::new(Connectivity::Four, false));
        assert_eq!(graph.node_count(), 12);
        // 3 строки × 3 горизонтальных + 2 × 4 вертикальных
        assert_eq!(graph.edge_count(), 17);
    }

    #[test]
    fn partition_neighbors_come_from_shared_borders() {
        // 0 0 1
        // 2 2 1
        let labels = [0, 0, 1, 2, 2, 1];
        let graph = partition_adjacency(&labels, 3, 2, 3, false);
        let neighbors = sorted_neighbors(&graph);
        assert_eq!(neighbors[0], vec![1, 2]);
        assert_eq!(neighbors[1], vec![0, 2]);
        assert_eq!(neighbors[2], vec![0, 1]);
    }

    #[test]
    fn wrapped_partition_joins_left_and_right() {
        let labels = [0, 1, 2];
        let open = sorted_neighbors(&partition_adjacency(&labels, 3, 1, 3, false));
        let wrapped = sorted_neighbors(&partition_adjacency(&labels, 3, 1, 3, true));
        assert_eq!(open[0], vec![1]);
        assert_eq!(wrapped[0], vec![1, 2]);
    }
}
