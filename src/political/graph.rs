//! Граф смежности королевств

use std::collections::BTreeMap;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::partition::{AdjacencyProvider, Partition};

/// Граница двух королевств: число пар соседних ячеек через неё
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryBorder {
    pub a: usize,
    pub b: usize,
    pub shared_edges: usize,
}

/// Пары соседних ячеек суши из разных королевств (`a < b` по индексу ячейки)
#[must_use]
pub fn border_cell_pairs(partition: &Partition, territory_of: &[Option<usize>]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for cell in 0..partition.len() {
        let Some(owner) = territory_of[cell] else {
            continue;
        };
        for &n in partition.neighbors(cell) {
            if n > cell && territory_of[n].is_some_and(|other| other != owner) {
                pairs.push((cell, n));
            }
        }
    }
    pairs
}

/// Сводит пары ячеек в границы королевств, упорядоченные по `(a, b)`.
#[must_use]
pub fn collect_borders(pairs: &[(usize, usize)], territory_of: &[Option<usize>]) -> Vec<TerritoryBorder> {
    let mut counts: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for &(x, y) in pairs {
        if let (Some(tx), Some(ty)) = (territory_of[x], territory_of[y]) {
            *counts.entry((tx.min(ty), tx.max(ty))).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|((a, b), shared_edges)| TerritoryBorder { a, b, shared_edges })
        .collect()
}

/// Узел `i` графа — королевство `i`, вес ребра — длина границы в парах ячеек.
#[must_use]
pub fn build_territory_graph(territories: usize, borders: &[TerritoryBorder]) -> UnGraph<usize, usize> {
    let mut graph = UnGraph::with_capacity(territories, borders.len());
    for id in 0..territories {
        graph.add_node(id);
    }
    for border in borders {
        graph.add_edge(
            NodeIndex::new(border.a),
            NodeIndex::new(border.b),
            border.shared_edges,
        );
    }
    graph
}
