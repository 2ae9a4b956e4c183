//! Раскраска графа королевств
//!
//! Жадно, по убыванию степени. Цвет соседа запрещён; соседний по палитре цвет
//! (±1) нежелателен. Если свободного цвета нет, берётся наименее конфликтный.

use petgraph::graph::{NodeIndex, UnGraph};

/// Индексы цветов палитры `0..palette_size` для каждого узла.
#[must_use]
pub fn color_territories(graph: &UnGraph<usize, usize>, palette_size: usize) -> Vec<usize> {
    let count = graph.node_count();
    let palette = palette_size.max(1);
    let mut colors: Vec<Option<usize>> = vec![None; count];

    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| {
        let da = graph.neighbors(NodeIndex::new(a)).count();
        let db = graph.neighbors(NodeIndex::new(b)).count();
        db.cmp(&da).then(a.cmp(&b))
    });

    for node in order {
        let used: Vec<usize> = graph
            .neighbors(NodeIndex::new(node))
            .filter_map(|n| colors[n.index()])
            .collect();

        let free = |c: usize| !used.contains(&c);
        let calm = |c: usize| {
            !used
                .iter()
                .any(|&u| u.abs_diff(c) == 1 || (palette > 2 && u.abs_diff(c) == palette - 1))
        };

        let chosen = (0..palette)
            .find(|&c| free(c) && calm(c))
            .or_else(|| (0..palette).find(|&c| free(c)))
            .unwrap_or_else(|| {
                (0..palette)
                    .min_by_key(|&c| (used.iter().filter(|&&u| u == c).count(), c))
                    .unwrap_or(0)
            });
        colors[node] = Some(chosen);
    }

    colors.into_iter().map(|c| c.unwrap_or(0)).collect()
}
