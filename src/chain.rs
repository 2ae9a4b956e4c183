//! Сборка ненаправленных рёбер в цепочки
//!
//! Береговые линии, границы королевств и берега озёр строятся одинаково:
//! набор отрезков с общими концами склеивается в замкнутые контуры или
//! открытые ломаные. Каждое ребро используется ровно один раз, поэтому
//! работа ограничена числом рёбер.

use std::collections::BTreeMap;

/// Режим сборки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Ожидаются замкнутые контуры: обход начинается с любого ребра
    Loops,
    /// Ожидаются открытые ломаные: сначала обходятся концы (вершины нечётной степени)
    Paths,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain<K> {
    /// Вершины по порядку; для замкнутой цепочки первая вершина не повторяется в конце
    pub vertices: Vec<K>,
    pub closed: bool,
}

/// Склеивает рёбра в цепочки. Порядок результата детерминирован порядком входа.
#[must_use]
pub fn chain_edges<K: Copy + Ord>(edges: &[(K, K)], mode: ChainMode) -> Vec<Chain<K>> {
    let mut incident: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (i, &(a, b)) in edges.iter().enumerate() {
        if a == b {
            continue;
        }
        incident.entry(a).or_default().push(i);
        incident.entry(b).or_default().push(i);
    }

    let mut used: Vec<bool> = edges.iter().map(|&(a, b)| a == b).collect();
    let mut chains = Vec::new();

    if mode == ChainMode::Paths {
        let ends: Vec<K> = incident
            .iter()
            .filter(|(_, list)| list.len() % 2 == 1)
            .map(|(&k, _)| k)
            .collect();
        for start in ends {
            while let Some(first) = next_unused(&incident, &used, start) {
                chains.push(walk(edges, &incident, &mut used, start, first));
            }
        }
    }

    for i in 0..edges.len() {
        if !used[i] {
            let start = edges[i].0;
            chains.push(walk(edges, &incident, &mut used, start, i));
        }
    }

    chains
}

fn next_unused<K: Copy + Ord>(
    incident: &BTreeMap<K, Vec<usize>>,
    used: &[bool],
    vertex: K,
) -> Option<usize> {
    incident
        .get(&vertex)
        .and_then(|list| list.iter().copied().find(|&e| !used[e]))
}

fn walk<K: Copy + Ord>(
    edges: &[(K, K)],
    incident: &BTreeMap<K, Vec<usize>>,
    used: &mut [bool],
    start: K,
    first: usize,
) -> Chain<K> {
    let mut vertices = vec![start];
    let mut current = start;
    let mut edge = first;

    // Каждая итерация помечает новое ребро, так что итераций не больше, чем рёбер.
    for _ in 0..edges.len() {
        used[edge] = true;
        let (a, b) = edges[edge];
        let next = if a == current { b } else { a };

        if next == start {
            return Chain {
                vertices,
                closed: true,
            };
        }
        vertices.push(next);
        current = next;

        match next_unused(incident, used, current) {
            Some(e) => edge = e,
            None => break,
        }
    }

    Chain {
        vertices,
        closed: false,
    }
}
