//! Importance scores via PageRank power iteration

use std::collections::{HashMap, HashSet};

/// Damping factor
pub const DAMPING: f64 = 0.85;

/// Convergence threshold on the L1 norm of successive score vectors
pub const EPSILON: f64 = 1e-6;

/// Iteration cap
pub const MAX_ITERATIONS: usize = 50;

/// Compute importance scores for every node.
///
/// `nodes` is the full corpus; `adjacency` maps a path to its outgoing
/// references. Dangling nodes (edges in, none out) redistribute their score
/// uniformly each iteration. Isolated nodes (no edges at all) sit at the
/// base score `(1-d)/N`.
pub fn pagerank(
    nodes: &[String],
    adjacency: &HashMap<String, Vec<String>>,
) -> HashMap<String, f64> {
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, path)| (path.as_str(), i))
        .collect();

    // Out-edges by node index, restricted to known nodes
    let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut connected: HashSet<usize> = HashSet::new();
    for (source, targets) in adjacency {
        let Some(&u) = index.get(source.as_str()) else {
            continue;
        };
        for target in targets {
            let Some(&v) = index.get(target.as_str()) else {
                continue;
            };
            if u == v {
                continue;
            }
            out_edges[u].push(v);
            connected.insert(u);
            connected.insert(v);
        }
    }

    let n_f = n as f64;
    let base = (1.0 - DAMPING) / n_f;
    let mut scores = vec![1.0 / n_f; n];

    for iteration in 0..MAX_ITERATIONS {
        let mut next = vec![base; n];

        // Dangling nodes hand their score to everyone
        let dangling: f64 = connected
            .iter()
            .filter(|&&i| out_edges[i].is_empty())
            .map(|&i| scores[i])
            .sum();
        let dangling_share = DAMPING * dangling / n_f;
        for value in next.iter_mut() {
            *value += dangling_share;
        }

        for u in 0..n {
            let degree = out_edges[u].len();
            if degree == 0 {
                continue;
            }
            let contribution = DAMPING * scores[u] / degree as f64;
            for &v in &out_edges[u] {
                next[v] += contribution;
            }
        }

        // Isolated nodes neither emit nor collect; they stay at base
        for i in 0..n {
            if !connected.contains(&i) {
                next[i] = base;
            }
        }

        let delta: f64 = scores
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        scores = next;

        if delta < EPSILON {
            tracing::debug!(iteration, "importance scores converged");
            break;
        }
    }

    nodes
        .iter()
        .zip(scores)
        .map(|(path, score)| (path.clone(), score))
        .collect()
}
