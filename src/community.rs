//! Louvain community detection on a small weighted undirected graph.
//!
//! Nodes are visited in index order and ties keep the current community,
//! so the partition is reproducible for a given edge list.

use std::collections::BTreeMap;

const MAX_SWEEPS: usize = 100;
const MIN_GAIN: f64 = 1e-12;

struct Level {
    adj: Vec<Vec<(usize, f64)>>,
    /// Weighted degree; self loops count twice.
    k: Vec<f64>,
    m2: f64,
}

impl Level {
    fn new(n: usize, edges: &BTreeMap<(usize, usize), f64>) -> Self {
        let mut adj = vec![Vec::new(); n];
        let mut k = vec![0.0; n];
        for (&(a, b), &w) in edges {
            if a == b {
                k[a] += 2.0 * w;
            } else {
                adj[a].push((b, w));
                adj[b].push((a, w));
                k[a] += w;
                k[b] += w;
            }
        }
        let m2 = k.iter().sum();
        Self { adj, k, m2 }
    }

    /// Local moving phase. Returns the community of each node and whether
    /// anything moved.
    fn local_moves(&self) -> (Vec<usize>, bool) {
        let n = self.k.len();
        let mut comm: Vec<usize> = (0..n).collect();
        let mut tot = self.k.clone();
        let mut moved_any = false;

        for _ in 0..MAX_SWEEPS {
            let mut moved = false;
            for i in 0..n {
                let ki = self.k[i];
                let current = comm[i];
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(j, w) in &self.adj[i] {
                    *links.entry(comm[j]).or_insert(0.0) += w;
                }
                tot[current] -= ki;

                let gain = |c: usize, w_in: f64| w_in - tot[c] * ki / self.m2;
                let mut best = current;
                let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
                for (&c, &w_in) in &links {
                    let g = gain(c, w_in);
                    if g > best_gain + MIN_GAIN {
                        best = c;
                        best_gain = g;
                    }
                }

                tot[best] += ki;
                if best != current {
                    comm[i] = best;
                    moved = true;
                    moved_any = true;
                }
            }
            if !moved {
                break;
            }
        }
        (comm, moved_any)
    }
}

/// Renumbers labels 0.. in order of first appearance.
fn dense(labels: &[usize]) -> Vec<usize> {
    let mut ids: BTreeMap<usize, usize> = BTreeMap::new();
    let mut order = Vec::with_capacity(labels.len());
    for &l in labels {
        let next = ids.len();
        order.push(*ids.entry(l).or_insert(next));
    }
    order
}

/// Partitions `n` nodes connected by weighted `edges` (pairs of node
/// indices). Returns a community id per node, numbered densely in node order.
pub fn louvain(n: usize, edges: &[(usize, usize, f64)]) -> Vec<usize> {
    let mut membership: Vec<usize> = (0..n).collect();
    let mut graph: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for &(a, b, w) in edges {
        let key = if a <= b { (a, b) } else { (b, a) };
        *graph.entry(key).or_insert(0.0) += w;
    }
    let mut size = n;

    loop {
        let level = Level::new(size, &graph);
        if level.m2 <= 0.0 {
            break;
        }
        let (comm, moved) = level.local_moves();
        if !moved {
            break;
        }
        let comm = dense(&comm);
        for m in membership.iter_mut() {
            *m = comm[*m];
        }
        let mut next: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (&(a, b), &w) in &graph {
            let (ca, cb) = (comm[a], comm[b]);
            let key = if ca <= cb { (ca, cb) } else { (cb, ca) };
            *next.entry(key).or_insert(0.0) += w;
        }
        size = comm.iter().max().map_or(0, |m| m + 1);
        graph = next;
    }
    dense(&membership)
}

/// Newman modularity of a partition.
pub fn modularity(n: usize, edges: &[(usize, usize, f64)], membership: &[usize]) -> f64 {
    let mut k = vec![0.0; n];
    let mut m = 0.0;
    let mut inside = 0.0;
    for &(a, b, w) in edges {
        k[a] += w;
        k[b] += w;
        m += w;
        if membership[a] == membership[b] {
            inside += w;
        }
    }
    if m == 0.0 {
        return 0.0;
    }
    let mut tot: BTreeMap<usize, f64> = BTreeMap::new();
    for (i, &c) in membership.iter().enumerate() {
        *tot.entry(c).or_insert(0.0) += k[i];
    }
    inside / m - tot.values().map(|t| (t / (2.0 * m)).powi(2)).sum::<f64>()
}
