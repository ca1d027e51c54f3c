//! Token co-occurrence network.
//!
//! Tokens that appear together in a document are linked; each link is
//! scored with an association measure and only the top percentile is kept.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::community;
use crate::error::{Error, Result};

const EPS: f64 = 1e-12;

/// Edge association measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeScore {
    /// Log ratio of joint to independent probability.
    #[default]
    Llr,
    Npmi,
    Jaccard,
    Cosine,
    ChiSquare,
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    pub method: EdgeScore,
    pub min_edge_weight: usize,
    pub min_n11: usize,
    /// Percentage of scored candidates to keep (0..=100).
    pub top_edge_pct: f64,
    /// Drop nodes of degree ≤ 1 from the node table.
    pub hide_isolates: bool,
    pub max_documents: usize,
    pub max_tokens: usize,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            method: EdgeScore::Llr,
            min_edge_weight: 2,
            min_n11: 2,
            top_edge_pct: 10.0,
            hide_isolates: false,
            max_documents: 50_000,
            max_tokens: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRow {
    pub id: String,
    pub degree: usize,
    pub community: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
    pub weight: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkGraph {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<EdgeRow>,
}

impl NetworkGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Scores one pair from its joint count `n11`, the two document
/// frequencies and the number of documents `n`.
pub fn edge_score(method: EdgeScore, n11: usize, n1_: usize, n_1: usize, n: usize) -> f64 {
    let (a, r, c, total) = (n11 as f64, n1_ as f64, n_1 as f64, n as f64);
    if total == 0.0 {
        return 0.0;
    }
    match method {
        EdgeScore::Llr => {
            let joint = a / total;
            let indep = (r / total) * (c / total);
            ((joint + EPS) / (indep + EPS)).ln()
        }
        EdgeScore::Npmi => {
            let (pxy, px, py) = (a / total, r / total, c / total);
            if pxy == 0.0 || px == 0.0 || py == 0.0 {
                return -1.0;
            }
            let denom = -pxy.ln();
            if denom == 0.0 {
                return 1.0;
            }
            (pxy / (px * py)).ln() / denom
        }
        EdgeScore::Jaccard => {
            let union = r + c - a;
            if union > 0.0 { a / union } else { 0.0 }
        }
        EdgeScore::Cosine => {
            let norm = (r * c).sqrt();
            if norm > 0.0 { a / norm } else { 0.0 }
        }
        EdgeScore::ChiSquare => {
            let b = r - a;
            let cc = c - a;
            let d = total - r - c + a;
            let denom = (a + b) * (cc + d) * (a + cc) * (b + d);
            if denom > 0.0 {
                total * (a * d - b * cc).powi(2) / denom
            } else {
                0.0
            }
        }
        EdgeScore::Count => a,
    }
}

/// Number of candidates kept for a percentage: none at 0, all at 100,
/// otherwise rounded up and at least one.
pub fn keep_count(candidates: usize, pct: f64) -> usize {
    if candidates == 0 || pct <= 0.0 || pct.is_nan() {
        0
    } else if pct >= 100.0 {
        candidates
    } else {
        ((candidates as f64 * pct / 100.0).ceil() as usize).clamp(1, candidates)
    }
}

fn intern<'a>(name: &'a str, index: &mut HashMap<&'a str, usize>, names: &mut Vec<&'a str>) -> usize {
    if let Some(&i) = index.get(name) {
        return i;
    }
    index.insert(name, names.len());
    names.push(name);
    names.len() - 1
}

/// Builds the co-occurrence network from per-document token lists.
/// Duplicate tokens within a document count once.
pub fn build_network<T: AsRef<[String]>>(token_sets: &[T], options: &NetworkOptions) -> Result<NetworkGraph> {
    let sets: Vec<BTreeSet<&str>> = token_sets
        .iter()
        .map(|t| t.as_ref().iter().map(String::as_str).collect())
        .collect();
    let n = sets.len();

    let mut df: HashMap<&str, usize> = HashMap::new();
    for set in &sets {
        for tok in set {
            *df.entry(*tok).or_insert(0) += 1;
        }
    }
    if n > options.max_documents || df.len() > options.max_tokens {
        return Err(Error::NetworkTooLarge {
            documents: n,
            tokens: df.len(),
        });
    }

    let mut pairs: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for set in &sets {
        let toks: Vec<&str> = set.iter().copied().collect();
        for (i, a) in toks.iter().enumerate() {
            for b in &toks[i + 1..] {
                *pairs.entry((*a, *b)).or_insert(0) += 1;
            }
        }
    }

    let min_count = options.min_edge_weight.max(options.min_n11);
    let mut candidates: Vec<EdgeRow> = pairs
        .into_iter()
        .filter(|&(_, n11)| n11 >= min_count)
        .map(|((a, b), n11)| EdgeRow {
            source: a.to_string(),
            target: b.to_string(),
            weight: n11,
            score: edge_score(options.method, n11, df[a], df[b], n),
        })
        .collect();
    candidates.sort_by(|x, y| y.score.total_cmp(&x.score));
    let keep = keep_count(candidates.len(), options.top_edge_pct);
    debug!(
        "network: {} candidate edges (n11 >= {min_count}), keeping {keep} ({}%, {:?})",
        candidates.len(),
        options.top_edge_pct,
        options.method
    );
    candidates.truncate(keep);
    let edges = candidates;

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut names: Vec<&str> = Vec::new();
    let mut links = Vec::with_capacity(edges.len());
    for e in &edges {
        let s = intern(&e.source, &mut index, &mut names);
        let t = intern(&e.target, &mut index, &mut names);
        links.push((s, t, e.weight as f64));
    }
    let mut degree = vec![0usize; names.len()];
    for &(s, t, _) in &links {
        degree[s] += 1;
        degree[t] += 1;
    }
    let membership = community::louvain(names.len(), &links);

    let nodes: Vec<NodeRow> = names
        .iter()
        .zip(&degree)
        .zip(&membership)
        .filter(|((_, deg), _)| !options.hide_isolates || **deg > 1)
        .map(|((name, deg), comm)| NodeRow {
            id: name.to_string(),
            degree: *deg,
            community: *comm,
        })
        .collect();

    info!(
        "network: {} nodes, {} edges, {} communities",
        nodes.len(),
        edges.len(),
        membership.iter().max().map_or(0, |m| m + 1)
    );
    Ok(NetworkGraph { nodes, edges })
}
