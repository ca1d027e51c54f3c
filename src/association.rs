//! Apriori association rules over per-document token sets.

use std::collections::{BTreeSet, HashMap};

use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationOptions {
    pub min_support: f64,
    pub min_confidence: f64,
    pub min_lift: f64,
    /// Largest itemset size considered.
    pub max_len: usize,
}

impl Default for AssociationOptions {
    fn default() -> Self {
        Self {
            min_support: 0.05,
            min_confidence: 0.3,
            min_lift: 1.0,
            max_len: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    pub antecedent: Vec<String>,
    pub consequent: Vec<String>,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Export form of a rule; itemsets are joined with `, `.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleRow {
    pub antecedent: String,
    pub consequent: String,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

impl From<&AssociationRule> for RuleRow {
    fn from(rule: &AssociationRule) -> Self {
        Self {
            antecedent: rule.antecedent.join(", "),
            consequent: rule.consequent.join(", "),
            support: rule.support,
            confidence: rule.confidence,
            lift: rule.lift,
        }
    }
}

type Itemset<'a> = Vec<&'a str>;

fn support_of(transactions: &[BTreeSet<&str>], items: &[&str]) -> usize {
    transactions
        .iter()
        .filter(|t| items.iter().all(|i| t.contains(i)))
        .count()
}

/// Joins itemsets sharing all but their last item, dropping candidates with
/// an infrequent subset.
fn next_candidates<'a>(frequent: &[Itemset<'a>]) -> Vec<Itemset<'a>> {
    let known: BTreeSet<&Itemset<'a>> = frequent.iter().collect();
    let mut out = Vec::new();
    for (i, a) in frequent.iter().enumerate() {
        for b in &frequent[i + 1..] {
            let k = a.len();
            if a[..k - 1] != b[..k - 1] {
                continue;
            }
            let mut cand = a.clone();
            cand.push(b[k - 1]);
            cand.sort_unstable();
            let all_subsets_frequent = (0..cand.len()).all(|skip| {
                let sub: Itemset<'a> = cand
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != skip)
                    .map(|(_, s)| *s)
                    .collect();
                known.contains(&sub)
            });
            if all_subsets_frequent {
                out.push(cand);
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Longest itemset the rule splitter can enumerate.
pub const MAX_ITEMSET_LEN: usize = 16;

/// Every non-empty proper subset of `items` as (antecedent, consequent).
fn splits<'a>(items: &[&'a str]) -> Vec<(Itemset<'a>, Itemset<'a>)> {
    let n = items.len();
    (1..(1u32 << n) - 1)
        .map(|mask| {
            let (mut left, mut right) = (Vec::new(), Vec::new());
            for (i, item) in items.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    left.push(*item);
                } else {
                    right.push(*item);
                }
            }
            (left, right)
        })
        .collect()
}

/// Mines rules `antecedent → consequent` whose support, confidence and lift
/// reach the thresholds. Sorted by lift, then confidence, descending.
pub fn apriori_rules<T: AsRef<[String]>>(token_sets: &[T], options: &AssociationOptions) -> Vec<AssociationRule> {
    let transactions: Vec<BTreeSet<&str>> = token_sets
        .iter()
        .map(|t| t.as_ref().iter().map(String::as_str).collect())
        .collect();
    let n = transactions.len();
    if n == 0 || options.max_len < 2 {
        return Vec::new();
    }
    let min_count = (options.min_support * n as f64).ceil().max(1.0) as usize;

    let mut support: HashMap<Itemset<'_>, usize> = HashMap::new();
    let singles: BTreeSet<&str> = transactions.iter().flatten().copied().collect();
    let mut level: Vec<Itemset<'_>> = singles
        .into_iter()
        .map(|s| vec![s])
        .filter_map(|set| {
            let count = support_of(&transactions, &set);
            (count >= min_count).then(|| {
                support.insert(set.clone(), count);
                set
            })
        })
        .collect();

    let mut frequent: Vec<Itemset<'_>> = Vec::new();
    while !level.is_empty() && level[0].len() < options.max_len {
        let mut next = Vec::new();
        for cand in next_candidates(&level) {
            let count = support_of(&transactions, &cand);
            if count >= min_count {
                support.insert(cand.clone(), count);
                next.push(cand);
            }
        }
        frequent.extend(next.iter().cloned());
        level = next;
    }

    let total = n as f64;
    let mut rules = Vec::new();
    for items in &frequent {
        let joint = support[items] as f64 / total;
        for (left, right) in splits(items) {
            let (Some(&sl), Some(&sr)) = (support.get(&left), support.get(&right)) else {
                continue;
            };
            let confidence = joint / (sl as f64 / total);
            let lift = confidence / (sr as f64 / total);
            if confidence >= options.min_confidence && lift >= options.min_lift {
                rules.push(AssociationRule {
                    antecedent: left.iter().map(|s| s.to_string()).collect(),
                    consequent: right.iter().map(|s| s.to_string()).collect(),
                    support: joint,
                    confidence,
                    lift,
                });
            }
        }
    }
    rules.sort_by(|a, b| {
        b.lift
            .total_cmp(&a.lift)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
    info!("association: {} frequent itemsets, {} rules", frequent.len(), rules.len());
    rules
}
