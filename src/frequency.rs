//! Token frequency and per-month top-N tables.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::period::{Period, PeriodUnit};
use crate::tokenize::Document;

/// Counter that remembers the order in which keys were first seen, so that
/// equal counts keep a deterministic order after a stable sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCounter {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, token: &str, n: usize) {
        match self.index.get(token) {
            Some(&i) => self.entries[i].1 += n,
            None => {
                self.index.insert(token.to_string(), self.entries.len());
                self.entries.push((token.to_string(), n));
            }
        }
    }

    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for t in tokens {
            self.add(t.as_ref(), 1);
        }
    }

    pub fn get(&self, token: &str) -> usize {
        self.index.get(token).map_or(0, |&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// Sorts entries by count descending. The sort is stable: ties keep first-seen order.
    ///
    /// # Example
    /// ```
    /// use text_mining::frequency::TokenCounter;
    /// let mut counter = TokenCounter::new();
    /// counter.extend(["배송", "가격", "가격", "품질"]);
    /// let sorted = counter.most_common(None);
    /// assert_eq!(sorted, vec![("가격".to_string(), 2), ("배송".to_string(), 1), ("품질".to_string(), 1)]);
    /// ```
    pub fn most_common(&self, limit: Option<usize>) -> Vec<(String, usize)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(n) = limit {
            sorted.truncate(n);
        }
        sorted
    }
}

/// Global count and document frequency per token.
#[derive(Debug, Clone, Default)]
pub struct TokenStatistics {
    counts: TokenCounter,
    doc_freq: HashMap<String, usize>,
}

impl TokenStatistics {
    pub fn observe(&mut self, tokens: &[String]) {
        self.counts.extend(tokens);
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for t in unique {
            *self.doc_freq.entry(t.to_string()).or_insert(0) += 1;
        }
    }

    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token)
    }

    pub fn doc_frequency(&self, token: &str) -> usize {
        self.doc_freq.get(token).copied().unwrap_or(0)
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreqRow {
    pub token: String,
    pub count: usize,
    pub doc_freq: usize,
}

/// Tokens with `count >= min_freq`, count descending, ties in first-seen order.
pub fn freq_table(stats: &TokenStatistics, min_freq: usize) -> Vec<FreqRow> {
    stats
        .counts
        .most_common(None)
        .into_iter()
        .filter(|(_, count)| *count >= min_freq)
        .map(|(token, count)| FreqRow {
            doc_freq: stats.doc_frequency(&token),
            token,
            count,
        })
        .collect()
}

pub fn top_n(rows: &[FreqRow], n: usize) -> Vec<FreqRow> {
    rows.iter().take(n).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRow {
    pub month: Period,
    pub token: String,
    pub count: usize,
}

/// Top `per_month` tokens for every calendar month, months ascending.
/// Documents without a parseable date are grouped under `Period::Unknown`.
pub fn monthly_top(documents: &[Document], per_month: usize) -> Vec<MonthlyRow> {
    let mut months: BTreeMap<Period, TokenCounter> = BTreeMap::new();
    for doc in documents {
        let month = PeriodUnit::Month.bucket(doc.date.as_ref());
        months.entry(month).or_default().extend(&doc.tokens);
    }
    months
        .into_iter()
        .flat_map(|(month, counter)| {
            counter
                .most_common(Some(per_month))
                .into_iter()
                .map(move |(token, count)| MonthlyRow {
                    month: month.clone(),
                    token,
                    count,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn counts_and_doc_frequency() {
        let mut stats = TokenStatistics::default();
        stats.observe(&toks(&["가격", "가격", "품질"]));
        stats.observe(&toks(&["가격", "배송"]));
        assert_eq!(stats.count("가격"), 3);
        assert_eq!(stats.doc_frequency("가격"), 2);
        assert_eq!(stats.doc_frequency("배송"), 1);
        assert_eq!(stats.distinct(), 3);
    }

    #[test]
    fn freq_table_filters_and_keeps_first_seen_ties() {
        let mut stats = TokenStatistics::default();
        stats.observe(&toks(&["배송", "품질", "가격"]));
        stats.observe(&toks(&["품질", "배송", "가격", "가격"]));
        stats.observe(&toks(&["단골"]));
        let table = freq_table(&stats, 2);
        let order: Vec<&str> = table.iter().map(|r| r.token.as_str()).collect();
        assert_eq!(order, vec!["가격", "배송", "품질"]);
        assert!(table.iter().all(|r| r.count >= 2));
        // same input, same table
        assert_eq!(table, freq_table(&stats, 2));
    }
}
