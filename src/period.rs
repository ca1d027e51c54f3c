//! Date parsing and calendar buckets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Calendar granularity used to bucket documents over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Year,
    Half,
    Quarter,
    #[default]
    Month,
    Week,
    Day,
    Hour,
}

/// A period bucket. `Unknown` holds every document whose date did not parse
/// and always sorts after the real buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Known(String),
    Unknown,
}

impl Period {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Period::Unknown)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Known(label) => f.write_str(label),
            Period::Unknown => f.write_str("unknown"),
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Parses the date formats commonly found in exported social listening
/// data. Returns `None` instead of failing.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    // fractional seconds, e.g. "2024-03-01 10:00:00.123"
    if let Some((head, _)) = s.split_once('.') {
        if let Ok(dt) = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
    }
    if let Some(dt) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Some(dt);
    }
    excel_serial(s)
}

/// Spreadsheet serial dates ("45123.5" = days since 1899-12-30). Serials
/// before 1954 are rejected so bare years and small counts stay unparsed.
fn excel_serial(s: &str) -> Option<NaiveDateTime> {
    let v: f64 = s.parse().ok()?;
    if !(20_000.0..100_000.0).contains(&v) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let secs = (v * 86_400.0).round() as i64;
    base.checked_add_signed(chrono::Duration::seconds(secs))
}

impl PeriodUnit {
    pub fn label(self, dt: &NaiveDateTime) -> String {
        match self {
            PeriodUnit::Year => dt.format("%Y").to_string(),
            PeriodUnit::Half => format!("{}-H{}", dt.year(), (dt.month() - 1) / 6 + 1),
            PeriodUnit::Quarter => format!("{}-Q{}", dt.year(), (dt.month() - 1) / 3 + 1),
            PeriodUnit::Month => dt.format("%Y-%m").to_string(),
            PeriodUnit::Week => dt.format("%G-W%V").to_string(),
            PeriodUnit::Day => dt.format("%Y-%m-%d").to_string(),
            PeriodUnit::Hour => format!("{} {:02}:00", dt.format("%Y-%m-%d"), dt.hour()),
        }
    }

    pub fn bucket(self, dt: Option<&NaiveDateTime>) -> Period {
        match dt {
            Some(dt) => Period::Known(self.label(dt)),
            None => Period::Unknown,
        }
    }
}

/// Fails when not a single date in the column parses; a run without any
/// time axis would only produce an "unknown" bucket.
pub fn require_some_dates<'a, I>(dates: I) -> Result<()>
where
    I: IntoIterator<Item = Option<&'a NaiveDateTime>>,
{
    if dates.into_iter().any(|d| d.is_some()) {
        Ok(())
    } else {
        Err(Error::NoValidDates)
    }
}

/// Document count per period, optionally split per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotRow {
    pub period: Period,
    pub category: Option<String>,
    pub count: usize,
}

pub fn buzz_pivot<'a, I>(items: I, by_category: bool) -> Vec<PivotRow>
where
    I: IntoIterator<Item = (&'a Period, &'a str)>,
{
    let mut counts: BTreeMap<(Period, Option<String>), usize> = BTreeMap::new();
    for (period, category) in items {
        let cat = by_category.then(|| category.to_string());
        *counts.entry((period.clone(), cat)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((period, category), count)| PivotRow {
            period,
            category,
            count,
        })
        .collect()
}
