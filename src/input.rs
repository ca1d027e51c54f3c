//! Tabular input: CSV/TSV/XLSX loading and column mapping.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::xlsx;

/// One input row after column mapping. `key` is filled by
/// [`crate::preprocess::generate_keys`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub key: String,
    pub date: String,
    pub title: String,
    pub full_text: String,
    pub page_type: String,
    pub url: Option<String>,
}

/// Names of the source columns holding each field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub date: String,
    pub title: String,
    pub full_text: String,
    pub page_type: String,
    pub url: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            title: "Title".to_string(),
            full_text: "Full Text".to_string(),
            page_type: "Page Type".to_string(),
            url: None,
        }
    }
}

/// A loaded sheet: header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn is_table_file(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("csv" | "tsv" | "xlsx")
    )
}

/// Collects table files: the path itself, or every `.csv`, `.tsv` and
/// `.xlsx` file below a directory in file name order.
pub fn collect_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_table_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Loads one CSV, TSV or XLSX file.
pub fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        ));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let mut rows = match ext.as_str() {
        "xlsx" => xlsx::read_first_sheet(path).map_err(|e| Error::parse(path, e))?,
        "tsv" => read_delimited(path, b'\t')?,
        _ => read_delimited(path, b',')?,
    };
    if rows.is_empty() {
        return Ok(Table::default());
    }
    let mut headers = rows.remove(0);
    if let Some(first) = headers.first_mut() {
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    debug!("loaded {}: {} rows", path.display(), rows.len());
    Ok(Table { headers, rows })
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::parse(path, e.to_string()))?;
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| Error::parse(path, e.to_string()))?;
        rows.push(rec.iter().map(String::from).collect());
    }
    Ok(rows)
}

/// Maps table columns onto records. Every missing required column is
/// reported at once.
pub fn records_from_table(table: &Table, mapping: &ColumnMapping) -> Result<Vec<Record>> {
    let find = |name: &str| table.headers.iter().position(|h| h.trim() == name.trim());
    let required = [
        &mapping.date,
        &mapping.title,
        &mapping.full_text,
        &mapping.page_type,
    ];
    let missing: Vec<String> = required
        .iter()
        .filter(|name| find(name.as_str()).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }
    let idx = |name: &str| find(name).unwrap_or(usize::MAX);
    let (d, t, f, p) = (
        idx(&mapping.date),
        idx(&mapping.title),
        idx(&mapping.full_text),
        idx(&mapping.page_type),
    );
    let u = mapping.url.as_deref().and_then(find);
    let cell = |row: &[String], i: usize| row.get(i).cloned().unwrap_or_default();

    Ok(table
        .rows
        .iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .map(|row| Record {
            key: String::new(),
            date: cell(row, d),
            title: cell(row, t),
            full_text: cell(row, f),
            page_type: cell(row, p),
            url: u.map(|i| cell(row, i)),
        })
        .collect())
}

/// Loads and maps every table file under `path` into one record list.
pub fn load_records(path: &Path, mapping: &ColumnMapping) -> Result<Vec<Record>> {
    let files = collect_files(path);
    if files.is_empty() {
        return Err(Error::NoInputFiles(path.to_path_buf()));
    }
    let mut records = Vec::new();
    for file in &files {
        let table = load_table(file)?;
        records.extend(records_from_table(&table, mapping)?);
    }
    info!("input: {} rows from {} file(s)", records.len(), files.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn reports_all_missing_columns() {
        let t = table(&["Date", "Body"], &[]);
        match records_from_table(&t, &ColumnMapping::default()) {
            Err(Error::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["Title", "Full Text", "Page Type"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn maps_columns_and_skips_blank_rows() {
        let t = table(
            &["Page Type", "Date", "Title", "Full Text", "URL"],
            &[
                &["blog", "2024-01-02", "제목", "본문", "http://a"],
                &["", "", "", "", ""],
                &["cafe", "2024-01-03", "제목2"],
            ],
        );
        let mapping = ColumnMapping {
            url: Some("URL".into()),
            ..ColumnMapping::default()
        };
        let recs = records_from_table(&t, &mapping).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].page_type, "blog");
        assert_eq!(recs[0].url.as_deref(), Some("http://a"));
        assert_eq!(recs[1].full_text, "");
    }
}
