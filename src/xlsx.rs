use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Reads the first worksheet of an `.xlsx` workbook into rows of cell strings.
/// Numbers are returned as written in the sheet (dates stay serial numbers).
pub fn read_first_sheet(p: &Path) -> Result<Vec<Vec<String>>, String> {
    let file = File::open(p).map_err(|e| format!("Open .xlsx failed: {e}"))?;
    let mut zip = ZipArchive::new(file).map_err(|e| format!("Open .xlsx zip failed: {e}"))?;

    let shared = match read_entry(&mut zip, "xl/sharedStrings.xml") {
        Some(xml) => parse_shared_strings(&xml?)?,
        None => Vec::new(),
    };

    let sheet_name = first_sheet_name(&zip).ok_or_else(|| "Missing xl/worksheets/*.xml".to_string())?;
    let xml = read_entry(&mut zip, &sheet_name)
        .ok_or_else(|| format!("Missing {sheet_name}"))??;
    parse_sheet_xml(&xml, &shared)
}

// ---- Internal helpers ----

fn read_entry(zip: &mut ZipArchive<File>, name: &str) -> Option<Result<String, String>> {
    let mut entry = zip.by_name(name).ok()?;
    let mut xml = String::new();
    Some(
        entry
            .read_to_string(&mut xml)
            .map(|_| xml)
            .map_err(|e| format!("Read {name} failed: {e}")),
    )
}

fn first_sheet_name(zip: &ZipArchive<File>) -> Option<String> {
    if zip.index_for_name("xl/worksheets/sheet1.xml").is_some() {
        return Some("xl/worksheets/sheet1.xml".to_string());
    }
    let mut sheets: Vec<String> = zip
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml") && !n.contains("/_rels/"))
        .map(String::from)
        .collect();
    sheets.sort();
    sheets.into_iter().next()
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    // phonetic runs (<rPh>) repeat the reading, not the text
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"si" => current.clear(),
                b"t" => in_t = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == b"si" {
                    out.push(String::new());
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"si" => out.push(std::mem::take(&mut current)),
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_t => current.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::GeneralRef(r)) if in_t => {
                current.push_str(&resolve_entity(&String::from_utf8_lossy(&r)))
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse sharedStrings.xml failed: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[derive(Default)]
struct Cell {
    col: Option<usize>,
    kind: Option<String>,
    value: String,
}

fn parse_sheet_xml(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut cell: Option<Cell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"row" => rows.push(Vec::new()),
                b"c" => cell = Some(start_cell(&e)),
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match local_name(e.name().as_ref()) {
                b"row" => rows.push(Vec::new()),
                b"c" => {
                    let c = start_cell(&e);
                    place(&mut rows, c, shared)?;
                }
                _ => {}
            },
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(c) = cell.take() {
                        place(&mut rows, c, shared)?;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::GeneralRef(r)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.value
                        .push_str(&resolve_entity(&String::from_utf8_lossy(&r)));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse worksheet XML failed: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn start_cell(e: &BytesStart<'_>) -> Cell {
    let mut cell = Cell::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match local_name(attr.key.as_ref()) {
            b"r" => cell.col = column_index(&value),
            b"t" => cell.kind = Some(value),
            _ => {}
        }
    }
    cell
}

fn place(rows: &mut Vec<Vec<String>>, cell: Cell, shared: &[String]) -> Result<(), String> {
    if rows.is_empty() {
        rows.push(Vec::new());
    }
    let value = match cell.kind.as_deref() {
        Some("s") => {
            let idx: usize = cell
                .value
                .trim()
                .parse()
                .map_err(|_| format!("Bad shared string index {:?}", cell.value))?;
            shared
                .get(idx)
                .cloned()
                .ok_or_else(|| format!("Shared string {idx} out of range"))?
        }
        Some("b") => match cell.value.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        _ => cell.value,
    };
    let Some(row) = rows.last_mut() else {
        return Err("Cell outside of a row".to_string());
    };
    let col = cell.col.unwrap_or(row.len());
    if row.len() <= col {
        row.resize(col + 1, String::new());
    }
    row[col] = value;
    Ok(())
}

/// "AB12" -> 27
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: Vec<char> = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters.iter().fold(0usize, |acc, c| {
        acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1)
    });
    Some(n - 1)
}

fn resolve_entity(name: &str) -> String {
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                name.strip_prefix('#').and_then(|d| d.parse().ok())
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| format!("&{name};"))
        }
    }
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}
