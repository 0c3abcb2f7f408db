use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Result, ToolError};
use crate::models::{Column, Transaction};
use crate::parse::parse_posted_date;

pub const MIN_COLUMNS: usize = 8;
pub const MAX_COLUMNS: usize = 9;

// ---------------------------------------------------------------------------
// Shared CSV plumbing
// ---------------------------------------------------------------------------

pub(crate) fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ToolError::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ToolError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

pub(crate) fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

/// First record of the file, or `EmptyFile`.
pub(crate) fn read_header(rdr: &mut csv::Reader<BufReader<File>>, path: &Path) -> Result<Vec<String>> {
    match rdr.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Err(ToolError::EmptyFile(path.to_path_buf())),
    }
}

/// 1-based file line the record started on.
fn record_line(record: &csv::StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?)
}

pub fn compute_checksum(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Pairs of inputs with byte-identical content, as (earlier, later).
pub fn duplicate_inputs(paths: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut first_seen: HashMap<String, &PathBuf> = HashMap::new();
    let mut dupes = Vec::new();
    for path in paths {
        let sum = compute_checksum(path)?;
        match first_seen.get(&sum) {
            Some(earlier) => dupes.push(((*earlier).clone(), path.clone())),
            None => {
                first_seen.insert(sum, path);
            }
        }
    }
    Ok(dupes)
}

// ---------------------------------------------------------------------------
// Transaction exports
// ---------------------------------------------------------------------------

/// Check that `path` is a transaction export and return its header row.
pub fn validate_transactions_csv(path: &Path) -> Result<Vec<String>> {
    require_file(path)?;
    let mut rdr = open_reader(path)?;
    let headers = read_header(&mut rdr, path)?;
    if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&headers.len()) {
        return Err(ToolError::ColumnCount {
            path: path.to_path_buf(),
            expected: format!("{MIN_COLUMNS}-{MAX_COLUMNS}"),
            got: headers.len(),
        });
    }
    let missing: Vec<String> = Column::ALL
        .iter()
        .map(Column::header)
        .filter(|name| !headers.iter().any(|h| h == name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }
    Ok(headers)
}

fn named(headers: &[String]) -> BTreeSet<&str> {
    headers
        .iter()
        .map(String::as_str)
        .filter(|h| !h.trim().is_empty())
        .collect()
}

/// Headers of file `index` (1-based) must name the same columns as the reference, in any order.
pub fn check_compatible(reference: &[String], index: usize, path: &Path, headers: &[String]) -> Result<()> {
    let want = named(reference);
    let have = named(headers);
    if want == have {
        return Ok(());
    }
    Err(ToolError::IncompatibleHeaders {
        index,
        path: path.to_path_buf(),
        missing: want.difference(&have).map(|s| s.to_string()).collect(),
        extra: have.difference(&want).map(|s| s.to_string()).collect(),
    })
}

/// Output column order: the reference header minus any unnamed trailing column.
pub fn layout(reference: &[String]) -> Vec<Column> {
    reference
        .iter()
        .filter_map(|h| Column::from_header(h))
        .collect()
}

/// Read every data row of a validated export. Columns are located by name.
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let mut rdr = open_reader(path)?;
    let headers = read_header(&mut rdr, path)?;
    let positions: Vec<(Column, usize)> = Column::ALL
        .iter()
        .map(|col| {
            headers
                .iter()
                .position(|h| h == col.header())
                .map(|idx| (*col, idx))
                .ok_or_else(|| ToolError::MissingColumns {
                    path: path.to_path_buf(),
                    missing: vec![col.header().to_string()],
                })
        })
        .collect::<Result<_>>()?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record_line(&record);
        let mut fields: Vec<&str> = record.iter().collect();
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        if fields.len() > headers.len() {
            warn!(
                "{}: line {line} has {} columns, expected {}, skipping",
                path.display(),
                fields.len(),
                headers.len()
            );
            continue;
        }
        fields.resize(headers.len(), "");
        if fields.len() == MAX_COLUMNS && !fields[MAX_COLUMNS - 1].is_empty() {
            warn!("{}: line {line} has a non-empty 9th column, skipping", path.display());
            continue;
        }
        let mut row = Transaction::default();
        for (col, pos) in &positions {
            row.set(*col, fields[*pos].to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_transactions(path: &Path, layout: &[Column], rows: &[Transaction]) -> Result<()> {
    let mut wtr = csv_writer(path)?;
    wtr.write_record(layout.iter().map(Column::header))?;
    for row in rows {
        wtr.write_record(row.fields(layout))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Drop exact repeats, keeping the first occurrence. Returns the removed count.
pub fn remove_duplicates(rows: Vec<Transaction>) -> (Vec<Transaction>, usize) {
    let before = rows.len();
    let mut seen = HashSet::new();
    let kept: Vec<Transaction> = rows.into_iter().filter(|r| seen.insert(r.clone())).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Oldest posted date first. Rows with unparsable dates keep their order at the end.
pub fn sort_by_date(rows: &mut [Transaction]) {
    for row in rows.iter().filter(|r| parse_posted_date(&r.date).is_none()) {
        warn!("invalid date {:?}, sorting to end", row.date);
    }
    rows.sort_by_key(|r| parse_posted_date(&r.date).unwrap_or(NaiveDate::MAX));
}

// ---------------------------------------------------------------------------
// Mapping file
// ---------------------------------------------------------------------------

/// Description to symbol overrides, keyed by lower-cased description.
#[derive(Debug, Default)]
pub struct MappingTable {
    pub mappings: HashMap<String, String>,
    /// (line, description) of entries that replaced an earlier one.
    pub duplicates: Vec<(usize, String)>,
}

pub fn load_mapping_file(path: &Path) -> Result<MappingTable> {
    let invalid = |reason: String| ToolError::InvalidMapping {
        path: path.to_path_buf(),
        reason,
    };
    require_file(path)?;
    let mut rdr = open_reader(path)?;
    let headers: Vec<String> = read_header(&mut rdr, path)?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let (Some(desc_idx), Some(symbol_idx)) = (
        headers.iter().position(|h| h == "description"),
        headers.iter().position(|h| h == "symbol"),
    ) else {
        return Err(invalid("must have 'Description' and 'Symbol' columns".to_string()));
    };

    let mut table = MappingTable::default();
    for record in rdr.records() {
        let record = record?;
        let line = record_line(&record);
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let (Some(description), Some(symbol)) = (record.get(desc_idx), record.get(symbol_idx)) else {
            return Err(invalid(format!(
                "line {line}: expected {} columns, got {}",
                headers.len(),
                record.len()
            )));
        };
        let description = description.trim();
        let symbol = symbol.trim();
        if description.is_empty() {
            continue;
        }
        if symbol.is_empty() {
            return Err(invalid(format!("empty symbol at line {line} for description: {description}")));
        }
        let key = description.to_lowercase();
        if table.mappings.insert(key, symbol.to_string()).is_some() {
            table.duplicates.push((line, description.to_string()));
        }
    }
    Ok(table)
}
