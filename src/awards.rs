use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, ToolError};
use crate::importer::{open_reader, read_header, require_file};
use crate::parse::parse_award_date;

pub const AWARD_COLUMNS: usize = 15;
pub const REQUIRED_AWARD_HEADERS: [&str; 3] = ["Date", "Symbol", "FairMarketValuePrice"];

const UPPER_COLUMNS: std::ops::RangeInclusive<usize> = 0..=4;
const LOWER_COLUMNS: std::ops::RangeInclusive<usize> = 8..=14;

/// One award with both halves merged into 15 fields.
///
/// On disk the upper row fills columns 0-4 and the lower row fills 8-14;
/// columns 5-7 stay empty in both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AwardRecord(pub Vec<String>);

impl AwardRecord {
    pub fn field(&self, idx: usize) -> &str {
        self.0.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Check column count, required headers and even pairing. Returns headers and data-line count.
pub fn validate_awards_csv(path: &Path) -> Result<(Vec<String>, usize)> {
    require_file(path)?;
    let mut rdr = open_reader(path)?;
    let headers = read_header(&mut rdr, path)?;
    if headers.len() != AWARD_COLUMNS {
        return Err(ToolError::ColumnCount {
            path: path.to_path_buf(),
            expected: AWARD_COLUMNS.to_string(),
            got: headers.len(),
        });
    }
    let missing: Vec<String> = REQUIRED_AWARD_HEADERS
        .iter()
        .filter(|h| !headers.iter().any(|x| x == *h))
        .map(|h| h.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }
    let mut lines = 0usize;
    for record in rdr.records() {
        record?;
        lines += 1;
    }
    if lines % 2 != 0 {
        return Err(ToolError::OddAwardLines {
            path: path.to_path_buf(),
            lines,
        });
    }
    Ok((headers, lines))
}

/// Merge the two halves of one award. A column filled in both is an error.
pub fn merge_pair(upper: &[String], lower: &[String]) -> Result<AwardRecord> {
    for half in [upper, lower] {
        if half.len() != AWARD_COLUMNS {
            return Err(ToolError::AwardRowLength(half.len()));
        }
    }
    let mut merged = Vec::with_capacity(AWARD_COLUMNS);
    for (column, (u, l)) in upper.iter().zip(lower).enumerate() {
        if !u.is_empty() && !l.is_empty() {
            return Err(ToolError::AwardColumnConflict {
                column,
                upper: u.clone(),
                lower: l.clone(),
            });
        }
        merged.push(format!("{u}{l}"));
    }
    Ok(AwardRecord(merged))
}

/// Split a record back into its upper and lower physical rows by column position.
pub fn split_record(record: &AwardRecord) -> Result<(Vec<String>, Vec<String>)> {
    if record.0.len() != AWARD_COLUMNS {
        return Err(ToolError::AwardRowLength(record.0.len()));
    }
    let mut upper = vec![String::new(); AWARD_COLUMNS];
    let mut lower = vec![String::new(); AWARD_COLUMNS];
    for (idx, value) in record.0.iter().enumerate() {
        if UPPER_COLUMNS.contains(&idx) {
            upper[idx] = value.clone();
        } else if LOWER_COLUMNS.contains(&idx) {
            lower[idx] = value.clone();
        }
    }
    Ok((upper, lower))
}

/// Read award pairs, remapping columns to `reference` header order.
pub fn read_awards(path: &Path, reference: &[String]) -> Result<Vec<AwardRecord>> {
    let mut rdr = open_reader(path)?;
    let headers = read_header(&mut rdr, path)?;
    let indices: Vec<usize> = reference
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ToolError::MissingColumns {
                    path: path.to_path_buf(),
                    missing: vec![name.clone()],
                })
        })
        .collect::<Result<_>>()?;

    let mut lines: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.len() != AWARD_COLUMNS {
            return Err(ToolError::AwardRowLength(record.len()));
        }
        lines.push(indices.iter().map(|&i| record[i].to_string()).collect());
    }

    lines
        .chunks_exact(2)
        .map(|pair| merge_pair(&pair[0], &pair[1]))
        .collect()
}

/// Drop exact repeats, keeping the first occurrence.
pub fn remove_duplicates(records: Vec<AwardRecord>) -> Vec<AwardRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Oldest first; unparsable dates go last. Stable.
pub fn sort_by_date(records: &mut [AwardRecord], date_idx: usize) {
    records.sort_by_key(|r| parse_award_date(r.field(date_idx)).unwrap_or(chrono::NaiveDate::MAX));
}

pub fn write_awards(path: &Path, headers: &[String], records: &[AwardRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    wtr.write_record(headers)?;
    for record in records {
        let (upper, lower) = split_record(record)?;
        wtr.write_record(&upper)?;
        wtr.write_record(&lower)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        [
            "Date", "Action", "Symbol", "Description", "Quantity", "FeesAndCommissions",
            "DisbursementElection", "Amount", "AwardDate", "AwardId", "FairMarketValuePrice",
            "SalePrice", "SharesSoldWithheldForTaxes", "NetSharesDeposited", "Taxes",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn upper(date: &str, symbol: &str) -> Vec<String> {
        let mut row = vec![String::new(); 15];
        row[0] = date.into();
        row[1] = "Lapse".into();
        row[2] = symbol.into();
        row[3] = "Restricted Stock Lapse".into();
        row[4] = "10".into();
        row
    }

    fn lower(award_id: &str) -> Vec<String> {
        let mut row = vec![String::new(); 15];
        row[8] = "01/01/2022".into();
        row[9] = award_id.into();
        row[10] = "$300.00".into();
        row[14] = "$1,000.00".into();
        row
    }

    fn write_file(dir: &Path, name: &str, rows: &[Vec<String>]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut wtr = csv::Writer::from_path(&path).unwrap();
        wtr.write_record(headers()).unwrap();
        for row in rows {
            wtr.write_record(row).unwrap();
        }
        wtr.flush().unwrap();
        path
    }

    #[test]
    fn test_valid_awards_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.csv", &[upper("08/15/2023", "META"), lower("123")]);
        let (h, lines) = validate_awards_csv(&path).unwrap();
        assert_eq!(h.len(), 15);
        assert_eq!(lines, 2);
    }

    #[test]
    fn test_invalid_column_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "Date,Symbol,FairMarketValuePrice\n").unwrap();
        assert!(matches!(
            validate_awards_csv(&path),
            Err(ToolError::ColumnCount { got: 3, .. })
        ));
    }

    #[test]
    fn test_odd_line_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "a.csv",
            &[upper("08/15/2023", "META"), lower("123"), upper("08/16/2023", "META")],
        );
        assert!(matches!(
            validate_awards_csv(&path),
            Err(ToolError::OddAwardLines { lines: 3, .. })
        ));
    }

    #[test]
    fn test_missing_required_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let mut h = headers();
        h[10] = "Price".into();
        std::fs::write(&path, format!("{}\n", h.join(","))).unwrap();
        match validate_awards_csv(&path) {
            Err(ToolError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["FairMarketValuePrice".to_string()])
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_merge_row_pair() {
        let merged = merge_pair(&upper("08/15/2023", "META"), &lower("123")).unwrap();
        assert_eq!(merged.field(0), "08/15/2023");
        assert_eq!(merged.field(2), "META");
        assert_eq!(merged.field(9), "123");
        assert_eq!(merged.field(6), "");
    }

    #[test]
    fn test_merge_row_pair_conflict() {
        let mut bad_lower = lower("123");
        bad_lower[2] = "AAPL".into();
        assert!(matches!(
            merge_pair(&upper("08/15/2023", "META"), &bad_lower),
            Err(ToolError::AwardColumnConflict { column: 2, .. })
        ));
    }

    #[test]
    fn test_split_merged_row() {
        let up = upper("08/15/2023", "META");
        let low = lower("123");
        let merged = merge_pair(&up, &low).unwrap();
        let (u, l) = split_record(&merged).unwrap();
        assert_eq!(u, up);
        assert_eq!(l, low);
    }

    #[test]
    fn test_remove_duplicate_awards() {
        let a = merge_pair(&upper("08/15/2023", "META"), &lower("1")).unwrap();
        let b = merge_pair(&upper("08/15/2023", "META"), &lower("2")).unwrap();
        let out = remove_duplicates(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(out, vec![a, b]);
    }

    #[test]
    fn test_sort_awards_by_date() {
        let a = merge_pair(&upper("2023/09/01", "META"), &lower("1")).unwrap();
        let b = merge_pair(&upper("08/15/2023", "META"), &lower("2")).unwrap();
        let c = merge_pair(&upper("bad date", "META"), &lower("3")).unwrap();
        let mut records = vec![c.clone(), a.clone(), b.clone()];
        sort_by_date(&mut records, 0);
        assert_eq!(records, vec![b, a, c]);
    }

    #[test]
    fn test_read_remaps_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.csv", &[upper("08/15/2023", "META"), lower("123")]);
        let mut reference = headers();
        reference.swap(0, 2);
        let records = read_awards(&path, &reference).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field(0), "META");
        assert_eq!(records[0].field(2), "08/15/2023");
    }

    #[test]
    fn test_read_and_write_awards() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            upper("09/01/2023", "META"),
            lower("2"),
            upper("08/15/2023", "META"),
            lower("1"),
        ];
        let path = write_file(dir.path(), "a.csv", &rows);
        let mut records = read_awards(&path, &headers()).unwrap();
        sort_by_date(&mut records, 0);
        let out = dir.path().join("out.csv");
        write_awards(&out, &headers(), &records).unwrap();

        let reread = read_awards(&out, &headers()).unwrap();
        assert_eq!(reread, records);
        assert_eq!(reread[0].field(9), "1");
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_same_file_twice_equals_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "a.csv",
            &[upper("09/01/2023", "META"), lower("2"), upper("08/15/2023", "META"), lower("1")],
        );
        let once = {
            let mut r = remove_duplicates(read_awards(&path, &headers()).unwrap());
            sort_by_date(&mut r, 0);
            r
        };
        let twice = {
            let mut all = read_awards(&path, &headers()).unwrap();
            all.extend(read_awards(&path, &headers()).unwrap());
            let mut r = remove_duplicates(all);
            sort_by_date(&mut r, 0);
            r
        };
        assert_eq!(once, twice);
    }
}
