use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::Transaction;
use crate::parse::{format_mdy, parse_effective_date};

/// UK tax year `year` runs 6 April `year` to 5 April `year + 1`.
pub fn uk_tax_year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year + 1, 4, 5)
}

/// Drop rows that took effect after `end`. Rows without a readable date are kept.
/// Returns the kept rows and how many were removed.
pub fn filter_by_tax_year(rows: Vec<Transaction>, end: NaiveDate) -> (Vec<Transaction>, usize) {
    let before = rows.len();
    let kept: Vec<Transaction> = rows
        .into_iter()
        .filter(|row| match parse_effective_date(&row.date) {
            Some(date) if date > end => {
                debug!("filtered {} {}", row.date, row.description);
                false
            }
            Some(_) => true,
            None => {
                if !row.date.trim().is_empty() {
                    warn!("could not parse date {:?}, keeping row", row.date);
                }
                true
            }
        })
        .collect();
    let removed = before - kept.len();
    if removed > 0 {
        debug!("filtered out {removed} row(s) after {}", format_mdy(end));
    }
    (kept, removed)
}
