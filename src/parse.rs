use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

const AS_OF: &str = " as of ";

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Parse a dollar field such as `-$1,234.56`. Empty or malformed input is `None`.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(['$', ','], "").parse().ok()
}

/// Parse a share quantity such as `1,234.5` or `-161`.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', "").parse().ok()
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

fn parse_mdy(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y").ok()
}

/// Date the broker posted the row: `08/18/2023 as of 08/15/2023` gives 08/18/2023.
pub fn parse_posted_date(raw: &str) -> Option<NaiveDate> {
    let posted = match raw.find(AS_OF) {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    parse_mdy(posted)
}

/// Date the transaction took effect: `06/02/2025 as of 05/30/2025` gives 05/30/2025.
pub fn parse_effective_date(raw: &str) -> Option<NaiveDate> {
    let lower = raw.trim().to_lowercase();
    let parts: Vec<&str> = lower.split(AS_OF).collect();
    if parts.len() == 2 {
        return parse_mdy(parts[1]);
    }
    parse_mdy(&lower)
}

/// Award exports mix `MM/DD/YYYY` and `YYYY/MM/DD`.
pub fn parse_award_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

pub fn format_mdy(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Earliest and latest parsable dates, or `N/A` for both when none parse.
pub fn date_range<'a, I, F>(dates: I, parse: F) -> (String, String)
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> Option<NaiveDate>,
{
    let parsed: Vec<NaiveDate> = dates.into_iter().filter_map(parse).collect();
    match (parsed.iter().min(), parsed.iter().max()) {
        (Some(lo), Some(hi)) => (format_mdy(*lo), format_mdy(*hi)),
        _ => ("N/A".to_string(), "N/A".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Account numbers
// ---------------------------------------------------------------------------

fn filename_account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"XXX(\d{3,4})").expect("valid regex"))
}

fn journal_account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{3}(\d{3,4})").expect("valid regex"))
}

/// `Individual_XXX157_Transactions.csv` gives `157`.
pub fn extract_account_number(filename: &str) -> Option<String> {
    filename_account_re()
        .captures(filename)
        .map(|c| c[1].to_string())
}

/// `JOURNAL TO ...964` gives `964`.
pub fn extract_journal_account(description: &str) -> Option<String> {
    journal_account_re()
        .captures(description)
        .map(|c| c[1].to_string())
}
