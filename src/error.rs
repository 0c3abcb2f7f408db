use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Empty CSV file: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("Invalid column count in {}: expected {expected}, got {got}", path.display())]
    ColumnCount {
        path: PathBuf,
        expected: String,
        got: usize,
    },

    #[error("Missing required columns in {}: {}", path.display(), missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error(
        "File {index} ({}) has different columns than file 1 (missing: [{}], extra: [{}])",
        path.display(),
        missing.join(", "),
        extra.join(", ")
    )]
    IncompatibleHeaders {
        index: usize,
        path: PathBuf,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("Odd number of data lines ({lines}), expected even (2-row pairs): {}", path.display())]
    OddAwardLines { path: PathBuf, lines: usize },

    #[error("Column {column} has values in both rows of an award pair: '{upper}', '{lower}'")]
    AwardColumnConflict {
        column: usize,
        upper: String,
        lower: String,
    },

    #[error("Invalid award row length: {0} (expected 15)")]
    AwardRowLength(usize),

    #[error("Invalid mapping file {}: {reason}", path.display())]
    InvalidMapping { path: PathBuf, reason: String },

    #[error("Invalid config file {}: {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("{0}")]
    UnmatchedTransfers(UnmatchedReport),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// One transfer row left without a counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedRow {
    pub date: String,
    /// Symbol for share journals, description for cash journals.
    pub label: String,
    /// Quantity for share journals, amount for cash journals.
    pub value: String,
    pub account: Option<String>,
}

/// Every unmatched transfer that blocked a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnmatchedReport {
    pub shares: Vec<UnmatchedRow>,
    pub journals: Vec<UnmatchedRow>,
    /// Merge accounts, when account verification was active.
    pub accounts: Option<Vec<String>>,
}

impl UnmatchedReport {
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty() && self.journals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shares.len() + self.journals.len()
    }
}

impl fmt::Display for UnmatchedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} unmatched transfer(s) found", self.len())?;
        if let Some(accounts) = &self.accounts {
            write!(f, " involving accounts [{}]", accounts.join(", "))?;
        }
        write!(f, " (use --keep-unmatched-transfers to keep them):")?;
        if !self.shares.is_empty() {
            write!(f, "\n  Journaled Shares:")?;
            for row in &self.shares {
                write!(f, "\n    {}, {}, qty {}", row.date, row.label, row.value)?;
            }
        }
        if !self.journals.is_empty() {
            write!(f, "\n  Journal transfers:")?;
            for row in &self.journals {
                write!(f, "\n    {}, {}, amt {}", row.date, row.label, row.value)?;
                if let Some(acct) = &row.account {
                    write!(f, ", account {acct}")?;
                }
            }
        }
        Ok(())
    }
}
