use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Result, ToolError, UnmatchedReport, UnmatchedRow};
use crate::models::Transaction;
use crate::parse::{extract_journal_account, parse_currency, parse_quantity};

pub const JOURNALED_SHARES: &str = "Journaled Shares";
pub const JOURNAL: &str = "Journal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Shares,
    Journal,
    Other,
}

fn kind_of(row: &Transaction) -> Kind {
    match row.action.trim() {
        JOURNALED_SHARES => Kind::Shares,
        JOURNAL => Kind::Journal,
        _ => Kind::Other,
    }
}

// ---------------------------------------------------------------------------
// Greedy pairing
// ---------------------------------------------------------------------------

/// Pair legs greedily in order. `None` legs never match. Returns matched flags.
fn greedy_pairs<T>(legs: &[Option<T>], offsets: impl Fn(&T, &T) -> bool) -> Vec<bool> {
    let mut matched = vec![false; legs.len()];
    for i in 0..legs.len() {
        if matched[i] {
            continue;
        }
        let Some(a) = &legs[i] else { continue };
        for j in (i + 1)..legs.len() {
            if matched[j] {
                continue;
            }
            let Some(b) = &legs[j] else { continue };
            if offsets(a, b) {
                matched[i] = true;
                matched[j] = true;
                break;
            }
        }
    }
    matched
}

// ---------------------------------------------------------------------------
// Journaled Shares
// ---------------------------------------------------------------------------

struct ShareLeg<'a> {
    symbol: &'a str,
    date: &'a str,
    price: &'a str,
    quantity: f64,
}

/// Matched flags for `Journaled Shares` rows: same symbol, date and price
/// (raw text), quantities summing to within `tolerance` of zero.
pub fn match_journaled_shares(rows: &[Transaction], tolerance: f64) -> Vec<bool> {
    let legs: Vec<Option<ShareLeg>> = rows
        .iter()
        .map(|r| {
            parse_quantity(&r.quantity).map(|quantity| ShareLeg {
                symbol: &r.symbol,
                date: &r.date,
                price: &r.price,
                quantity,
            })
        })
        .collect();
    greedy_pairs(&legs, |a, b| {
        let hit = a.symbol == b.symbol
            && a.date == b.date
            && a.price == b.price
            && (a.quantity + b.quantity).abs() < tolerance;
        if hit {
            debug!(
                "matched shares pair: {} on {}, qty {} and {}",
                a.symbol, a.date, a.quantity, b.quantity
            );
        }
        hit
    })
}

// ---------------------------------------------------------------------------
// Journal cash transfers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    To,
    From,
}

fn journal_direction(description: &str) -> Option<Direction> {
    let upper = description.to_uppercase();
    if upper.contains("JOURNAL TO") {
        Some(Direction::To)
    } else if upper.contains("JOURNAL FRM") {
        Some(Direction::From)
    } else {
        None
    }
}

struct JournalLeg<'a> {
    date: &'a str,
    direction: Direction,
    amount: f64,
    account: Option<String>,
}

/// Matched flags for `Journal` rows: same date, opposite TO/FRM direction,
/// amounts summing to within `tolerance` of zero. With `accounts` set, both
/// descriptions must name an account in that set.
pub fn match_journal_transfers(
    rows: &[Transaction],
    accounts: Option<&BTreeSet<String>>,
    tolerance: f64,
) -> Vec<bool> {
    let legs: Vec<Option<JournalLeg>> = rows
        .iter()
        .map(|r| {
            let direction = journal_direction(&r.description)?;
            let amount = parse_currency(&r.amount)?;
            Some(JournalLeg {
                date: &r.date,
                direction,
                amount,
                account: extract_journal_account(&r.description),
            })
        })
        .collect();
    greedy_pairs(&legs, |a, b| {
        if a.date != b.date || a.direction == b.direction {
            return false;
        }
        if (a.amount + b.amount).abs() >= tolerance {
            return false;
        }
        if let Some(set) = accounts {
            let internal = |acct: &Option<String>| acct.as_ref().is_some_and(|n| set.contains(n));
            if !internal(&a.account) || !internal(&b.account) {
                debug!(
                    "skipping journal pair on {}: accounts {:?}, {:?} not all in merge set",
                    a.date, a.account, b.account
                );
                return false;
            }
        }
        debug!(
            "matched journal pair on {}, amounts {} and {}",
            a.date, a.amount, b.amount
        );
        true
    })
}

// ---------------------------------------------------------------------------
// TransferMatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSummary {
    pub found: usize,
    pub matched: usize,
}

impl KindSummary {
    pub fn pairs(&self) -> usize {
        self.matched / 2
    }
}

#[derive(Debug)]
pub struct TransferOutcome {
    /// Non-transfer rows in input order, then kept unmatched transfers in input order.
    pub rows: Vec<Transaction>,
    pub shares: KindSummary,
    pub journals: KindSummary,
    pub kept_unmatched: usize,
}

/// Removes internal transfers between the accounts being merged.
///
/// `Journaled Shares` rows and `Journal` cash rows (`JOURNAL TO ...nnn` /
/// `JOURNAL FRM ...nnn`) are paired greedily in input order. Leftover rows
/// either fail the merge or are kept, never silently dropped.
pub struct TransferMatcher<'a> {
    accounts: Option<&'a BTreeSet<String>>,
    keep_unmatched: bool,
    tolerance: f64,
}

impl<'a> TransferMatcher<'a> {
    /// `accounts` enables account verification; pass it only when every
    /// input file yielded an account number.
    pub fn new(accounts: Option<&'a BTreeSet<String>>, keep_unmatched: bool) -> Self {
        Self {
            accounts,
            keep_unmatched,
            tolerance: 0.01,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn filter(&self, rows: Vec<Transaction>) -> Result<TransferOutcome> {
        let kinds: Vec<Kind> = rows.iter().map(kind_of).collect();
        let mut shares = Vec::new();
        let mut journals = Vec::new();
        let mut other = Vec::new();
        for (row, kind) in rows.into_iter().zip(&kinds) {
            match kind {
                Kind::Shares => shares.push(row),
                Kind::Journal => journals.push(row),
                Kind::Other => other.push(row),
            }
        }

        let shares_matched = match_journaled_shares(&shares, self.tolerance);
        let journals_matched = match_journal_transfers(&journals, self.accounts, self.tolerance);

        let mut report = UnmatchedReport {
            accounts: self.accounts.map(|set| set.iter().cloned().collect()),
            ..Default::default()
        };
        let mut keep_share = vec![false; shares.len()];
        let mut keep_journal = vec![false; journals.len()];

        for (idx, row) in shares.iter().enumerate() {
            if shares_matched[idx] {
                continue;
            }
            if self.keep_unmatched {
                keep_share[idx] = true;
            } else {
                report.shares.push(UnmatchedRow {
                    date: row.date.clone(),
                    label: row.symbol.clone(),
                    value: row.quantity.clone(),
                    account: None,
                });
            }
        }

        for (idx, row) in journals.iter().enumerate() {
            if journals_matched[idx] {
                continue;
            }
            let account = extract_journal_account(&row.description);
            let external = match self.accounts {
                Some(set) => !account.as_ref().is_some_and(|a| set.contains(a)),
                None => false,
            };
            if external || self.keep_unmatched {
                keep_journal[idx] = true;
            } else {
                report.journals.push(UnmatchedRow {
                    date: row.date.clone(),
                    label: row.description.clone(),
                    value: row.amount.clone(),
                    account,
                });
            }
        }

        if !report.is_empty() {
            return Err(ToolError::UnmatchedTransfers(report));
        }

        let shares_summary = KindSummary {
            found: shares.len(),
            matched: shares_matched.iter().filter(|m| **m).count(),
        };
        let journals_summary = KindSummary {
            found: journals.len(),
            matched: journals_matched.iter().filter(|m| **m).count(),
        };

        // Re-interleave kept transfer rows in their original relative order.
        let mut shares_iter = shares.into_iter().zip(keep_share);
        let mut journals_iter = journals.into_iter().zip(keep_journal);
        let mut kept = Vec::new();
        for kind in &kinds {
            let next = match kind {
                Kind::Shares => shares_iter.next(),
                Kind::Journal => journals_iter.next(),
                Kind::Other => continue,
            };
            if let Some((row, true)) = next {
                kept.push(row);
            }
        }

        let kept_unmatched = kept.len();
        let mut rows = other;
        rows.extend(kept);
        Ok(TransferOutcome {
            rows,
            shares: shares_summary,
            journals: journals_summary,
            kept_unmatched,
        })
    }
}
