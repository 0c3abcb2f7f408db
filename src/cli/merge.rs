use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::fmt::thousands;
use crate::importer::{
    check_compatible, duplicate_inputs, layout, read_transactions, remove_duplicates,
    sort_by_date, validate_transactions_csv, write_transactions,
};
use crate::parse::{date_range, extract_account_number, parse_posted_date};
use crate::settings::Settings;
use crate::transfers::{TransferMatcher, TransferOutcome};

use super::{file_name, timestamped_output};

/// Account numbers for every input, or `None` if any filename lacks one.
fn account_numbers(files: &[PathBuf]) -> Option<BTreeSet<String>> {
    let mut accounts = BTreeSet::new();
    let mut missing = Vec::new();
    for path in files {
        match extract_account_number(&file_name(path)) {
            Some(account) => {
                accounts.insert(account);
            }
            None => missing.push(file_name(path)),
        }
    }
    if missing.is_empty() {
        println!("Detected account numbers: {accounts:?}");
        return Some(accounts);
    }
    println!(
        "{} Could not extract account numbers from {} file(s):",
        "⚠".yellow(),
        missing.len()
    );
    for name in &missing {
        println!("    {name}");
    }
    println!("  Skipping account verification for journal transfers");
    None
}

fn print_transfer_summary(outcome: &TransferOutcome) {
    if outcome.shares.found > 0 {
        println!(
            "Journaled Shares: {} found, {} pair(s) removed",
            thousands(outcome.shares.found),
            thousands(outcome.shares.pairs())
        );
    }
    if outcome.journals.found > 0 {
        println!(
            "Journal transfers: {} found, {} pair(s) removed",
            thousands(outcome.journals.found),
            thousands(outcome.journals.pairs())
        );
    }
    if outcome.kept_unmatched > 0 {
        println!(
            "{} Kept {} unmatched transfer(s)",
            "⚠".yellow(),
            thousands(outcome.kept_unmatched)
        );
    }
}

pub fn run(
    settings: &Settings,
    files: &[PathBuf],
    output: Option<&Path>,
    keep_unmatched_transfers: bool,
) -> Result<()> {
    println!("Processing {} input file(s)...", files.len());
    println!();

    let mut reference: Option<Vec<String>> = None;
    for (i, path) in files.iter().enumerate() {
        let headers = validate_transactions_csv(path)?;
        match &reference {
            None => reference = Some(headers),
            Some(first) => check_compatible(first, i + 1, path, &headers)?,
        }
    }
    let Some(reference) = reference else {
        anyhow::bail!("no input files");
    };

    for (earlier, later) in duplicate_inputs(files)? {
        println!(
            "{} {} has the same content as {}",
            "⚠".yellow(),
            file_name(&later),
            file_name(&earlier)
        );
    }

    let width = files.iter().map(|p| file_name(p).len()).max().unwrap_or(0);
    let mut all_rows = Vec::new();
    for path in files {
        let rows = read_transactions(path)?;
        println!(
            "{} {:<width$}  {:>6} transaction(s)",
            "✓".green(),
            file_name(path),
            thousands(rows.len())
        );
        all_rows.extend(rows);
    }
    println!();
    println!("Total: {} transaction(s)", thousands(all_rows.len()));

    let (rows, removed) = remove_duplicates(all_rows);
    if removed > 0 {
        println!("Removed: {} duplicate(s)", thousands(removed));
    }
    println!();

    let accounts = account_numbers(files);
    let outcome = TransferMatcher::new(accounts.as_ref(), keep_unmatched_transfers)
        .with_tolerance(settings.transfer_tolerance)
        .filter(rows)?;
    print_transfer_summary(&outcome);

    let mut rows = outcome.rows;
    sort_by_date(&mut rows);

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| timestamped_output("merged_schwab"));
    write_transactions(&output, &layout(&reference), &rows)
        .with_context(|| format!("writing {}", output.display()))?;

    let (earliest, latest) = date_range(rows.iter().map(|r| r.date.as_str()), parse_posted_date);
    println!();
    println!("Final count: {} transaction(s)", thousands(rows.len()));
    println!("Date range: {earliest} to {latest}");
    println!("{} Output: {}", "✓".green(), output.display());
    Ok(())
}
