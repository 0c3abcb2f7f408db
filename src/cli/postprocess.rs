use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Table};
use tracing::debug;

use crate::fmt::{thousands, truncate};
use crate::importer::{layout, load_mapping_file, read_transactions, validate_transactions_csv, write_transactions};
use crate::models::{RoundingFix, SymbolAssignment};
use crate::parse::format_mdy;
use crate::rounding::RoundingReconciler;
use crate::settings::Settings;
use crate::symbols::{SymbolResolver, SymbolStats};
use crate::tax_year::{filter_by_tax_year, uk_tax_year_end};

use super::sibling;

pub struct PostprocessOptions {
    pub mapping: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub fix_rounding: bool,
    pub tax_year: Option<i32>,
    pub write_log: bool,
}

fn load_mapping(path: &Path) -> Result<HashMap<String, String>> {
    println!("Loading mapping file: {}", path.display());
    let table = load_mapping_file(path)?;
    println!("  Loaded {} mapping(s)", thousands(table.mappings.len()));
    if !table.duplicates.is_empty() {
        println!(
            "  {} {} duplicate description(s) in mapping file, last entry wins",
            "⚠".yellow(),
            table.duplicates.len()
        );
        for (line, description) in table.duplicates.iter().take(3) {
            println!("    Line {line}: {}", truncate(description, 50));
        }
    }
    Ok(table.mappings)
}

pub(crate) fn write_symbol_log(path: &Path, assignments: &[SymbolAssignment]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["Row", "Original Description", "Assigned Symbol", "Source"])?;
    for a in assignments {
        wtr.write_record([
            a.row.to_string().as_str(),
            a.description.as_str(),
            a.symbol.as_str(),
            a.source.label(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn write_rounding_log(path: &Path, fixes: &[RoundingFix]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["Row", "Symbol", "Description", "Old Amount", "New Amount", "Difference"])?;
    for f in fixes {
        wtr.write_record([
            f.row.to_string(),
            f.symbol.clone(),
            f.description.clone(),
            f.old_amount.clone(),
            f.new_amount.clone(),
            format!("${:.3}", f.difference),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_symbol_summary(stats: &SymbolStats) {
    if stats.missing_symbols == 0 {
        println!("No missing symbols found - all transactions have symbols!");
        return;
    }
    println!(
        "Found {} row(s) with missing symbols",
        thousands(stats.missing_symbols)
    );
    println!(
        "  mapped: {}, reused: {}, generated: {}, fallback: {}",
        thousands(stats.mapped),
        thousands(stats.reused),
        thousands(stats.generated),
        thousands(stats.fallback)
    );
    for (description, rows) in &stats.missing_descriptions {
        debug!("missing symbol: {description} ({rows} row(s))");
    }
    if stats.assignments.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Description", "Symbol", "Rows"]);
    for (description, (symbol, count)) in &stats.assignments {
        table.add_row(vec![
            Cell::new(truncate(description, 50)),
            Cell::new(symbol),
            Cell::new(count),
        ]);
    }
    println!("{table}");
}

fn print_rounding_summary(fixes: &[RoundingFix]) {
    if fixes.is_empty() {
        println!("No rounding errors found");
        return;
    }
    println!("Fixed {} rounding error(s)", thousands(fixes.len()));
    let mut table = Table::new();
    table.set_header(vec!["Row", "Symbol", "Old Amount", "New Amount", "Difference"]);
    for f in fixes {
        table.add_row(vec![
            Cell::new(f.row),
            Cell::new(&f.symbol),
            Cell::new(&f.old_amount),
            Cell::new(&f.new_amount),
            Cell::new(format!("${:.3}", f.difference)),
        ]);
    }
    println!("{table}");
}

pub fn run(settings: &Settings, input: &Path, opts: PostprocessOptions) -> Result<()> {
    println!("Processing {}...", input.display());
    let headers = validate_transactions_csv(input)?;

    let mapping_path = opts
        .mapping
        .clone()
        .or_else(|| settings.mapping_file.as_ref().map(PathBuf::from));
    let mapping = match &mapping_path {
        Some(path) => load_mapping(path)?,
        None => HashMap::new(),
    };

    let mut rows = read_transactions(input)?;
    let total = rows.len();

    if let Some(year) = opts.tax_year {
        let end = uk_tax_year_end(year).with_context(|| format!("invalid tax year {year}"))?;
        println!("Tax year {year}: filtering transactions after {}", format_mdy(end));
        let (kept, removed) = filter_by_tax_year(rows, end);
        if removed > 0 {
            println!("  Filtered out {} row(s)", thousands(removed));
        }
        rows = kept;
    }

    let resolver = SymbolResolver::new(&mapping, &settings.security_actions, settings.max_symbol_length);
    let report = resolver.resolve_all(rows);
    let mut rows = report.rows;

    let fixes = if opts.fix_rounding {
        let rounding = RoundingReconciler::from_settings(settings).reconcile(rows);
        rows = rounding.rows;
        Some(rounding.fixes)
    } else {
        None
    };

    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| sibling(input, "_processed.csv"));
    write_transactions(&output, &layout(&headers), &rows)
        .with_context(|| format!("writing {}", output.display()))?;

    println!();
    println!("Rows read: {}", thousands(total));
    print_symbol_summary(&report.stats);
    if let Some(fixes) = &fixes {
        print_rounding_summary(fixes);
    }

    if opts.write_log {
        if !report.assignments.is_empty() {
            let log = sibling(input, "_symbol_changes.log");
            write_symbol_log(&log, &report.assignments)
                .with_context(|| format!("writing {}", log.display()))?;
            println!("Change log: {}", log.display());
        }
        if let Some(fixes) = fixes.as_deref().filter(|f| !f.is_empty()) {
            let log = sibling(input, "_rounding_fixes.log");
            write_rounding_log(&log, fixes)
                .with_context(|| format!("writing {}", log.display()))?;
            println!("Rounding log: {}", log.display());
        }
    }

    println!("{} Output: {}", "✓".green(), output.display());
    Ok(())
}
