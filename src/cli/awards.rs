use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::awards::{read_awards, remove_duplicates, sort_by_date, validate_awards_csv, write_awards};
use crate::error::ToolError;
use crate::fmt::thousands;
use crate::importer::check_compatible;
use crate::parse::{date_range, parse_award_date};

use super::{file_name, timestamped_output};

pub fn run(files: &[PathBuf], output: Option<&Path>) -> Result<()> {
    println!("Processing {} award file(s)...", files.len());
    println!();

    let mut reference: Option<Vec<String>> = None;
    for (i, path) in files.iter().enumerate() {
        let (headers, _) = validate_awards_csv(path)?;
        match &reference {
            None => reference = Some(headers),
            Some(first) => check_compatible(first, i + 1, path, &headers)?,
        }
    }
    let Some(headers) = reference else {
        anyhow::bail!("no input files");
    };
    let date_idx = headers
        .iter()
        .position(|h| h == "Date")
        .ok_or_else(|| ToolError::MissingColumns {
            path: files[0].clone(),
            missing: vec!["Date".to_string()],
        })?;

    let width = files.iter().map(|p| file_name(p).len()).max().unwrap_or(0);
    let mut all = Vec::new();
    for path in files {
        let records = read_awards(path, &headers)?;
        println!(
            "{} {:<width$}  {:>6} award(s)",
            "✓".green(),
            file_name(path),
            thousands(records.len())
        );
        all.extend(records);
    }
    println!();
    println!("Total: {} award(s)", thousands(all.len()));

    let before = all.len();
    let mut records = remove_duplicates(all);
    let removed = before - records.len();
    if removed > 0 {
        println!("Removed: {} duplicate(s)", thousands(removed));
    }
    sort_by_date(&mut records, date_idx);

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| timestamped_output("merged_schwab_awards"));
    write_awards(&output, &headers, &records)
        .with_context(|| format!("writing {}", output.display()))?;

    let (earliest, latest) = date_range(records.iter().map(|r| r.field(date_idx)), parse_award_date);
    println!("Final count: {} award(s)", thousands(records.len()));
    println!("Date range: {earliest} to {latest}");
    println!("{} Output: {}", "✓".green(), output.display());
    Ok(())
}
