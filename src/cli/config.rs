use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;

use crate::config_files::{merge_initial_prices, merge_spin_offs};
use crate::fmt::thousands;

use super::ConfigKind;

pub fn run(kind: ConfigKind, files: &[PathBuf], output: &Path) -> Result<()> {
    let (summary, noun) = match kind {
        ConfigKind::InitialPrices => (merge_initial_prices(files, output)?, "initial price(s)"),
        ConfigKind::SpinOffs => (merge_spin_offs(files, output)?, "spin-off(s)"),
    };
    if summary.replaced > 0 {
        println!(
            "{} {} duplicate(s) replaced by later entries",
            "⚠".yellow(),
            thousands(summary.replaced)
        );
    }
    println!(
        "{} Merged {} {noun} ({} row(s) read from {} file(s)) into {}",
        "✓".green(),
        thousands(summary.written),
        thousands(summary.read),
        files.len(),
        output.display()
    );
    Ok(())
}
