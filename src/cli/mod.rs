pub mod awards;
pub mod config;
pub mod merge;
pub mod postprocess;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

/// `merged_schwab_20240131_154500.csv` style name in the working directory.
pub(crate) fn timestamped_output(prefix: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{prefix}_{stamp}.csv"))
}

/// Sibling of `input` named `<stem><suffix>`.
pub(crate) fn sibling(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}"))
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Parser)]
#[command(
    name = "schwab-csv",
    version,
    about = "Prepare Schwab transaction exports for a capital-gains calculator."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/schwab-csv-tools/settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,
    /// Show per-row diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge transaction exports from several accounts into one file.
    Merge {
        /// Transaction CSV files, in any order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output path (default: merged_schwab_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep transfers without a counterpart instead of failing
        #[arg(long)]
        keep_unmatched_transfers: bool,
    },
    /// Merge equity-award exports (two rows per award).
    MergeAwards {
        /// Award CSV files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output path (default: merged_schwab_awards_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fill missing symbols and optionally fix rounding in one export.
    Postprocess {
        /// Transaction CSV file
        file: PathBuf,
        /// Description,Symbol mapping file
        #[arg(short, long, value_name = "FILE")]
        mapping: Option<PathBuf>,
        /// Output path (default: <INPUT>_processed.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Correct amounts off by $0.01-$1.00 from quantity x price
        #[arg(long)]
        fix_rounding: bool,
        /// Drop rows after 5 April of YEAR+1
        #[arg(long, value_name = "YEAR")]
        tax_year: Option<i32>,
        /// Write symbol and rounding change logs next to the input
        #[arg(long)]
        write_log: bool,
    },
    /// Merge calculator config files.
    MergeConfig {
        #[arg(value_enum)]
        kind: ConfigKind,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConfigKind {
    /// date,symbol,price rows
    InitialPrices,
    /// dst,src rows
    SpinOffs,
}
