mod awards;
mod cli;
mod config_files;
mod error;
mod fmt;
mod importer;
mod models;
mod parse;
mod rounding;
mod settings;
mod symbols;
mod tax_year;
mod transfers;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use settings::load_settings;

fn init_tracing(verbose: bool) {
    let default = if verbose { "schwab_csv=debug" } else { "schwab_csv=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Merge {
            files,
            output,
            keep_unmatched_transfers,
        } => cli::merge::run(&settings, &files, output.as_deref(), keep_unmatched_transfers),
        Commands::MergeAwards { files, output } => cli::awards::run(&files, output.as_deref()),
        Commands::Postprocess {
            file,
            mapping,
            output,
            fix_rounding,
            tax_year,
            write_log,
        } => cli::postprocess::run(
            &settings,
            &file,
            cli::postprocess::PostprocessOptions {
                mapping,
                output,
                fix_rounding,
                tax_year,
                write_log,
            },
        ),
        Commands::MergeConfig {
            kind,
            files,
            output,
        } => cli::config::run(kind, &files, &output),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", "Error:".red());
        std::process::exit(1);
    }
}
