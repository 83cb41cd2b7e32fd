//! CLI for adchain.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod attribute;
mod batch;
mod check;
mod identify;
mod stats;

#[derive(Parser)]
#[command(name = "adchain-cli", version, about = "Attribute ad resource loads over page graph recordings")]
struct Cli {
    /// Print skip diagnostics while processing (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attribute labeled resources against a single graph recording
    Attribute(attribute::Args),
    /// Attribute every page of a crawl, processing page graphs in parallel
    Batch(batch::Args),
    /// Check information about a particular node or edge id in the graph
    Identify(identify::Args),
    /// Check attribution records against filter-list rules
    Check(check::Args),
    /// Summarize chain statistics over a batch summary
    Stats(stats::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Attribute(args) => attribute::run(args),
        Command::Batch(args) => batch::run(args),
        Command::Identify(args) => identify::run(args),
        Command::Check(args) => check::run(args),
        Command::Stats(args) => stats::run(args),
    }
}
