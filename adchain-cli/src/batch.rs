//! Attributes every page of a crawl, processing page graphs in parallel,
//! and prints or writes the aggregate summary.

use std::path::PathBuf;

use anyhow::{Context, Result};

use adchain::attribution::attribute_batch;
use adchain::graph_algos::ChainPolicy;
use adchain::sources::{JsonLabelSource, MappedGraphSource};

#[derive(clap::Args)]
pub struct Args {
    /// Directory holding the graph recordings.
    #[arg(long, value_name = "DIR")]
    graphs: PathBuf,

    /// JSON mapping from page URL to recording file name.
    #[arg(long, value_name = "FILE")]
    mapping: PathBuf,

    /// JSON labels: page URL to classification rows.
    #[arg(long, value_name = "FILE")]
    labels: PathBuf,

    /// Write the summary here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Distinct unexplained insertion parents tolerated before a chain is cut.
    #[arg(long, default_value_t = 2)]
    tolerance: usize,

    /// Do not require created scripts to be safe to remove themselves.
    #[arg(long)]
    no_script_recursion: bool,
}

pub fn run(args: Args) -> Result<()> {
    let graphs = MappedGraphSource::new(&args.graphs, &args.mapping)
        .with_context(|| format!("loading {}", args.mapping.display()))?;
    let labels = JsonLabelSource::new(&args.labels);
    let policy = ChainPolicy {
        max_unexplained_parents: args.tolerance,
        recurse_created_scripts: !args.no_script_recursion,
    };

    let summary = attribute_batch(&graphs, &labels, &policy)?;

    let json = serde_json::to_string(&summary)?;
    match &args.output {
        Some(path) => std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
