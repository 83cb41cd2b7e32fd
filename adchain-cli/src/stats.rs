//! Chain statistics over a batch summary: chain counts and average lengths
//! per resource kind, and unique script URLs.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use adchain::attribution::BatchSummary;
use adchain::from_xml;
use adchain::types::ResourceKind;

#[derive(clap::Args)]
pub struct Args {
    /// Batch summary JSON produced by `batch`.
    #[arg(long, value_name = "FILE")]
    summary: PathBuf,

    /// Also print node and edge counts for one graph recording.
    #[arg(long, value_name = "FILE")]
    graph: Option<PathBuf>,
}

#[derive(Default)]
struct KindStats {
    chains: usize,
    scripts: usize,
    unique: HashSet<String>,
}

impl KindStats {
    fn add(&mut self, scripts: &[String]) {
        self.chains += 1;
        self.scripts += scripts.len();
        self.unique.extend(scripts.iter().cloned());
    }

    fn average(&self) -> f64 {
        if self.chains == 0 {
            0.0
        } else {
            self.scripts as f64 / self.chains as f64
        }
    }
}

pub fn run(args: Args) -> Result<()> {
    let data = std::fs::read_to_string(&args.summary)
        .with_context(|| format!("reading {}", args.summary.display()))?;
    let summary: BatchSummary =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", args.summary.display()))?;

    let mut images = KindStats::default();
    let mut frames = KindStats::default();
    let mut all_unique = HashSet::new();
    for page in &summary.pages {
        for record in &page.records {
            let Some(attribution) = &record.attribution else { continue };
            match record.resource_kind {
                ResourceKind::Image => images.add(&attribution.scripts),
                ResourceKind::Iframe => frames.add(&attribution.scripts),
            }
            all_unique.extend(attribution.scripts.iter().cloned());
        }
    }

    println!("pages: {} (skipped: {})", summary.pages.len(), summary.pages_skipped);
    println!("unattributed resources: {}", summary.unattributed);
    println!(
        "image chains: {} (average length {:.2}, unique scripts {})",
        images.chains,
        images.average(),
        images.unique.len()
    );
    println!(
        "frame chains: {} (average length {:.2}, unique scripts {})",
        frames.chains,
        frames.average(),
        frames.unique.len()
    );
    let total_chains = images.chains + frames.chains;
    let total_scripts = images.scripts + frames.scripts;
    let total_average = if total_chains == 0 {
        0.0
    } else {
        total_scripts as f64 / total_chains as f64
    };
    println!(
        "all chains: {} (average length {:.2}, unique scripts {})",
        total_chains,
        total_average,
        all_unique.len()
    );

    if let Some(graph_file) = &args.graph {
        let graph = from_xml::read_from_file(graph_file)
            .with_context(|| format!("decoding {}", graph_file.display()))?;
        println!("graph {}: {} nodes, {} edges", graph_file.display(), graph.nodes.len(), graph.edges.len());
    }

    Ok(())
}
