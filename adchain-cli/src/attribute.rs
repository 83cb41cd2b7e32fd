//! Attributes labeled resources against a single graph recording and prints
//! the records as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use adchain::attribution::{attribute_page, AdResource};
use adchain::from_xml;
use adchain::graph_algos::ChainPolicy;
use adchain::types::ResourceKind;

#[derive(clap::Args)]
pub struct Args {
    /// Graph recording to attribute against.
    #[arg(short = 'f', long = "graph", value_name = "FILE")]
    graph_file: PathBuf,

    /// JSON file with the labeled resources for this page.
    #[arg(long, conflicts_with_all = ["url", "kind"])]
    labels: Option<PathBuf>,

    /// Single resource URL to attribute.
    #[arg(long, requires = "kind")]
    url: Option<String>,

    /// Resource kind for --url.
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Known blocked upstream script URL to rebind the chain to.
    #[arg(long, requires = "url")]
    known_script: Option<String>,

    /// Distinct unexplained insertion parents tolerated before a chain is cut.
    #[arg(long, default_value_t = 2)]
    tolerance: usize,

    /// Do not require created scripts to be safe to remove themselves.
    #[arg(long)]
    no_script_recursion: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum KindArg {
    Image,
    Iframe,
}

impl From<KindArg> for ResourceKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Image => Self::Image,
            KindArg::Iframe => Self::Iframe,
        }
    }
}

pub fn run(args: Args) -> Result<()> {
    let graph = from_xml::read_from_file(&args.graph_file)
        .with_context(|| format!("decoding {}", args.graph_file.display()))?;

    let resources: Vec<AdResource> = if let Some(labels) = &args.labels {
        let data = std::fs::read_to_string(labels)
            .with_context(|| format!("reading {}", labels.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", labels.display()))?
    } else if let (Some(url), Some(kind)) = (&args.url, args.kind) {
        vec![AdResource {
            url: url.clone(),
            kind: kind.into(),
            known_blocked_script: args.known_script.clone(),
        }]
    } else {
        bail!("provide --labels, or --url together with --kind");
    };

    let policy = ChainPolicy {
        max_unexplained_parents: args.tolerance,
        recurse_created_scripts: !args.no_script_recursion,
    };
    let records = attribute_page(&graph, &resources, &policy);
    println!("{}", serde_json::to_string(&records)?);
    Ok(())
}
