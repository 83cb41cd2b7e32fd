//! Checks a batch summary against filter-list rules: for each attributed
//! resource, which element of resource + chain the rules already block.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use adchain::attribution::BatchSummary;
use adchain::filters::FilterChecker;

#[derive(clap::Args)]
pub struct Args {
    /// Batch summary JSON produced by `batch`.
    #[arg(long, value_name = "FILE")]
    summary: PathBuf,

    /// Filter list file (newline-separated adblock rules); repeatable.
    #[arg(short = 'l', long = "list", value_name = "FILE", required = true)]
    lists: Vec<PathBuf>,
}

#[derive(Serialize)]
struct CheckedRecord<'a> {
    page_url: &'a str,
    resource_url: &'a str,
    /// The first element the rules block, the resource itself or a chain
    /// script; absent when the rules miss this ad.
    #[serde(skip_serializing_if = "Option::is_none")]
    blocked_element: Option<String>,
}

pub fn run(args: Args) -> Result<()> {
    let mut rules = Vec::new();
    for list in &args.lists {
        let file = std::fs::File::open(list).with_context(|| format!("opening {}", list.display()))?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            if !line.is_empty() {
                rules.push(line);
            }
        }
    }
    let checker = FilterChecker::new(&rules);

    let data = std::fs::read_to_string(&args.summary)
        .with_context(|| format!("reading {}", args.summary.display()))?;
    let summary: BatchSummary =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", args.summary.display()))?;

    let mut checked = Vec::new();
    let mut missed = 0usize;
    for page in &summary.pages {
        for record in &page.records {
            let blocked_element = checker.first_blocked(record, &page.page_url);
            if blocked_element.is_none() {
                missed += 1;
            }
            checked.push(CheckedRecord {
                page_url: &page.page_url,
                resource_url: &record.resource_url,
                blocked_element,
            });
        }
    }

    println!("{}", serde_json::to_string(&checked)?);
    tracing::info!(records = checked.len(), missed, "filter check finished");
    Ok(())
}
