//! Prints everything the graph knows about one node or edge id.

use std::convert::TryFrom;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use adchain::from_xml;
use adchain::graph::{EdgeId, NodeId};

#[derive(clap::Args)]
pub struct Args {
    /// Graph recording to inspect.
    #[arg(short = 'f', long = "graph", value_name = "FILE")]
    graph_file: PathBuf,

    /// Node or edge id, in its recorded form (e.g. n7 or e12).
    id: String,
}

pub fn run(args: Args) -> Result<()> {
    let graph = from_xml::read_from_file(&args.graph_file)
        .with_context(|| format!("decoding {}", args.graph_file.display()))?;

    if let Ok(node_id) = NodeId::try_from(args.id.as_str()) {
        let Some(node) = graph.node(node_id) else {
            bail!("no node with id {} was found in this graph", args.id);
        };
        println!("Node {}", node.id);
        println!("Timestamp: {}", node.node_timestamp);
        println!("Type: {:?}", node.node_type);

        println!();
        println!("Incoming edges");
        graph.incoming_edges(node_id).for_each(|edge| {
            println!("  {} from {}", edge.id, edge.source);
            println!("    Timestamp: {:?}", edge.edge_timestamp);
            println!("    Type: {:?}", edge.edge_type);
        });

        println!();
        println!("Outgoing edges");
        graph.outgoing_edges(node_id).for_each(|edge| {
            println!("  {} to {}", edge.id, edge.target);
            println!("    Timestamp: {:?}", edge.edge_timestamp);
            println!("    Type: {:?}", edge.edge_type);
        });
    } else if let Ok(edge_id) = EdgeId::try_from(args.id.as_str()) {
        let Some(edge) = graph.edges.get(&edge_id) else {
            bail!("no edge with id {} was found in this graph", args.id);
        };
        println!("Edge {}", edge.id);
        println!("Timestamp: {:?}", edge.edge_timestamp);
        println!("Type: {:?}", edge.edge_type);

        println!();
        println!("Source node");
        let source_node = graph.source_node(edge);
        println!("  {}", source_node.id);
        println!("    Timestamp: {}", source_node.node_timestamp);
        println!("    Type: {:?}", source_node.node_type);

        println!();
        println!("Target node");
        let target_node = graph.target_node(edge);
        println!("  {}", target_node.id);
        println!("    Timestamp: {}", target_node.node_timestamp);
        println!("    Type: {:?}", target_node.node_type);
    } else {
        bail!("`{}` is not a node id (nN) or edge id (eN)", args.id);
    }

    Ok(())
}
