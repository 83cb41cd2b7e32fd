//! Attribution of ad resource loads to the chain of scripts that caused
//! them, over page-load causality graph recordings.
//!
//! One [`graph::PageGraph`] is decoded per page load. For each ad-labeled
//! resource on that page, the [`resolve::UrlIndex`] locates the node
//! representing the load, the chain builder walks creation provenance back
//! toward the root, the pruner cuts the chain before the first node with
//! unexplained side effects, and the extractor projects what is left onto
//! external script URLs. See [`attribution`] for the assembled pipeline.

pub mod attribution;
pub mod error;
pub mod filters;
pub mod from_xml;
pub mod graph;
pub mod graph_algos;
pub mod normalize;
pub mod resolve;
pub mod sources;
pub mod types;
