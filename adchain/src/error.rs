use thiserror::Error;

/// Failure taxonomy for graph decoding and traversal.
///
/// `NotFound` and `MalformedGraph` are recovered per resource or per chain;
/// `ParseFailure` and `Unavailable` cost the whole page graph. None of them
/// ever aborts a batch.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A resource or frame node could not be resolved, or no qualifying
    /// starting edge exists for it.
    #[error("not found: {0}")]
    NotFound(String),

    /// The graph decoded, but violates a structural assumption: a dangling
    /// edge endpoint, or a provenance cycle hit during traversal.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// The serialized graph description could not be decoded into the graph
    /// model at all.
    #[error("undecodable graph description: {0}")]
    ParseFailure(String),

    /// A graph source failed to produce the serialized graph for a page.
    #[error("graph unavailable: {0}")]
    Unavailable(String),
}

impl GraphError {
    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedGraph(msg.into())
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Self::ParseFailure(msg.into())
    }
}
