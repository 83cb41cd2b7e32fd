//! Collaborator seams for fetching serialized graphs and labeled resources.
//!
//! Both are dependency-injected into the batch driver so the traversal core
//! holds no process-wide clients. All fetching is synchronous and happens
//! before a graph is constructed; anything fancier (retries, remote
//! storage) belongs behind these traits, not inside them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::attribution::AdResource;
use crate::error::GraphError;

/// Produces the serialized GraphML recording for a page, or fails. A
/// failure costs that page only.
pub trait GraphSource {
    fn fetch(&self, page_url: &str) -> Result<String, GraphError>;
}

/// Produces the ad-labeled resource loads, grouped per page.
pub trait LabelSource {
    fn labeled_pages(&self) -> Result<Vec<PageLabels>, GraphError>;
}

/// The labeled resources belonging to one crawled page.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PageLabels {
    pub page_url: String,
    pub resources: Vec<AdResource>,
}

/// Graph recordings in a local directory, located through a page-URL to
/// file-name mapping (the crawler writes one JSON mapping per crawl).
pub struct MappedGraphSource {
    root: PathBuf,
    mapping: HashMap<String, String>,
}

impl MappedGraphSource {
    pub fn new(root: impl Into<PathBuf>, mapping_file: &Path) -> Result<Self, GraphError> {
        let data = fs::read_to_string(mapping_file)
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", mapping_file.display(), e)))?;
        let mapping = serde_json::from_str(&data)
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", mapping_file.display(), e)))?;
        Ok(Self { root: root.into(), mapping })
    }
}

impl GraphSource for MappedGraphSource {
    fn fetch(&self, page_url: &str) -> Result<String, GraphError> {
        let file_name = self
            .mapping
            .get(page_url)
            .ok_or_else(|| GraphError::not_found(format!("no recording mapped for {}", page_url)))?;
        let path = self.root.join(file_name);
        fs::read_to_string(&path)
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", path.display(), e)))
    }
}

/// Labeled resources read from a JSON file mapping each page URL to its
/// classification rows.
pub struct JsonLabelSource {
    path: PathBuf,
}

impl JsonLabelSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LabelSource for JsonLabelSource {
    fn labeled_pages(&self) -> Result<Vec<PageLabels>, GraphError> {
        let data = fs::read_to_string(&self.path)
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        // BTreeMap keeps page order stable across runs.
        let by_page: BTreeMap<String, Vec<AdResource>> = serde_json::from_str(&data)
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        Ok(by_page
            .into_iter()
            .map(|(page_url, resources)| PageLabels { page_url, resources })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mapped_source_reads_through_the_mapping() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page_graph_1.graphml"), "<graphml/>").unwrap();
        let mapping_path = dir.path().join("mapping.json");
        let mut mapping = fs::File::create(&mapping_path).unwrap();
        write!(mapping, r#"{{"https://site.example/": "page_graph_1.graphml"}}"#).unwrap();

        let source = MappedGraphSource::new(dir.path(), &mapping_path).unwrap();

        assert_eq!(source.fetch("https://site.example/").unwrap(), "<graphml/>");
        assert!(matches!(
            source.fetch("https://other.example/"),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn mapped_file_missing_on_disk_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mapping_path = dir.path().join("mapping.json");
        fs::write(&mapping_path, r#"{"https://site.example/": "gone.graphml"}"#).unwrap();

        let source = MappedGraphSource::new(dir.path(), &mapping_path).unwrap();

        assert!(matches!(
            source.fetch("https://site.example/"),
            Err(GraphError::Unavailable(_))
        ));
    }

    #[test]
    fn labels_group_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let labels_path = dir.path().join("labels.json");
        fs::write(
            &labels_path,
            r#"{
                "https://b.example/": [
                    {"resource_url": "https://ads.example/x.png", "resource_type": "image"}
                ],
                "https://a.example/": [
                    {"resource_url": "https://ads.example/f.html", "resource_type": "iframe"},
                    {"resource_url": "https://ads.example/y.png", "resource_type": "image"}
                ]
            }"#,
        )
        .unwrap();

        let pages = JsonLabelSource::new(&labels_path).labeled_pages().unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_url, "https://a.example/");
        assert_eq!(pages[0].resources.len(), 2);
        assert_eq!(pages[1].page_url, "https://b.example/");
    }
}
