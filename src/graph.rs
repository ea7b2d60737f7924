//! Folder graph: every folder the user owns plus the synthetic root,
//! keyed by Drive id and linked by parent pointers.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::error::DriveError;
use crate::store::{collect_all, FileQuery, RemoteStore};

/// Name (and therefore path) of the synthetic root folder.
pub const ROOT_MARKER: &str = ".";

/// Which parent to follow when Drive lists several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentPolicy {
    /// Follow the first listed parent and ignore the rest.
    FirstListed,
}

impl ParentPolicy {
    pub fn select<'a>(&self, parents: &'a [String]) -> Option<&'a str> {
        match self {
            ParentPolicy::FirstListed => parents.first().map(String::as_str),
        }
    }
}

/// Multi-parent folders keep only their first parent.
pub const PARENT_POLICY: ParentPolicy = ParentPolicy::FirstListed;

/// A folder before its path is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: String,
    /// Empty for the root.
    pub parent_id: String,
    pub name: String,
}

impl FolderRecord {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            name: name.into(),
        }
    }

    /// The synthetic root record for the given Drive root id.
    pub fn root(id: impl Into<String>) -> Self {
        Self::new(id, "", ROOT_MARKER)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }
}

/// Folders keyed by id.
#[derive(Debug, Default, Clone)]
pub struct FolderGraph {
    folders: HashMap<String, FolderRecord>,
    root_id: Option<String>,
}

impl FolderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder. A root record becomes the graph's root; the root is never replaced.
    pub fn insert(&mut self, record: FolderRecord) {
        if self.root_id.as_deref() == Some(record.id.as_str()) {
            debug!(id = %record.id, "ignoring folder that shadows the root");
            return;
        }
        if record.is_root() {
            self.root_id = Some(record.id.clone());
        }
        self.folders.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<&FolderRecord> {
        self.folders.get(id)
    }

    pub fn root(&self) -> Option<&FolderRecord> {
        self.root_id.as_deref().and_then(|id| self.folders.get(id))
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FolderRecord> {
        self.folders.values()
    }
}

impl FromIterator<FolderRecord> for FolderGraph {
    fn from_iter<I: IntoIterator<Item = FolderRecord>>(iter: I) -> Self {
        let mut graph = FolderGraph::new();
        for record in iter {
            graph.insert(record);
        }
        graph
    }
}

/// Result of listing the folder structure.
#[derive(Debug, Default)]
pub struct FolderFetch {
    pub graph: FolderGraph,
    /// Listing failures; when non-empty the graph may be incomplete.
    pub errors: Vec<DriveError>,
}

impl FolderFetch {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Find the root folder's id.
///
/// Drive only exposes the root through its children, so this looks at the
/// parent of any file directly under `root`. An empty root yields `None`.
pub async fn discover_root<S: RemoteStore + ?Sized>(
    store: &S,
) -> Result<Option<String>, DriveError> {
    let page = store.list_page(&FileQuery::RootFiles, None).await?;
    Ok(page
        .files
        .first()
        .and_then(|file| PARENT_POLICY.select(&file.parents))
        .map(str::to_string))
}

/// List the root and every owned folder into a graph.
///
/// Errors are logged and collected; whatever was listed is kept.
pub async fn fetch_folder_graph<S: RemoteStore + ?Sized>(store: &S) -> FolderFetch {
    let mut fetch = FolderFetch::default();

    match discover_root(store).await {
        Ok(Some(root_id)) => {
            debug!(%root_id, "discovered root");
            fetch.graph.insert(FolderRecord::root(root_id));
        }
        Ok(None) => warn!("no files directly under the root; the tree will be empty"),
        Err(e) => {
            error!(error = %e, "root discovery failed");
            fetch.errors.push(e);
        }
    }

    let listing = collect_all(store, &FileQuery::OwnedFolders).await;
    for folder in listing.files {
        match PARENT_POLICY.select(&folder.parents) {
            Some(parent_id) => {
                if folder.parents.len() > 1 {
                    debug!(id = %folder.id, parents = folder.parents.len(), "ignoring extra parents");
                }
                let parent_id = parent_id.to_string();
                fetch
                    .graph
                    .insert(FolderRecord::new(folder.id, parent_id, folder.name));
            }
            None => warn!(id = %folder.id, name = %folder.name, "folder has no parent; skipping"),
        }
    }
    if let Some(e) = listing.error {
        fetch.errors.push(e);
    }

    info!(folders = fetch.graph.len(), complete = fetch.is_complete(), "folder graph built");
    fetch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_listed_parent_policy() {
        let parents = vec!["p1".to_string(), "p2".to_string()];
        assert_eq!(PARENT_POLICY, ParentPolicy::FirstListed);
        assert_eq!(PARENT_POLICY.select(&parents), Some("p1"));
        assert_eq!(PARENT_POLICY.select(&[]), None);
    }

    #[test]
    fn test_root_record() {
        let root = FolderRecord::root("r");
        assert!(root.is_root());
        assert_eq!(root.name, ROOT_MARKER);
        assert!(!FolderRecord::new("a", "r", "A").is_root());
    }

    #[test]
    fn test_graph_tracks_root() {
        let graph: FolderGraph = vec![FolderRecord::root("r"), FolderRecord::new("a", "r", "A")]
            .into_iter()
            .collect();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.root().map(|r| r.id.as_str()), Some("r"));
        assert_eq!(graph.get("a").map(|a| a.name.as_str()), Some("A"));
    }

    #[test]
    fn test_root_is_not_replaced() {
        let mut graph = FolderGraph::new();
        graph.insert(FolderRecord::root("r"));
        graph.insert(FolderRecord::new("r", "x", "Imposter"));

        assert_eq!(graph.len(), 1);
        assert!(graph.get("r").unwrap().is_root());
    }
}
