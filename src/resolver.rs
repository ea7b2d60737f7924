//! Turns the parent-pointer folder graph into local relative paths.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{DriveError, Result};
use crate::graph::{FolderGraph, FolderRecord};

/// A folder with its resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    /// `/`-joined names from the root marker down to this folder.
    pub path: String,
}

/// Immutable set of resolved folders, ordered by path so parents precede children.
#[derive(Debug, Default, Clone)]
pub struct ResolvedGraph {
    folders: Vec<ResolvedFolder>,
    index: HashMap<String, usize>,
}

impl ResolvedGraph {
    fn from_folders(mut folders: Vec<ResolvedFolder>) -> Self {
        folders.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));
        let index = folders
            .iter()
            .enumerate()
            .map(|(i, folder)| (folder.id.clone(), i))
            .collect();
        Self { folders, index }
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedFolder> {
        self.index.get(id).map(|&i| &self.folders[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedFolder> {
        self.folders.iter()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Resolve every folder's path.
///
/// Root records are seeded with their own name. Each unresolved folder walks
/// up its parents until it meets an already resolved ancestor; every folder
/// on the walk is then resolved on the way back down, so each folder is
/// visited once overall.
///
/// A graph without a root resolves to nothing. A parent id missing from the
/// graph yields [`DriveError::DanglingParent`]; a walk that comes back to a
/// folder it already passed yields [`DriveError::FolderCycle`].
pub fn resolve_paths(graph: &FolderGraph) -> Result<ResolvedGraph> {
    if graph.root().is_none() {
        if !graph.is_empty() {
            warn!(unreachable = graph.len(), "no root folder; nothing to resolve");
        }
        return Ok(ResolvedGraph::default());
    }

    let mut paths: HashMap<&str, String> = graph
        .iter()
        .filter(|folder| folder.is_root())
        .map(|root| (root.id.as_str(), root.name.clone()))
        .collect();

    for folder in graph.iter() {
        if paths.contains_key(folder.id.as_str()) {
            continue;
        }

        let mut chain: Vec<&FolderRecord> = Vec::new();
        let mut on_walk: HashSet<&str> = HashSet::new();
        let mut current = folder;

        let base = loop {
            if let Some(path) = paths.get(current.id.as_str()) {
                break path.clone();
            }
            if !on_walk.insert(current.id.as_str()) {
                return Err(DriveError::FolderCycle {
                    folder_id: current.id.clone(),
                });
            }
            chain.push(current);
            current = graph
                .get(&current.parent_id)
                .ok_or_else(|| DriveError::DanglingParent {
                    folder_id: current.id.clone(),
                    parent_id: current.parent_id.clone(),
                })?;
        };

        let mut path = base;
        for record in chain.iter().rev() {
            path = format!("{}/{}", path, record.name);
            paths.insert(record.id.as_str(), path.clone());
        }
    }

    let folders: Vec<ResolvedFolder> = graph
        .iter()
        .filter_map(|folder| {
            paths.get(folder.id.as_str()).map(|path| ResolvedFolder {
                id: folder.id.clone(),
                parent_id: folder.parent_id.clone(),
                name: folder.name.clone(),
                path: path.clone(),
            })
        })
        .collect();

    debug!(folders = folders.len(), "resolved folder paths");
    Ok(ResolvedGraph::from_folders(folders))
}
