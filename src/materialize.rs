//! Creates the local directory tree for resolved folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::resolver::{ResolvedFolder, ResolvedGraph};

/// Outcome of creating the directory tree.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Directories that exist after the pass, new or not.
    pub ready: usize,
    /// Directories that could not be created.
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Local directory for a folder under `output_root`.
pub fn folder_dir(output_root: &Path, folder: &ResolvedFolder) -> PathBuf {
    output_root.join(&folder.path)
}

/// Ensure `output_root/path` exists for every folder.
///
/// Existing directories are fine. A failure is recorded and the remaining
/// folders are still attempted.
pub fn create_directories(output_root: &Path, folders: &ResolvedGraph) -> MaterializeReport {
    let mut report = MaterializeReport::default();

    for folder in folders.iter() {
        let dir = folder_dir(output_root, folder);
        match fs::create_dir_all(&dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "directory ready");
                report.ready += 1;
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "failed to create directory");
                report.failures.push((dir, e));
            }
        }
    }

    report
}
