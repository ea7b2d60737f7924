//! In-memory Drive used by the sync tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drive_mirror::checksum::md5_bytes;
use drive_mirror::error::{DriveError, Result};
use drive_mirror::models::{FileListResponse, FileMetadata, FOLDER_MIME_TYPE};
use drive_mirror::store::{FileQuery, Progress, RemoteStore};

struct RemoteFile {
    metadata: FileMetadata,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    root_id: Option<String>,
    folders: Vec<FileMetadata>,
    files: Vec<RemoteFile>,
    failing_downloads: HashSet<String>,
    failing_listings: HashSet<String>,
    /// Fail owned-folder listing pages from this page index on.
    folder_listing_fails_at: Option<usize>,
    downloads: Vec<String>,
    exports: Vec<(String, String)>,
}

/// A fake remote store with call recording.
pub struct FakeDrive {
    state: Mutex<State>,
    page_size: usize,
}

fn api_error(message: &str) -> DriveError {
    DriveError::ApiError {
        status: 500,
        message: message.to_string(),
    }
}

impl FakeDrive {
    pub fn new(root_id: &str) -> Self {
        Self {
            state: Mutex::new(State {
                root_id: Some(root_id.to_string()),
                ..State::default()
            }),
            page_size: 2,
        }
    }

    pub fn without_root() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 2,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn folder(self, id: &str, parents: &[&str], name: &str) -> Self {
        self.state.lock().unwrap().folders.push(FileMetadata {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            md5_checksum: None,
            modified_time: None,
            parents: parents.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// A binary file whose checksum matches its content.
    pub fn file(self, folder_id: &str, id: &str, name: &str, content: &[u8]) -> Self {
        self.state.lock().unwrap().files.push(RemoteFile {
            metadata: FileMetadata {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: Some("text/plain".to_string()),
                md5_checksum: Some(md5_bytes(content)),
                modified_time: Some(Utc::now()),
                parents: vec![folder_id.to_string()],
            },
            content: content.to_vec(),
        });
        self
    }

    /// An editor document; `exported` is what any export returns.
    pub fn document(
        self,
        folder_id: &str,
        id: &str,
        name: &str,
        mime_type: &str,
        modified: DateTime<Utc>,
        exported: &[u8],
    ) -> Self {
        self.state.lock().unwrap().files.push(RemoteFile {
            metadata: FileMetadata {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: Some(mime_type.to_string()),
                md5_checksum: None,
                modified_time: Some(modified),
                parents: vec![folder_id.to_string()],
                },
            content: exported.to_vec(),
        });
        self
    }

    pub fn fail_download(self, id: &str) -> Self {
        self.state.lock().unwrap().failing_downloads.insert(id.to_string());
        self
    }

    pub fn fail_listing(self, folder_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_listings
            .insert(folder_id.to_string());
        self
    }

    pub fn fail_folder_listing_at_page(self, page: usize) -> Self {
        self.state.lock().unwrap().folder_listing_fails_at = Some(page);
        self
    }

    pub fn downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn exports(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().exports.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.downloads.clear();
        state.exports.clear();
    }

    fn page(&self, items: Vec<FileMetadata>, page_token: Option<&str>) -> FileListResponse {
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        let next_page_token = if end < items.len() {
            Some(end.to_string())
        } else {
            None
        };
        FileListResponse {
            files: items[start..end].to_vec(),
            next_page_token,
        }
    }
}

#[async_trait]
impl RemoteStore for FakeDrive {
    async fn list_page(
        &self,
        query: &FileQuery,
        page_token: Option<&str>,
    ) -> Result<FileListResponse> {
        let state = self.state.lock().unwrap();
        let children_of = |parent: &str| -> Vec<FileMetadata> {
            state
                .files
                .iter()
                .filter(|f| f.metadata.parents.iter().any(|p| p == parent))
                .map(|f| f.metadata.clone())
                .collect()
        };

        match query {
            FileQuery::RootFiles => {
                let items = match &state.root_id {
                    Some(root_id) => children_of(root_id),
                    None => Vec::new(),
                };
                Ok(self.page(items, page_token))
            }
            FileQuery::OwnedFolders => {
                let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
                if let Some(fail_at) = state.folder_listing_fails_at {
                    if start / self.page_size >= fail_at {
                        return Err(api_error("folder listing failed"));
                    }
                }
                Ok(self.page(state.folders.clone(), page_token))
            }
            FileQuery::ChildFiles(folder_id) => {
                if state.failing_listings.contains(folder_id) {
                    return Err(api_error("file listing failed"));
                }
                Ok(self.page(children_of(folder_id), page_token))
            }
        }
    }

    async fn download(&self, file_id: &str, progress: Progress<'_>) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.downloads.push(file_id.to_string());
        if state.failing_downloads.contains(file_id) {
            return Err(api_error("download failed"));
        }
        let content = state
            .files
            .iter()
            .find(|f| f.metadata.id == file_id)
            .map(|f| f.content.clone())
            .ok_or_else(|| DriveError::ApiError {
                status: 404,
                message: format!("File not found: {}", file_id),
            })?;
        progress(0.5);
        progress(1.0);
        Ok(content)
    }

    async fn export(
        &self,
        file_id: &str,
        mime_type: &str,
        progress: Progress<'_>,
    ) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state
            .exports
            .push((file_id.to_string(), mime_type.to_string()));
        let content = state
            .files
            .iter()
            .find(|f| f.metadata.id == file_id)
            .map(|f| f.content.clone())
            .ok_or_else(|| DriveError::ApiError {
                status: 404,
                message: format!("File not found: {}", file_id),
            })?;
        progress(1.0);
        Ok(content)
    }
}
