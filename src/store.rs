//! The remote store seam the mirror consumes.
//!
//! [`crate::client::DriveClient`] implements it over HTTP; tests use an
//! in-memory store.

use async_trait::async_trait;
use tracing::error;

use crate::error::{DriveError, Result};
use crate::models::{FileListResponse, FileMetadata, FOLDER_MIME_TYPE};

/// Per-chunk progress callback, called with the completed fraction in `0.0..=1.0`.
pub type Progress<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// The listings the mirror needs from Drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileQuery {
    /// Every folder owned by the caller.
    OwnedFolders,
    /// Non-folder items directly under the implicit `root` container.
    RootFiles,
    /// Non-folder items directly under the given folder.
    ChildFiles(String),
}

impl FileQuery {
    /// The Drive `q` expression for this listing.
    pub fn to_query(&self) -> String {
        match self {
            FileQuery::OwnedFolders => {
                format!("(mimeType = '{}') and ('me' in owners)", FOLDER_MIME_TYPE)
            }
            FileQuery::RootFiles => {
                format!("(not mimeType = '{}') and ('root' in parents)", FOLDER_MIME_TYPE)
            }
            FileQuery::ChildFiles(folder_id) => format!(
                "(not mimeType = '{}') and ('{}' in parents)",
                FOLDER_MIME_TYPE,
                folder_id.replace('\'', "\\'")
            ),
        }
    }

    /// The `fields` selector for this listing.
    pub fn fields(&self) -> &'static str {
        match self {
            FileQuery::OwnedFolders | FileQuery::RootFiles => {
                "nextPageToken, files(id, name, parents)"
            }
            FileQuery::ChildFiles(_) => {
                "nextPageToken, files(id, name, parents, mimeType, md5Checksum, modifiedTime)"
            }
        }
    }
}

/// Authenticated access to the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch one page of a listing.
    async fn list_page(
        &self,
        query: &FileQuery,
        page_token: Option<&str>,
    ) -> Result<FileListResponse>;

    /// Download a file's content in chunks.
    async fn download(&self, file_id: &str, progress: Progress<'_>) -> Result<Vec<u8>>;

    /// Export an editor document converted to `mime_type`.
    async fn export(
        &self,
        file_id: &str,
        mime_type: &str,
        progress: Progress<'_>,
    ) -> Result<Vec<u8>>;
}

/// Everything a paginated listing produced before it stopped.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<FileMetadata>,
    /// Set when a page failed; `files` then holds the pages read before it.
    pub error: Option<DriveError>,
}

impl Listing {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Follow `nextPageToken` until the listing is exhausted.
///
/// A failing page is logged and ends the listing; earlier pages are kept.
pub async fn collect_all<S: RemoteStore + ?Sized>(store: &S, query: &FileQuery) -> Listing {
    let mut listing = Listing::default();
    let mut page_token: Option<String> = None;

    loop {
        match store.list_page(query, page_token.as_deref()).await {
            Ok(page) => {
                listing.files.extend(page.files);
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            Err(e) => {
                error!(query = %query.to_query(), error = %e, "listing failed");
                listing.error = Some(e);
                break;
            }
        }
    }

    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_folders_query() {
        assert_eq!(
            FileQuery::OwnedFolders.to_query(),
            "(mimeType = 'application/vnd.google-apps.folder') and ('me' in owners)"
        );
    }

    #[test]
    fn test_child_files_query_escapes_quotes() {
        let query = FileQuery::ChildFiles("ab'c".to_string()).to_query();
        assert!(query.starts_with("(not mimeType = 'application/vnd.google-apps.folder')"));
        assert!(query.ends_with("('ab\\'c' in parents)"));
    }

    #[test]
    fn test_child_fields_include_sync_metadata() {
        let fields = FileQuery::ChildFiles("x".to_string()).fields();
        assert!(fields.contains("md5Checksum"));
        assert!(fields.contains("modifiedTime"));
        assert!(fields.contains("mimeType"));
        assert!(!FileQuery::OwnedFolders.fields().contains("md5Checksum"));
    }
}
