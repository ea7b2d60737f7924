//! Google Drive API client for the mirror's read-only operations.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, FileListResponse};
use crate::store::{FileQuery, Progress, RemoteStore};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Client for reading a user's Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    base_url: String,
}

impl DriveClient {
    /// Create a new DriveClient against the public Drive API.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_base_url(auth, DRIVE_API_BASE)
    }

    /// Create a DriveClient against another endpoint (a mock server, a proxy).
    pub fn with_base_url(auth: Authenticator, base_url: impl Into<String>) -> Self {
        Self {
            auth,
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a media request and collect the body chunk by chunk.
    async fn fetch_chunked(&self, request: RequestBuilder, progress: Progress<'_>) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let response = check_status(response).await?;

        let total = response.content_length().filter(|len| *len > 0);
        let mut content = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            content.extend_from_slice(&chunk);
            if let Some(total) = total {
                progress((content.len() as f64 / total as f64).min(1.0) as f32);
            }
        }

        if total.is_none() {
            progress(1.0);
        }

        Ok(content)
    }
}

/// Turn a non-success response into an `ApiError`, decoding Google's error body when present.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_page(
        &self,
        query: &FileQuery,
        page_token: Option<&str>,
    ) -> Result<FileListResponse> {
        let token = self.auth.get_access_token().await?;
        let q = query.to_query();

        let mut request = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(&token)
            .query(&[
                ("q", q.as_str()),
                ("includeItemsFromAllDrives", "false"),
                ("spaces", "drive"),
                ("fields", query.fields()),
            ]);

        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = check_status(request.send().await?).await?;
        let list_response: FileListResponse = response.json().await?;
        debug!(
            query = %q,
            files = list_response.files.len(),
            more = list_response.next_page_token.is_some(),
            "listed page"
        );

        Ok(list_response)
    }

    async fn download(&self, file_id: &str, progress: Progress<'_>) -> Result<Vec<u8>> {
        let token = self.auth.get_access_token().await?;
        let request = self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media")]);

        self.fetch_chunked(request, progress).await
    }

    async fn export(
        &self,
        file_id: &str,
        mime_type: &str,
        progress: Progress<'_>,
    ) -> Result<Vec<u8>> {
        let token = self.auth.get_access_token().await?;
        let request = self
            .http
            .get(format!("{}/files/{}/export", self.base_url, file_id))
            .bearer_auth(&token)
            .query(&[("mimeType", mime_type)]);

        self.fetch_chunked(request, progress).await
    }
}
