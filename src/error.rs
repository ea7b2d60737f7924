//! Error types for the drive_mirror crate.

use thiserror::Error;

/// Errors that can occur while mirroring a Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Consent flow failed: {0}")]
    ConsentError(String),

    #[error("Folder {folder_id} points at unknown parent {parent_id}")]
    DanglingParent { folder_id: String, parent_id: String },

    #[error("Folder {folder_id} is part of a parent cycle")]
    FolderCycle { folder_id: String },
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
