//! Installed-app OAuth consent flow.
//!
//! yup-oauth2 runs the browser consent and the loopback redirect. Its token
//! storage is pointed at our `token.json`, so the result lands in the same
//! google-auth layout that [`crate::auth::Authenticator`] refreshes later.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::{debug, warn};
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::auth::save_token_file;
use crate::error::{DriveError, Result};
use crate::models::{AuthorizedUserToken, InstalledClient};

/// Run the consent flow and return the token it saved at `token_path`.
pub async fn authorize(
    client: &InstalledClient,
    scopes: &[&str],
    token_path: &Path,
) -> Result<AuthorizedUserToken> {
    let storage = TokenFileStorage::new(client, token_path);
    let auth = InstalledFlowAuthenticator::builder(
        application_secret(client),
        InstalledFlowReturnMethod::HTTPRedirect,
    )
    .with_storage(Box::new(storage))
    .build()
    .await?;

    auth.token(scopes)
        .await
        .map_err(|e| DriveError::ConsentError(e.to_string()))?;

    let content = tokio::fs::read_to_string(token_path).await.map_err(|e| {
        DriveError::ConsentError(format!(
            "consent finished but {} was not written: {}",
            token_path.display(),
            e
        ))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn application_secret(client: &InstalledClient) -> ApplicationSecret {
    ApplicationSecret {
        client_id: client.client_id.clone(),
        client_secret: client.client_secret.clone(),
        auth_uri: client.auth_uri.clone(),
        token_uri: client.token_uri.clone(),
        ..ApplicationSecret::default()
    }
}

/// Keeps yup-oauth2's tokens in a google-auth `token.json`.
pub struct TokenFileStorage {
    path: PathBuf,
    client_id: String,
    client_secret: String,
    token_uri: String,
}

impl TokenFileStorage {
    pub fn new(client: &InstalledClient, path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            token_uri: client.token_uri.clone(),
        }
    }

    fn to_user(&self, scopes: &[&str], token: TokenInfo) -> Option<AuthorizedUserToken> {
        Some(AuthorizedUserToken {
            token: token.access_token,
            refresh_token: token.refresh_token?,
            token_uri: Some(self.token_uri.clone()),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expiry: token
                .expires_at
                .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)),
        })
    }
}

fn to_token_info(user: AuthorizedUserToken) -> TokenInfo {
    TokenInfo {
        access_token: user.token,
        refresh_token: Some(user.refresh_token),
        expires_at: user
            .expiry
            .and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()),
        id_token: None,
    }
}

#[async_trait]
impl TokenStorage for TokenFileStorage {
    async fn set(&self, scopes: &[&str], token: TokenInfo) -> std::result::Result<(), TokenStorageError> {
        let user = self.to_user(scopes, token).ok_or_else(|| {
            TokenStorageError::Other("token response carried no refresh token".into())
        })?;
        save_token_file(&self.path, &user)
            .await
            .map_err(|e| TokenStorageError::Other(e.to_string().into()))?;
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no stored token");
                return None;
            }
        };

        match serde_json::from_str::<AuthorizedUserToken>(&content) {
            Ok(user) => Some(to_token_info(user)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable token file");
                None
            }
        }
    }
}
