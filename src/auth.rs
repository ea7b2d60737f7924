//! Credential handling for Google APIs.
//!
//! Two kinds of credentials are supported:
//! - an authorized user token file (`token.json`) holding a refresh token,
//!   refreshed on demand and written back so later runs can reuse it;
//! - a service account JSON key, exchanged through a signed JWT.
//!
//! When neither is present, [`load_or_authorize`] runs the installed-app
//! consent flow against the OAuth client in `credentials.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{DriveError, Result};
use crate::installed_flow;
use crate::models::{AuthorizedUserToken, OAuthClientSecrets, ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested for mirroring: full read access plus metadata.
pub const DRIVE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.metadata",
];

/// Refresh tokens this long before they expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration. `None` never expires.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<SystemTime>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > SystemTime::now() + EXPIRY_BUFFER,
            None => true,
        }
    }
}

#[derive(Clone)]
enum CredentialSource {
    ServiceAccount(Arc<ServiceAccountCredentials>),
    AuthorizedUser {
        user: Arc<AuthorizedUserToken>,
        token_path: Option<PathBuf>,
    },
}

/// Authenticator for Google APIs.
#[derive(Clone)]
pub struct Authenticator {
    source: CredentialSource,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    /// Create a new authenticator from service account credentials.
    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            source: CredentialSource::ServiceAccount(Arc::new(credentials)),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an authenticator from an authorized user token file.
    ///
    /// Refreshed tokens are written back to the same file.
    pub fn from_token_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let user: AuthorizedUserToken = serde_json::from_str(&content)?;
        Ok(Self::authorized_user(user, Some(path.to_path_buf())))
    }

    /// Create an authenticator from an authorized user token.
    pub fn authorized_user(user: AuthorizedUserToken, token_path: Option<PathBuf>) -> Self {
        let cached = user.token.clone().map(|access_token| CachedToken {
            access_token,
            expires_at: user.expiry.map(SystemTime::from),
        });

        Self {
            source: CredentialSource::AuthorizedUser {
                user: Arc::new(user),
                token_path,
            },
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(cached)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = match &self.source {
            CredentialSource::ServiceAccount(credentials) => {
                self.refresh_service_account(credentials).await?
            }
            CredentialSource::AuthorizedUser { user, token_path } => {
                let token = self.refresh_authorized_user(user).await?;
                if let Some(path) = token_path {
                    persist_token(path, user, &token).await?;
                }
                token
            }
        };

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_service_account(
        &self,
        credentials: &ServiceAccountCredentials,
    ) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::AuthenticationError(e.to_string()))?
            .as_secs();
        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: DRIVE_SCOPES.join(" "),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        self.request_token(token_uri, &params).await
    }

    /// Refresh the access token using the stored refresh token.
    async fn refresh_authorized_user(&self, user: &AuthorizedUserToken) -> Result<CachedToken> {
        debug!(client_id = %user.client_id, "refreshing user access token");
        let token_uri = user.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", user.refresh_token.as_str()),
        ];

        self.request_token(token_uri, &params).await
    }

    async fn request_token(&self, token_uri: &str, params: &[(&str, &str)]) -> Result<CachedToken> {
        let response = self.client.post(token_uri).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: Some(SystemTime::now() + Duration::from_secs(token_response.expires_in)),
        })
    }
}

/// Write a refreshed token back to the token file.
async fn persist_token(path: &Path, user: &AuthorizedUserToken, token: &CachedToken) -> Result<()> {
    let mut updated = user.clone();
    updated.token = Some(token.access_token.clone());
    updated.expiry = token.expires_at.map(DateTime::<Utc>::from);
    save_token_file(path, &updated).await
}

/// Save an authorized user token in google-auth's `token.json` layout.
pub async fn save_token_file(path: &Path, user: &AuthorizedUserToken) -> Result<()> {
    let json = serde_json::to_string_pretty(user)?;
    tokio::fs::write(path, json).await?;
    debug!(path = %path.display(), "saved token file");
    Ok(())
}

/// Produce a usable authenticator, authorizing interactively if needed.
///
/// Order of preference:
/// 1. an existing token file;
/// 2. a service account key in the credentials file;
/// 3. the installed-app consent flow using the OAuth client in the
///    credentials file, whose result is saved as the token file.
pub async fn load_or_authorize(credentials_path: &Path, token_path: &Path) -> Result<Authenticator> {
    if token_path.exists() {
        info!(path = %token_path.display(), "using saved token");
        return Authenticator::from_token_file(token_path);
    }

    if !credentials_path.exists() {
        return Err(DriveError::MissingCredentials(format!(
            "neither {} nor {} exists",
            token_path.display(),
            credentials_path.display()
        )));
    }

    let content = fs::read_to_string(credentials_path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    if value.get("installed").is_some() {
        let secrets: OAuthClientSecrets = serde_json::from_value(value)?;
        let user = installed_flow::authorize(&secrets.installed, &DRIVE_SCOPES, token_path).await?;
        return Ok(Authenticator::authorized_user(
            user,
            Some(token_path.to_path_buf()),
        ));
    }

    info!(path = %credentials_path.display(), "using service account key");
    let credentials: ServiceAccountCredentials = serde_json::from_value(value)?;
    Ok(Authenticator::new(credentials))
}
