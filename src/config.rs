//! Run configuration.

use std::path::PathBuf;

/// Output directory used when `-o` is not given.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Environment variable naming the OAuth client or service account file.
pub const CREDENTIALS_ENV: &str = "DRIVE_MIRROR_CREDENTIALS";

/// Environment variable naming the saved user token file.
pub const TOKEN_ENV: &str = "DRIVE_MIRROR_TOKEN";

const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Paths a mirror run works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub output_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl Config {
    /// Build the configuration, reading credential locations from the environment.
    pub fn from_env(output_dir: PathBuf) -> Self {
        Self::from_lookup(output_dir, |key| std::env::var(key).ok())
    }

    /// Build the configuration with a custom variable lookup.
    pub fn from_lookup<F>(output_dir: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };

        Self {
            output_dir,
            credentials_path: path_or(CREDENTIALS_ENV, DEFAULT_CREDENTIALS_FILE),
            token_path: path_or(TOKEN_ENV, DEFAULT_TOKEN_FILE),
        }
    }
}
