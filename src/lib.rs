//! drive_mirror - Mirror a Google Drive into a local directory tree.
//!
//! This library provides functionality to:
//! - List the folders a user owns and rebuild their paths from Drive's
//!   parent pointers
//! - Create the matching local directories
//! - Download binary files and export Google editor documents, skipping
//!   anything already present and unchanged
//!
//! # Example
//!
//! ```no_run
//! use drive_mirror::{Authenticator, DriveClient, SyncOptions, SyncSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_token_file("token.json")?;
//!     let client = DriveClient::new(auth);
//!
//!     let session = SyncSession::connect(client, SyncOptions::new("./output")).await?;
//!     let report = session.run().await;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod installed_flow;
pub mod materialize;
pub mod models;
pub mod resolver;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::DriveClient;
pub use config::Config;
pub use error::{DriveError, Result};
pub use graph::{FolderGraph, FolderRecord};
pub use models::FileMetadata;
pub use resolver::{resolve_paths, ResolvedFolder, ResolvedGraph};
pub use store::{FileQuery, RemoteStore};
pub use sync::{SyncOptions, SyncReport, SyncSession};
