//! drive_mirror CLI - Mirror a Google Drive into a local directory.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drive_mirror::auth::load_or_authorize;
use drive_mirror::config::{Config, DEFAULT_OUTPUT_DIR};
use drive_mirror::graph::fetch_folder_graph;
use drive_mirror::models::format_elapsed;
use drive_mirror::{DriveClient, SyncOptions, SyncSession};

/// Download every file in your Google Drive into a local directory tree.
///
/// Credentials are read from token.json (or DRIVE_MIRROR_TOKEN) and
/// credentials.json (or DRIVE_MIRROR_CREDENTIALS).
#[derive(Parser)]
#[command(name = "drive_mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory the drive is mirrored into.
    #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    println!("Validating command");
    let cli = Cli::parse();
    let config = Config::from_env(cli.output);
    let started = Instant::now();

    println!("Connecting to drive service");
    let auth = load_or_authorize(&config.credentials_path, &config.token_path)
        .await
        .with_context(|| {
            format!(
                "Failed to authorize with {:?} / {:?}",
                config.token_path, config.credentials_path
            )
        })?;
    let client = DriveClient::new(auth);

    println!("Getting drive structure");
    let fetch = fetch_folder_graph(&client).await;
    if !fetch.is_complete() {
        eprintln!(
            "Warning: {} listing error(s); the folder tree may be incomplete",
            fetch.errors.len()
        );
    }

    println!("Analysing drive structure");
    let options = SyncOptions::new(&config.output_dir).with_progress(true);
    let session = SyncSession::from_fetch(client, options, fetch)
        .context("Drive folder structure is inconsistent")?;

    println!("Creating folders in output directory");
    let materialized = session.materialize();
    for (path, error) in &materialized.failures {
        eprintln!("  Error: could not create {:?}: {}", path, error);
    }

    println!("Downloading files");
    let report = session.sync_files().await;

    println!("Done in {}.", format_elapsed(started.elapsed().as_secs_f64()));
    println!("{}", report);
    if !report.is_clean() {
        eprintln!("Some files could not be mirrored; run again to retry them.");
    }

    Ok(())
}
