//! The mirror itself: decides per file whether to skip, download or export,
//! and writes the result under the output root.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::checksum::md5_file;
use crate::error::{DriveError, Result};
use crate::export::{plan_for, ExportFormat, FilePlan, SkipReason};
use crate::graph::{fetch_folder_graph, FolderFetch};
use crate::materialize::{create_directories, folder_dir, MaterializeReport};
use crate::models::{format_elapsed, format_size, FileMetadata};
use crate::resolver::{resolve_paths, ResolvedFolder, ResolvedGraph};
use crate::store::{collect_all, FileQuery, RemoteStore};

/// Where and how to mirror.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub output_root: PathBuf,
    /// Draw the folder progress bar and per-chunk download lines.
    pub show_progress: bool,
}

impl SyncOptions {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Place a remote file name below `dir`.
///
/// Drive names may contain `/`. Separators nest the file below `dir`, and
/// root or drive prefixes are dropped so an absolute name stays inside. A
/// name with a `..` component, or with nothing left after stripping, gives
/// `None`.
pub fn target_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut target = dir.to_path_buf();
    let mut nested = false;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                nested = true;
            }
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => return None,
        }
    }

    nested.then_some(target)
}

/// Whether a local file needs fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    /// `replace` is set when a stale local file is present.
    Fetch { replace: bool },
}

/// Decide for a binary file: skip when the local copy's MD5 matches Drive's.
///
/// A remote file without a checksum is always fetched again.
pub fn decide_download(target: &Path, remote_md5: Option<&str>) -> io::Result<Decision> {
    if !target.exists() {
        return Ok(Decision::Fetch { replace: false });
    }

    if let Some(remote_md5) = remote_md5 {
        if md5_file(target)?.eq_ignore_ascii_case(remote_md5) {
            return Ok(Decision::Skip);
        }
    }

    Ok(Decision::Fetch { replace: true })
}

/// Decide for an exported document: skip unless Drive's copy is strictly
/// newer than the local file's modification time.
pub fn decide_export(target: &Path, remote_modified: Option<DateTime<Utc>>) -> io::Result<Decision> {
    let metadata = match fs::metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Decision::Fetch { replace: false })
        }
        Err(e) => return Err(e),
    };

    let local_modified = DateTime::<Utc>::from(metadata.modified()?);
    match remote_modified {
        Some(remote_modified) if remote_modified <= local_modified => Ok(Decision::Skip),
        _ => Ok(Decision::Fetch { replace: true }),
    }
}

/// What happened to one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Downloaded { bytes: u64 },
    Exported { bytes: u64 },
    Unchanged,
    Skipped(SkipReason),
}

/// Totals for a sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub folders: usize,
    pub downloaded: usize,
    pub exported: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_written: u64,
    /// Folders whose file listing failed part way.
    pub listing_errors: usize,
    /// Folders whose directory could not be created.
    pub missing_directories: usize,
    /// The folder listing reported errors, so some folders may be absent.
    pub incomplete_graph: bool,
}

impl SyncReport {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes_written += bytes;
            }
            FileOutcome::Exported { bytes } => {
                self.exported += 1;
                self.bytes_written += bytes;
            }
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Number of files fetched from Drive.
    pub fn transfers(&self) -> usize {
        self.downloaded + self.exported
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
            && self.listing_errors == 0
            && self.missing_directories == 0
            && !self.incomplete_graph
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} folders, {} downloaded, {} exported, {} unchanged, {} skipped, {} failed ({} written)",
            self.folders,
            self.downloaded,
            self.exported,
            self.unchanged,
            self.skipped,
            self.failed,
            format_size(self.bytes_written)
        )
    }
}

/// One mirror run: the store handle plus the resolved folder tree.
pub struct SyncSession<S> {
    store: S,
    options: SyncOptions,
    folders: ResolvedGraph,
    graph_errors: Vec<DriveError>,
}

impl<S: RemoteStore> SyncSession<S> {
    /// Build a session over an already resolved tree.
    pub fn new(store: S, options: SyncOptions, folders: ResolvedGraph) -> Self {
        Self {
            store,
            options,
            folders,
            graph_errors: Vec::new(),
        }
    }

    /// List the folder structure and resolve its paths.
    ///
    /// Listing errors leave a possibly partial tree (see [`Self::graph_errors`]);
    /// an inconsistent tree is an error.
    pub async fn connect(store: S, options: SyncOptions) -> Result<Self> {
        let fetch = fetch_folder_graph(&store).await;
        Self::from_fetch(store, options, fetch)
    }

    /// Resolve an already listed folder structure.
    pub fn from_fetch(store: S, options: SyncOptions, fetch: FolderFetch) -> Result<Self> {
        let folders = resolve_paths(&fetch.graph)?;

        Ok(Self {
            store,
            options,
            folders,
            graph_errors: fetch.errors,
        })
    }

    pub fn folders(&self) -> &ResolvedGraph {
        &self.folders
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Errors hit while listing folders.
    pub fn graph_errors(&self) -> &[DriveError] {
        &self.graph_errors
    }

    /// Create every folder's directory under the output root.
    pub fn materialize(&self) -> MaterializeReport {
        create_directories(&self.options.output_root, &self.folders)
    }

    /// Create directories, then sync every folder's files.
    pub async fn run(&self) -> SyncReport {
        let materialized = self.materialize();
        if !materialized.is_complete() {
            warn!(
                failed = materialized.failures.len(),
                "some directories could not be created"
            );
        }
        self.sync_files().await
    }

    /// Sync the files of every folder, one folder at a time.
    pub async fn sync_files(&self) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport {
            incomplete_graph: !self.graph_errors.is_empty(),
            ..SyncReport::default()
        };

        let bar = self.progress_bar();
        for folder in self.folders.iter() {
            bar.set_message(folder.path.clone());
            self.sync_folder(folder, &bar, &mut report).await;
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            elapsed = %format_elapsed(started.elapsed().as_secs_f64()),
            "{}",
            report
        );
        report
    }

    /// Sync the direct file children of one folder.
    pub async fn sync_folder(&self, folder: &ResolvedFolder, bar: &ProgressBar, report: &mut SyncReport) {
        report.folders += 1;

        let dir = folder_dir(&self.options.output_root, folder);
        if !dir.is_dir() {
            error!(path = %dir.display(), "directory missing; skipping folder");
            report.missing_directories += 1;
            return;
        }

        let listing = collect_all(&self.store, &FileQuery::ChildFiles(folder.id.clone())).await;
        if !listing.is_complete() {
            report.listing_errors += 1;
        }

        for file in &listing.files {
            match self.sync_file(&dir, file, bar).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(file = %file.name, folder = %folder.path, error = %e, "sync failed");
                    report.failed += 1;
                }
            }
        }
    }

    /// Bring one remote file into `dir`.
    pub async fn sync_file(&self, dir: &Path, file: &FileMetadata, bar: &ProgressBar) -> Result<FileOutcome> {
        let plan = plan_for(file.mime_type.as_deref());
        let local_name = match &plan {
            FilePlan::Export(format) => format.file_name(&file.name),
            FilePlan::Skip(reason) => {
                log_skip(dir, &file.name, reason);
                return Ok(FileOutcome::Skipped(reason.clone()));
            }
            FilePlan::Download => file.name.clone(),
        };

        let Some(target) = target_path(dir, &local_name) else {
            let reason = SkipReason::UnsafeName(file.name.clone());
            log_skip(dir, &file.name, &reason);
            return Ok(FileOutcome::Skipped(reason));
        };

        match plan {
            FilePlan::Export(format) => self.export(&target, file, format, bar).await,
            _ => self.download(&target, file, bar).await,
        }
    }

    async fn download(&self, target: &Path, file: &FileMetadata, bar: &ProgressBar) -> Result<FileOutcome> {
        let decision = {
            let target = target.to_path_buf();
            let remote_md5 = file.md5_checksum.clone();
            tokio::task::spawn_blocking(move || decide_download(&target, remote_md5.as_deref()))
                .await
                .map_err(io::Error::other)??
        };

        match decision {
            Decision::Skip => {
                debug!(path = %target.display(), "unchanged");
                Ok(FileOutcome::Unchanged)
            }
            Decision::Fetch { replace } => {
                if replace {
                    tokio::fs::remove_file(target).await?;
                }
                let show = self.options.show_progress;
                let report_chunk = |fraction: f32| chunk_progress(bar, show, target, fraction);
                let content = self.store.download(&file.id, &report_chunk).await?;
                let bytes = content.len() as u64;
                write_file(target, content).await?;
                Ok(FileOutcome::Downloaded { bytes })
            }
        }
    }

    async fn export(
        &self,
        target: &Path,
        file: &FileMetadata,
        format: ExportFormat,
        bar: &ProgressBar,
    ) -> Result<FileOutcome> {
        match decide_export(target, file.modified_time)? {
            Decision::Skip => {
                debug!(path = %target.display(), "export up to date");
                Ok(FileOutcome::Unchanged)
            }
            Decision::Fetch { .. } => {
                let show = self.options.show_progress;
                let report_chunk = |fraction: f32| chunk_progress(bar, show, target, fraction);
                let content = self
                    .store
                    .export(&file.id, format.mime_type, &report_chunk)
                    .await?;
                let bytes = content.len() as u64;
                write_file(target, content).await?;
                Ok(FileOutcome::Exported { bytes })
            }
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(self.folders.len() as u64);
        let style = ProgressStyle::with_template("[{bar:40}] {pos}/{len} folders {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        bar.set_style(style);
        bar
    }
}

fn log_skip(dir: &Path, name: &str, reason: &SkipReason) {
    match reason {
        SkipReason::Unsupported(_) | SkipReason::UnsafeName(_) => {
            warn!(dir = %dir.display(), file = name, "skipping: {}", reason)
        }
        _ => debug!(dir = %dir.display(), file = name, "skipping: {}", reason),
    }
}

/// Where a chunk progress line goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkOutput {
    Silent,
    /// Above the folder bar, so the bar is redrawn below it.
    Bar,
    /// The bar is not drawn (stderr is not a terminal).
    Stdout,
}

fn chunk_output(bar: &ProgressBar, show_progress: bool) -> ChunkOutput {
    if !show_progress {
        ChunkOutput::Silent
    } else if bar.is_hidden() {
        ChunkOutput::Stdout
    } else {
        ChunkOutput::Bar
    }
}

fn chunk_line(target: &Path, fraction: f32) -> String {
    format!("Download {} {}%", target.display(), (fraction * 100.0) as u32)
}

fn chunk_progress(bar: &ProgressBar, show_progress: bool, target: &Path, fraction: f32) {
    match chunk_output(bar, show_progress) {
        ChunkOutput::Silent => {}
        ChunkOutput::Bar => bar.println(chunk_line(target, fraction)),
        ChunkOutput::Stdout => println!("{}", chunk_line(target, fraction)),
    }
}

/// Write content to a temporary file in the target's directory, then
/// rename it into place. Directories for nested names are created.
async fn write_file(target: &Path, content: Vec<u8>) -> io::Result<()> {
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut partial = NamedTempFile::new_in(dir)?;
        partial.write_all(&content)?;
        partial.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}
