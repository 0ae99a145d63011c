//! Job orchestrator: fetch → compress → convert → upload

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::archive::{self, with_suffix};
use crate::convert;
use crate::error::JobError;
use crate::params::JobParams;
use crate::progress::ProgressContext;
use crate::publish::{Publisher, S3Settings};
use crate::stream::{self, DEFAULT_TIMEOUT, DownloadStats};

/// Runtime configuration for a job (everything that is not a job parameter)
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory receiving `{filename}.zip` and `{filename}.parquet`
    pub output_dir: PathBuf,
    /// Parent of the temporary workspace (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// Connect and per-read timeout for the download
    pub timeout: Duration,
    pub s3: S3Settings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            temp_dir: None,
            timeout: DEFAULT_TIMEOUT,
            s3: S3Settings::default(),
        }
    }
}

/// One produced artifact and its upload outcome
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub key: String,
    pub bytes: u64,
    pub uploaded: bool,
}

/// Job execution summary
#[derive(Debug)]
pub struct Summary {
    pub bucket: String,
    pub download: DownloadStats,
    pub archive: Artifact,
    pub parquet: Artifact,
    pub rows: usize,
    pub columns: usize,
    pub elapsed: Duration,
}

/// Run one job against S3, building the client from the environment.
pub fn process(
    params: &JobParams,
    config: &RunConfig,
    progress: &ProgressContext,
) -> Result<Summary, JobError> {
    let publisher = Publisher::s3(&params.s3_bucket, &config.s3).map_err(JobError::Store)?;
    process_with(params, config, &publisher, progress)
}

/// Run one job, uploading through `publisher`.
///
/// The temporary workspace is removed before this returns, on success and on
/// every error path. Both uploads are attempted; if either fails the job fails.
pub fn process_with(
    params: &JobParams,
    config: &RunConfig,
    publisher: &Publisher,
    progress: &ProgressContext,
) -> Result<Summary, JobError> {
    let start = Instant::now();

    let output_base = config.output_dir.join(&params.filename);
    if let Some(parent) = output_base.parent() {
        fs::create_dir_all(parent).map_err(JobError::Workspace)?;
    }
    remove_stale_artifacts(&output_base).map_err(JobError::Workspace)?;

    let workspace = create_workspace(config.temp_dir.as_deref()).map_err(JobError::Workspace)?;
    let raw = workspace.path().join(payload_name(&params.filename));
    log::debug!("Workspace: {}", workspace.path().display());

    // Fetch
    log::info!("Starting download of {}...", params.dataflow_url);
    let pb = progress.transfer_bar(&params.filename);
    let download = stream::download(&params.dataflow_url, &raw, config.timeout, &pb);
    pb.finish_and_clear();
    let download = download?;
    log::info!(
        "File downloaded to {} ({} bytes in {:.1}s)",
        raw.display(),
        download.bytes,
        download.elapsed.as_secs_f64()
    );

    // Compress
    log::info!("Compressing file...");
    let stage = progress.stage_line("compress");
    stage.set_message(raw.display().to_string());
    let zip_path = archive::compress_file(&raw, &output_base);
    stage.finish_and_clear();
    let zip_path = zip_path.map_err(JobError::Archive)?;
    log::info!("File compressed to {}", zip_path.display());

    // Convert
    log::info!("Converting CSV to Parquet...");
    let stage = progress.stage_line("convert");
    stage.set_message(raw.display().to_string());
    let converted = convert::convert_to_parquet(&raw, &output_base);
    stage.finish_and_clear();
    let converted = converted?;
    log::info!(
        "File converted to {} ({} rows, {} columns)",
        converted.path.display(),
        converted.rows,
        converted.columns
    );

    // Upload
    let archive = upload_artifact(publisher, zip_path, format!("{}.zip", params.filename))?;
    let parquet = upload_artifact(
        publisher,
        converted.path,
        format!("{}.parquet", params.filename),
    )?;

    if let Err(e) = workspace.close() {
        log::warn!("Failed to remove workspace: {e}");
    }

    let failed: Vec<String> = [&archive, &parquet]
        .iter()
        .filter(|a| !a.uploaded)
        .map(|a| a.key.clone())
        .collect();
    if !failed.is_empty() {
        return Err(JobError::Upload(failed));
    }

    Ok(Summary {
        bucket: publisher.bucket().to_string(),
        download,
        archive,
        parquet,
        rows: converted.rows,
        columns: converted.columns,
        elapsed: start.elapsed(),
    })
}

fn upload_artifact(
    publisher: &Publisher,
    path: PathBuf,
    key: String,
) -> Result<Artifact, JobError> {
    let bytes = fs::metadata(&path).map_err(JobError::Workspace)?.len();
    let uploaded = publisher.upload(&path, Some(&key));
    Ok(Artifact {
        path,
        key,
        bytes,
        uploaded,
    })
}

fn create_workspace(parent: Option<&Path>) -> io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("dfmirror-");
    match parent {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            builder.tempdir_in(dir)
        }
        None => builder.tempdir(),
    }
}

/// Name of the raw payload inside the workspace (also the archive entry name)
fn payload_name(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("payload");
    format!("{base}.csv")
}

/// Remove artifacts (and tmp leftovers) from a previous run with the same name
fn remove_stale_artifacts(output_base: &Path) -> io::Result<()> {
    for ext in ["zip", "parquet", "zip.tmp", "parquet.tmp"] {
        let path = with_suffix(output_base, ext);
        if path.exists() {
            log::warn!("Removing stale artifact: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
