//! HTTP streaming download with stall timeout.
//!
//! Uses async reqwest internally with tokio::time::timeout around connect and
//! every body chunk, but presents a sync interface so the rest of the pipeline
//! stays strictly sequential.

use std::io;
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use indicatif::ProgressBar;
use tokio::io::AsyncWriteExt;

use crate::progress::upgrade_to_bar;

/// Connect and per-read timeout (30 seconds with no progress = failure)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for stream operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// No response or no data within the timeout
    Timeout(Duration),
    /// Local I/O error while writing the payload
    Io(io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout(d) => write!(f, "timed out after {}s", d.as_secs()),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Statistics from a completed download
#[derive(Debug, Clone, Default)]
pub struct DownloadStats {
    pub bytes: u64,
    /// `Content-Encoding` still present on the response after client decoding
    pub content_encoding: Option<String>,
    pub elapsed: Duration,
}

/// Shared tokio runtime for HTTP and object store operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Build an HTTP client with the given connect timeout.
///
/// gzip, brotli and deflate bodies are decoded transparently; reqwest drops the
/// `Content-Encoding` header when it does so.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, StreamError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .user_agent(concat!("dfmirror/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| StreamError::from_reqwest(&e))
}

/// HTTP GET → stream body chunks → `dest` (truncated first).
///
/// Blocks the calling thread until the whole body is on disk.
pub fn download(
    url: &str,
    dest: &Path,
    timeout: Duration,
    pb: &ProgressBar,
) -> Result<DownloadStats, StreamError> {
    SHARED_RUNTIME.block_on(download_async(url, dest, timeout, pb))
}

async fn download_async(
    url: &str,
    dest: &Path,
    timeout: Duration,
    pb: &ProgressBar,
) -> Result<DownloadStats, StreamError> {
    let start = Instant::now();
    let client = http_client(timeout)?;

    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| StreamError::Timeout(timeout))?
        .and_then(|r| r.error_for_status())
        .map_err(|e| StreamError::from_reqwest(&e))?;

    let content_encoding = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(enc) = &content_encoding {
        log::warn!("Content encoding: {enc} (not decoded by client, written as received)");
    }

    if let Some(total) = response.content_length() {
        upgrade_to_bar(pb, total);
    }
    pb.set_message("downloading...");

    let mut file = tokio::fs::File::create(dest).await?;
    let mut body = response.bytes_stream();
    let mut bytes = 0u64;

    loop {
        let next = tokio::time::timeout(timeout, body.next())
            .await
            .map_err(|_| StreamError::Timeout(timeout))?;
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| StreamError::from_reqwest(&e))?;
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
        pb.set_position(bytes);
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok(DownloadStats {
        bytes,
        content_encoding,
        elapsed: start.elapsed(),
    })
}
