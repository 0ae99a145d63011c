//! Artifact upload to an object-storage bucket
//!
//! Uploads stream the local file through object_store's buffered writer, which
//! switches to a multipart upload once the file outgrows a single request.

use std::io;
use std::path::Path;
use std::sync::Arc;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use tokio::io::AsyncWriteExt;

use crate::stream::SHARED_RUNTIME;

/// Optional overrides for the S3 client; credentials always come from the environment
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...)
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

/// Uploads files into one bucket
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("bucket", &self.bucket)
            .field("store", &self.store.to_string())
            .finish()
    }
}

impl Publisher {
    /// S3 publisher using the standard AWS environment credential chain
    pub fn s3(bucket: &str, settings: &S3Settings) -> Result<Self, object_store::Error> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if settings.allow_http {
            builder = builder.with_allow_http(true);
        }
        Ok(Self::new(Arc::new(builder.build()?), bucket))
    }

    /// Publisher over an already configured store (in-memory, local, ...)
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload `file` under `object_name`, defaulting to the file's base name.
    ///
    /// Returns `true` if the object was written. Failures are logged and
    /// reported as `false`; deciding whether that is fatal is up to the caller.
    pub fn upload(&self, file: &Path, object_name: Option<&str>) -> bool {
        let key = match object_name {
            Some(name) => name.to_string(),
            None => match file.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    log::error!("Cannot derive object name from {}", file.display());
                    return false;
                }
            },
        };

        log::info!("Uploading {} to bucket {}...", file.display(), self.bucket);
        match SHARED_RUNTIME.block_on(self.put_file(file, &key)) {
            Ok(bytes) => {
                log::info!(
                    "File {} uploaded to bucket {} as {key} ({bytes} bytes)",
                    file.display(),
                    self.bucket
                );
                true
            }
            Err(e) => {
                log::error!(
                    "Upload of {} to bucket {} as {key} failed: {e}",
                    file.display(),
                    self.bucket
                );
                false
            }
        }
    }

    async fn put_file(&self, file: &Path, key: &str) -> io::Result<u64> {
        let location =
            ObjectPath::parse(key).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut input = tokio::fs::File::open(file).await?;

        let mut writer = BufWriter::new(Arc::clone(&self.store), location);
        match tokio::io::copy(&mut input, &mut writer).await {
            Ok(bytes) => {
                writer.shutdown().await?;
                Ok(bytes)
            }
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    log::debug!("Aborting upload of {key} failed: {abort_err}");
                }
                Err(e)
            }
        }
    }
}
