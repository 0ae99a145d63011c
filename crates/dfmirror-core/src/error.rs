//! Error type for a mirroring job

use crate::convert::ConvertError;
use crate::params::ConfigError;
use crate::stream::StreamError;

/// Fatal error from one pipeline stage.
///
/// Every variant aborts the job; the temporary workspace is removed on the way out.
#[derive(Debug)]
pub enum JobError {
    Config(ConfigError),
    /// Temporary workspace or output directory could not be prepared
    Workspace(std::io::Error),
    Transfer(StreamError),
    Archive(std::io::Error),
    Convert(ConvertError),
    /// Object store client could not be built
    Store(object_store::Error),
    /// Object keys whose upload reported failure
    Upload(Vec<String>),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration: {e}"),
            Self::Workspace(e) => write!(f, "workspace: {e}"),
            Self::Transfer(e) => write!(f, "download failed: {e}"),
            Self::Archive(e) => write!(f, "compression failed: {e}"),
            Self::Convert(e) => write!(f, "parquet conversion failed: {e}"),
            Self::Store(e) => write!(f, "object store: {e}"),
            Self::Upload(keys) => write!(f, "upload failed for {}", keys.join(", ")),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Workspace(e) | Self::Archive(e) => Some(e),
            Self::Transfer(e) => Some(e),
            Self::Convert(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Upload(_) => None,
        }
    }
}

impl From<ConfigError> for JobError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StreamError> for JobError {
    fn from(e: StreamError) -> Self {
        Self::Transfer(e)
    }
}

impl From<ConvertError> for JobError {
    fn from(e: ConvertError) -> Self {
        Self::Convert(e)
    }
}

impl JobError {
    /// HTTP status of a failed download, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Transfer(e) => e.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn http_status_from_transfer() {
        let err = JobError::from(StreamError::Http {
            status: Some(404),
            message: "Not Found".to_string(),
        });
        assert_eq!(err.http_status(), Some(404));
        assert_eq!(err.to_string(), "download failed: HTTP 404: Not Found");
    }

    #[test]
    fn http_status_none_for_other_stages() {
        let err = JobError::Archive(std::io::Error::new(ErrorKind::StorageFull, "disk full"));
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn display_upload_lists_keys() {
        let err = JobError::Upload(vec!["ds1.zip".to_string(), "ds1.parquet".to_string()]);
        assert_eq!(err.to_string(), "upload failed for ds1.zip, ds1.parquet");
    }

    #[test]
    fn display_config() {
        let err = JobError::from(ConfigError::Missing(vec!["S3_BUCKET"]));
        assert_eq!(
            err.to_string(),
            "configuration: missing required parameters: S3_BUCKET"
        );
    }
}
