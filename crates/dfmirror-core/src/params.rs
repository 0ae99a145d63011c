//! Job parameters resolved from prioritized sources
//!
//! Each source (command-line flags, environment, task payload) yields a
//! [`PartialParams`]. Layers are merged highest priority first and validated
//! once, so every missing or invalid value is reported in a single error.

use reqwest::Url;

/// Environment variable for the dataflow URL
pub const ENV_DATAFLOW_URL: &str = "DATAFLOW_URL";
/// Environment variable for the destination bucket
pub const ENV_S3_BUCKET: &str = "S3_BUCKET";
/// Environment variable for the output base filename
pub const ENV_FILENAME: &str = "FILENAME";

/// Validated, immutable parameters for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParams {
    pub dataflow_url: String,
    pub s3_bucket: String,
    pub filename: String,
}

/// One source of parameters; unset or blank values fall through to lower layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialParams {
    pub dataflow_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub filename: Option<String>,
}

impl PartialParams {
    /// Read `DATAFLOW_URL`, `S3_BUCKET` and `FILENAME` from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom lookup (tests, task payloads)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            dataflow_url: lookup(ENV_DATAFLOW_URL),
            s3_bucket: lookup(ENV_S3_BUCKET),
            filename: lookup(ENV_FILENAME),
        }
    }

    /// Fill unset fields of `self` from `lower`
    pub fn or(self, lower: PartialParams) -> Self {
        Self {
            dataflow_url: non_blank(self.dataflow_url).or(non_blank(lower.dataflow_url)),
            s3_bucket: non_blank(self.s3_bucket).or(non_blank(lower.s3_bucket)),
            filename: non_blank(self.filename).or(non_blank(lower.filename)),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Problems found while building [`JobParams`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required parameters with no value in any source
    Missing(Vec<&'static str>),
    /// Dataflow URL that is not an absolute http(s) URL
    InvalidUrl { url: String, reason: String },
    /// Several of the above at once
    Multiple(Vec<ConfigError>),
    /// Task input document could not be loaded
    TaskNotFound(String),
    /// Task input document is not valid JSON
    TaskMalformed(String),
    /// Task input has no `payload` object
    PayloadMissing,
    /// Task payload has no `parameters` object
    ParametersMissing,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(keys) => {
                write!(f, "missing required parameters: {}", keys.join(", "))
            }
            Self::InvalidUrl { url, reason } => write!(f, "invalid dataflow URL {url:?}: {reason}"),
            Self::Multiple(errors) => {
                let parts: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", parts.join("; "))
            }
            Self::TaskNotFound(msg) => write!(
                f,
                "current task not found ({msg}); run within a valid task context"
            ),
            Self::TaskMalformed(msg) => write!(f, "task input is not valid JSON: {msg}"),
            Self::PayloadMissing => write!(f, "payload is missing in the current task input"),
            Self::ParametersMissing => {
                write!(f, "parameters are missing in the current task input payload")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl JobParams {
    /// Merge `layers` (highest priority first) and validate the result.
    pub fn resolve(layers: impl IntoIterator<Item = PartialParams>) -> Result<Self, ConfigError> {
        let merged = layers
            .into_iter()
            .fold(PartialParams::default(), PartialParams::or);
        Self::try_from(merged)
    }
}

impl TryFrom<PartialParams> for JobParams {
    type Error = ConfigError;

    fn try_from(partial: PartialParams) -> Result<Self, Self::Error> {
        let partial = partial.or(PartialParams::default());
        let mut errors = Vec::new();

        let mut missing = Vec::new();
        if partial.dataflow_url.is_none() {
            missing.push(ENV_DATAFLOW_URL);
        }
        if partial.s3_bucket.is_none() {
            missing.push(ENV_S3_BUCKET);
        }
        if partial.filename.is_none() {
            missing.push(ENV_FILENAME);
        }
        if !missing.is_empty() {
            errors.push(ConfigError::Missing(missing));
        }

        if let Some(url) = &partial.dataflow_url {
            if let Err(e) = validate_url(url) {
                errors.push(e);
            }
        }

        match (errors.len(), partial) {
            (
                0,
                PartialParams {
                    dataflow_url: Some(dataflow_url),
                    s3_bucket: Some(s3_bucket),
                    filename: Some(filename),
                },
            ) => Ok(Self {
                dataflow_url,
                s3_bucket,
                filename,
            }),
            (1, _) => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// Remove single quotes left over from shell quoting of the dataflow URL
pub fn strip_quotes(url: &str) -> String {
    url.replace('\'', "")
}
