//! Parameters supplied by a task-orchestration context
//!
//! The orchestrator hands the job its task input as a JSON document shaped like
//! `{"payload": {"parameters": {"DATAFLOW_URL": .., "S3_BUCKET": .., "FILENAME": ..}}}`.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::params::{ConfigError, JobParams, PartialParams};

/// Environment variable pointing at the task input document
pub const ENV_TASK_INPUT: &str = "TASK_INPUT_PATH";

/// Task input document of the current task
#[derive(Debug, Clone)]
pub struct TaskInput {
    input: Value,
}

impl TaskInput {
    /// Load the task input from a file, or from stdin when `path` is `-`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path == Path::new("-") {
            return Self::from_reader(std::io::stdin().lock());
        }
        let file = std::fs::File::open(path)
            .map_err(|e| ConfigError::TaskNotFound(format!("{}: {e}", path.display())))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let input = serde_json::from_reader(reader)
            .map_err(|e| ConfigError::TaskMalformed(e.to_string()))?;
        Ok(Self { input })
    }

    pub fn from_value(input: Value) -> Self {
        Self { input }
    }

    /// Extract and validate `payload.parameters`.
    ///
    /// Non-string and blank values count as missing.
    pub fn job_params(&self) -> Result<JobParams, ConfigError> {
        let payload = self
            .input
            .get("payload")
            .filter(|v| !v.is_null())
            .ok_or(ConfigError::PayloadMissing)?;
        let parameters = payload
            .get("parameters")
            .filter(|v| v.is_object())
            .ok_or(ConfigError::ParametersMissing)?;

        let partial = PartialParams::from_lookup(|key| {
            parameters
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        JobParams::try_from(partial)
    }
}
