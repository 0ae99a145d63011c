//! `dfmirror task` - parameters from the orchestrator's task input

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use dfmirror_core::{ConfigError, ENV_TASK_INPUT, JobParams, ProgressContext, RunConfig, TaskInput};

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Task input JSON document, `-` for stdin [env: TASK_INPUT_PATH]
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

fn task_params(input: Option<PathBuf>) -> Result<JobParams, ConfigError> {
    let path = input
        .or_else(|| std::env::var_os(ENV_TASK_INPUT).map(PathBuf::from))
        .ok_or_else(|| {
            ConfigError::TaskNotFound(format!("no --input given and {ENV_TASK_INPUT} not set"))
        })?;
    TaskInput::load(&path)?.job_params()
}

pub fn run(args: TaskArgs, run_config: &RunConfig, progress: &ProgressContext) -> Result<()> {
    let params = task_params(args.input)?;
    super::execute(&params, run_config, progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_parameters_from_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(
            &path,
            r#"{"payload":{"parameters":{"DATAFLOW_URL":"https://example.org/x","S3_BUCKET":"b","FILENAME":"ds1"}}}"#,
        )
        .unwrap();

        let params = task_params(Some(path)).unwrap();
        assert_eq!(params.filename, "ds1");
    }

    #[test]
    fn parameters_object_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(&path, r#"{"payload":{}}"#).unwrap();

        assert_eq!(
            task_params(Some(path)).unwrap_err(),
            ConfigError::ParametersMissing
        );
    }

    #[test]
    fn missing_file_is_task_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = task_params(Some(dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::TaskNotFound(_)));
    }
}
