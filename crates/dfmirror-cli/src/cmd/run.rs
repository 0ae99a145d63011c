//! `dfmirror run` - parameters from flags, falling back to the environment

use anyhow::Result;
use clap::Args;

use dfmirror_core::{
    ConfigError, JobParams, PartialParams, ProgressContext, RunConfig, strip_quotes,
};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// The dataflow URL to download [env: DATAFLOW_URL]
    #[arg(short = 'd', long)]
    pub dataflow_url: Option<String>,

    /// The S3 bucket to upload the data to [env: S3_BUCKET]
    #[arg(short = 's', long)]
    pub s3_bucket: Option<String>,

    /// Output filename, without extension [env: FILENAME]
    #[arg(short = 'f', long)]
    pub filename: Option<String>,
}

impl RunArgs {
    fn layer(&self) -> PartialParams {
        PartialParams {
            dataflow_url: self.dataflow_url.clone(),
            s3_bucket: self.s3_bucket.clone(),
            filename: self.filename.clone(),
        }
    }
}

/// Flags first, then environment; quotes are stripped from the URL either way
fn resolve_params(args: &RunArgs, env: PartialParams) -> Result<JobParams, ConfigError> {
    let mut merged = args.layer().or(env);
    merged.dataflow_url = merged.dataflow_url.map(|url| strip_quotes(&url));
    JobParams::try_from(merged)
}

pub fn run(args: RunArgs, run_config: &RunConfig, progress: &ProgressContext) -> Result<()> {
    let params = resolve_params(&args, PartialParams::from_env())?;
    super::execute(&params, run_config, progress)
}
