//! dfmirror - mirror a tabular dataflow to object storage
//!
//! Downloads a dataflow export, then uploads a ZIP copy and a Parquet
//! conversion of it to an S3 bucket.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "dfmirror")]
#[command(about = "Download a dataflow and upload a compressed and a parquet version to an S3 bucket")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./dfmirror.toml or ~/.config/dfmirror/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the produced .zip and .parquet files
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Connect and read timeout in seconds for the download
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Mirror a dataflow with parameters from flags or environment
    Run(cmd::run::RunArgs),
    /// Mirror a dataflow with parameters from a task input payload
    Task(cmd::task::TaskArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = dfmirror_core::ProgressContext::new();
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    dfmirror_core::init_logging(cli.debug, multi);

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Config file defaults, CLI overrides
    let mut run_config = config.run_config();
    if let Some(dir) = cli.output_dir {
        run_config.output_dir = dir;
    }
    if let Some(secs) = cli.timeout {
        run_config.timeout = Duration::from_secs(secs);
    }

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &run_config, &progress),
        Command::Task(args) => cmd::task::run(args, &run_config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Output directory".to_string(),
                run_config.output_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Temp directory".to_string(),
                run_config
                    .temp_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "system default".to_string()),
            ]);
            table.add_row(vec![
                "Timeout".to_string(),
                format!("{}s", run_config.timeout.as_secs()),
            ]);
            table.add_row(vec![
                "S3 region".to_string(),
                run_config
                    .s3
                    .region
                    .clone()
                    .unwrap_or_else(|| "from environment".to_string()),
            ]);
            table.add_row(vec![
                "S3 endpoint".to_string(),
                run_config
                    .s3
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "AWS default".to_string()),
            ]);

            println!("\n{table}");
            Ok(())
        }
    }
}
