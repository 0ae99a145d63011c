pub mod run;
pub mod task;

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use indicatif::HumanBytes;

use dfmirror_core::{Artifact, JobParams, ProgressContext, RunConfig, Summary, fmt_num};

/// Run one job and print its summary
pub fn execute(params: &JobParams, run_config: &RunConfig, progress: &ProgressContext) -> Result<()> {
    log::info!("Mirroring dataflow {}", params.dataflow_url);
    log::info!("  Bucket: {}", params.s3_bucket);
    log::info!("  Filename: {}", params.filename);
    log::info!("  Output: {}", run_config.output_dir.display());

    let summary = dfmirror_core::process(params, run_config, progress)?;
    print_summary(&summary);
    Ok(())
}

fn artifact_row(artifact: &Artifact, bucket: &str) -> String {
    format!(
        "{} ({}) → s3://{bucket}/{}",
        artifact.path.display(),
        HumanBytes(artifact.bytes),
        artifact.key
    )
}

/// Print a key-value summary table
fn print_summary(summary: &Summary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Job").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let rows = [
        ("Downloaded", HumanBytes(summary.download.bytes).to_string()),
        (
            "Content encoding",
            summary
                .download
                .content_encoding
                .clone()
                .unwrap_or_else(|| "identity".to_string()),
        ),
        (
            "Rows",
            format!(
                "{} ({} columns)",
                fmt_num(summary.rows),
                summary.columns
            ),
        ),
        ("Archive", artifact_row(&summary.archive, &summary.bucket)),
        ("Parquet", artifact_row(&summary.parquet, &summary.bucket)),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("\n{table}");
}
