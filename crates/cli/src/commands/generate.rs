//! `generate` command implementation.

use anyhow::{Context, Result};
use chrono::Utc;
use ingestion::{JsonlOpWriter, OpSource, SyntheticConfig, SyntheticOpSource};
use std::time::Duration;
use tracing::info;

use crate::cli::GenerateArgs;

/// Execute the `generate` command
pub async fn run_generate(args: &GenerateArgs) -> Result<()> {
    let config = SyntheticConfig {
        start: args.start.unwrap_or_else(Utc::now),
        interval: Duration::from_millis(args.interval_ms),
        total: args.count,
        payload_size: args.payload_size,
    };
    info!(
        output = %args.output.display(),
        count = config.total,
        interval_ms = args.interval_ms,
        start = %config.start,
        "Generating synthetic recording"
    );

    let written = write_recording(SyntheticOpSource::new(config), args).await?;

    info!(written, "Recording written");
    println!("Wrote {} operations to {}", written, args.output.display());
    Ok(())
}

async fn write_recording(mut source: SyntheticOpSource, args: &GenerateArgs) -> Result<u64> {
    let mut writer = JsonlOpWriter::create(&args.output)
        .await
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    while let Some(op) = source.next().await.context("Failed to generate operation")? {
        writer
            .write(&op)
            .await
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    }

    writer
        .finish()
        .await
        .with_context(|| format!("Failed to flush {}", args.output.display()))
}
