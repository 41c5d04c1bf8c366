//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ReplayBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    source: SourceInfo,
    dispatch: DispatchInfo,
    workers: usize,
}

#[derive(Serialize)]
struct SourceInfo {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

#[derive(Serialize)]
struct DispatchInfo {
    policy: String,
    max_ops: usize,
    speedup: f64,
    queue_capacity: usize,
    queue_capacity_is_default: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &ReplayBlueprint) -> ConfigInfo {
    let metadata = std::fs::metadata(&blueprint.source.path).ok();
    let dispatch = &blueprint.dispatch;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        source: SourceInfo {
            path: blueprint.source.path.display().to_string(),
            exists: metadata.is_some(),
            size_bytes: metadata.map(|m| m.len()),
        },
        dispatch: DispatchInfo {
            policy: dispatch.policy.to_string(),
            max_ops: dispatch.max_ops,
            speedup: dispatch.speedup,
            queue_capacity: dispatch.effective_queue_capacity(),
            queue_capacity_is_default: dispatch.queue_capacity.is_none(),
        },
        workers: blueprint.workers.count,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   Replay Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Source");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Path: {}", info.source.path);
    match info.source.size_bytes {
        Some(size) => println!("   └─ Size: {} bytes", size),
        None => println!("   └─ Size: (missing)"),
    }

    let dispatch = &info.dispatch;
    println!("\nDispatch");
    println!("   ├─ Policy: {}", dispatch.policy);
    println!("   ├─ Max ops: {}", dispatch.max_ops);
    if dispatch.policy == "by_time" {
        println!("   ├─ Speedup: {}x", dispatch.speedup);
    }
    let default_note = if dispatch.queue_capacity_is_default {
        " (default)"
    } else {
        ""
    };
    println!("   └─ Queue capacity: {}{}", dispatch.queue_capacity, default_note);

    println!("\nWorkers");
    println!("   └─ Consumers: {}", info.workers);

    println!();
}
