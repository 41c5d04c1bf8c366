//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ReplayBlueprint;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{ReplayConfig, ReplayPipeline};

/// Execute the `run` command
pub async fn run_replay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after applying CLI overrides")?;

    info!(
        source = %blueprint.source.path.display(),
        policy = %blueprint.dispatch.policy,
        max_ops = blueprint.dispatch.max_ops,
        speedup = blueprint.dispatch.speedup,
        queue_capacity = blueprint.dispatch.effective_queue_capacity(),
        workers = blueprint.workers.count,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let replay_config = ReplayConfig {
        blueprint,
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
    };

    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_shutdown(cancel.clone()));

    info!("Starting replay...");
    let result = ReplayPipeline::new(replay_config).run(cancel).await;
    signal_task.abort();

    let stats = result.context("Replay failed")?;
    info!(
        outcome = stats.outcome.as_str(),
        ops = stats.ops_received(),
        duration_secs = stats.duration.as_secs_f64(),
        ops_per_sec = format!("{:.2}", stats.ops_per_sec()),
        "Replay completed"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(blueprint: &mut ReplayBlueprint, args: &RunArgs) {
    if let Some(ref source) = args.source {
        info!(source = %source.display(), "Overriding recording path from CLI");
        blueprint.source.path = source.clone();
    }
    if let Some(policy) = args.policy {
        blueprint.dispatch.policy = policy.into();
    }
    if let Some(speedup) = args.speedup {
        blueprint.dispatch.speedup = speedup;
    }
    if let Some(max_ops) = args.max_ops {
        blueprint.dispatch.max_ops = max_ops;
    }
    if let Some(capacity) = args.queue_capacity {
        blueprint.dispatch.queue_capacity = Some(capacity);
    }
    if let Some(workers) = args.workers {
        blueprint.workers.count = workers;
    }
}

/// Cancel the replay on Ctrl+C or SIGTERM
async fn cancel_on_shutdown(cancel: CancellationToken) {
    shutdown_signal().await;
    warn!("Received shutdown signal, cancelling replay...");
    cancel.cancel();
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ReplayBlueprint) {
    let dispatch = &blueprint.dispatch;

    println!("\n=== Configuration Summary ===\n");
    println!("Source: {}", blueprint.source.path.display());
    println!("\nDispatch:");
    println!("  Policy: {}", dispatch.policy);
    println!("  Max ops: {}", dispatch.max_ops);
    println!("  Speedup: {}", dispatch.speedup);
    println!("  Queue capacity: {}", dispatch.effective_queue_capacity());
    println!("\nWorkers: {}", blueprint.workers.count);
    println!();
}
