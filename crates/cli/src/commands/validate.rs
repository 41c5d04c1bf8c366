//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchPolicy, ReplayBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_path: String,
    policy: String,
    max_ops: usize,
    speedup: f64,
    queue_capacity: usize,
    workers: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    source_path: blueprint.source.path.display().to_string(),
                    policy: blueprint.dispatch.policy.to_string(),
                    max_ops: blueprint.dispatch.max_ops,
                    speedup: blueprint.dispatch.speedup,
                    queue_capacity: blueprint.dispatch.effective_queue_capacity(),
                    workers: blueprint.workers.count,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ReplayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let dispatch = &blueprint.dispatch;

    if !blueprint.source.path.exists() {
        warnings.push(format!(
            "Recording not found: {} - run will fail",
            blueprint.source.path.display()
        ));
    }

    if dispatch.max_ops == 0 {
        warnings.push("dispatch.max_ops is 0 - replay will be empty".to_string());
    }

    if dispatch.policy == DispatchPolicy::BestEffort && dispatch.speedup != 1.0 {
        warnings.push("dispatch.speedup is ignored by the best_effort policy".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Source: {}", summary.source_path);
            println!("  Policy: {}", summary.policy);
            println!("  Max ops: {}", summary.max_ops);
            println!("  Speedup: {}", summary.speedup);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  Workers: {}", summary.workers);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
