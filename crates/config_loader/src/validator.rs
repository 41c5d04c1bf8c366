//! 配置校验模块
//!
//! 校验规则：
//! - source.path 非空
//! - speedup 为有限正数
//! - queue_capacity >= 1 (若指定)
//! - workers.count >= 1

use contracts::{ContractError, ReplayBlueprint};

/// 校验 ReplayBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ReplayBlueprint) -> Result<(), ContractError> {
    validate_source(blueprint)?;
    validate_dispatch(blueprint)?;
    validate_workers(blueprint)?;
    Ok(())
}

/// 校验操作源路径
fn validate_source(blueprint: &ReplayBlueprint) -> Result<(), ContractError> {
    if blueprint.source.path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "source.path",
            "source path cannot be empty",
        ));
    }
    Ok(())
}

/// 校验调度配置
fn validate_dispatch(blueprint: &ReplayBlueprint) -> Result<(), ContractError> {
    let dispatch = &blueprint.dispatch;

    // best_effort 同样要求合法的 speedup
    if !dispatch.speedup.is_finite() || dispatch.speedup <= 0.0 {
        return Err(ContractError::config_validation(
            "dispatch.speedup",
            format!("speedup must be a finite value > 0, got {}", dispatch.speedup),
        ));
    }

    if dispatch.queue_capacity == Some(0) {
        return Err(ContractError::config_validation(
            "dispatch.queue_capacity",
            "queue_capacity must be >= 1",
        ));
    }

    Ok(())
}

/// 校验消费者数量
fn validate_workers(blueprint: &ReplayBlueprint) -> Result<(), ContractError> {
    if blueprint.workers.count == 0 {
        return Err(ContractError::config_validation(
            "workers.count",
            "worker count must be >= 1",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, DispatchConfig, SourceConfig, WorkersConfig};

    fn minimal_blueprint() -> ReplayBlueprint {
        ReplayBlueprint {
            version: ConfigVersion::V1,
            source: SourceConfig {
                path: "ops.jsonl".into(),
            },
            dispatch: DispatchConfig::by_time(1_000, 2.0),
            workers: WorkersConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_empty_source_path() {
        let mut bp = minimal_blueprint();
        bp.source.path = "".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("source.path"), "got: {err}");
    }

    #[test]
    fn test_non_positive_speedup() {
        for speedup in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let mut bp = minimal_blueprint();
            bp.dispatch.speedup = speedup;
            let err = validate(&bp).unwrap_err().to_string();
            assert!(err.contains("speedup must be"), "got: {err}");
        }
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = minimal_blueprint();
        bp.dispatch.queue_capacity = Some(0);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("queue_capacity"), "got: {err}");

        bp.dispatch.queue_capacity = Some(1);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut bp = minimal_blueprint();
        bp.workers.count = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("worker count"), "got: {err}");
    }

    #[test]
    fn test_zero_max_ops_is_allowed() {
        let mut bp = minimal_blueprint();
        bp.dispatch.max_ops = 0;
        assert!(validate(&bp).is_ok());
    }
}
