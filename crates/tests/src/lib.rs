//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 录制文件 -> 调度器 -> 多消费者的 e2e 测试
//! - 取消与错误终态

#[cfg(test)]
mod contract_tests {
    use contracts::{DispatchConfig, DispatchPolicy};

    #[test]
    fn test_contracts_default_capacities() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(DispatchPolicy::BestEffort.default_queue_capacity(), 10_000);
        assert_eq!(DispatchPolicy::ByTime.default_queue_capacity(), 5_000);
        assert_eq!(DispatchConfig::default().policy, DispatchPolicy::ByTime);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeSet;
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta, Utc};
    use config_loader::ConfigLoader;
    use contracts::{ContractError, DispatchConfig, OpSource};
    use dispatcher::{create_dispatcher, DispatchError, DispatchOutcome, DispatcherBuilder};
    use ingestion::{JsonlOpSource, JsonlOpWriter, SyntheticConfig, SyntheticOpSource};
    use observability::ReplayMetricsAggregator;
    use tokio::task::JoinSet;
    use tokio_util::sync::CancellationToken;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    /// Write `count` synthetic operations `interval` apart
    async fn write_recording(path: &Path, count: u64, interval: Duration) {
        let mut source = SyntheticOpSource::new(SyntheticConfig {
            start: t0(),
            interval,
            total: count,
            payload_size: 16,
        });
        let mut writer = JsonlOpWriter::create(path).await.unwrap();
        while let Some(op) = source.next().await.unwrap() {
            writer.write(&op).await.unwrap();
        }
        assert_eq!(writer.finish().await.unwrap(), count);
    }

    /// End-to-end test: config file -> JSONL recording -> best-effort dispatcher -> consumers
    ///
    /// 验证完整的数据流：
    /// 1. ConfigLoader 解析配置并解析相对路径
    /// 2. JsonlOpSource 读取录制文件
    /// 3. 多个消费者共同消费 handoff 队列，无丢失、无重复
    #[tokio::test]
    async fn test_e2e_best_effort_from_config() {
        let dir = tempfile::tempdir().unwrap();
        write_recording(&dir.path().join("ops.jsonl"), 250, Duration::from_millis(5)).await;

        let config_path = dir.path().join("replay.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
[source]
path = "ops.jsonl"

[dispatch]
policy = "best_effort"
max_ops = 200
queue_capacity = 16

[workers]
count = 3
"#
        )
        .unwrap();
        drop(file);

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        let source = JsonlOpSource::open(&blueprint.source.path).await.unwrap();
        let handle = create_dispatcher(source, &blueprint.dispatch).await.unwrap();

        let mut workers = JoinSet::new();
        for _ in 0..blueprint.workers.count {
            let queue = handle.queue().clone();
            workers.spawn(async move {
                let mut seen = Vec::new();
                let mut metrics = ReplayMetricsAggregator::new();
                while let Some(op) = queue.recv().await {
                    metrics.update(op.payload_len(), 0.0);
                    seen.push(op.timestamp);
                }
                (seen, metrics)
            });
        }

        let report = handle.join().await.unwrap();
        assert_eq!(report.ops_dispatched, 200);
        assert_eq!(report.outcome, DispatchOutcome::Completed);

        let mut all = BTreeSet::new();
        let mut metrics = ReplayMetricsAggregator::new();
        while let Some(joined) = workers.join_next().await {
            let (seen, worker_metrics) = joined.unwrap();
            // each consumer observes its share in source order
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            for ts in seen {
                assert!(all.insert(ts), "operation delivered twice");
            }
            metrics.merge(&worker_metrics);
        }

        assert_eq!(all.len(), 200);
        assert_eq!(metrics.total_ops, 200);
        assert_eq!(all.first().copied(), Some(t0()));
        assert_eq!(
            all.last().copied(),
            Some(t0() + TimeDelta::milliseconds(199 * 5))
        );
    }

    /// 单消费者：投递顺序与录制顺序一致
    #[tokio::test]
    async fn test_e2e_by_time_preserves_order_and_pacing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.jsonl");
        write_recording(&path, 20, Duration::from_millis(100)).await;

        let source = JsonlOpSource::open(&path).await.unwrap();
        let started = tokio::time::Instant::now();
        let handle = create_dispatcher(source, &DispatchConfig::by_time(1_000, 10.0))
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(op) = handle.queue().recv().await {
            seen.push(op.timestamp);
        }
        let elapsed = started.elapsed();

        let expected: Vec<_> = (0..20)
            .map(|i| t0() + TimeDelta::milliseconds(i * 100))
            .collect();
        assert_eq!(seen, expected);

        // 19 gaps of 100ms at 10x
        assert!(elapsed >= Duration::from_millis(185), "too fast: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "too slow: {elapsed:?}");
        assert_eq!(handle.join().await.unwrap().ops_dispatched, 20);
    }

    #[tokio::test]
    async fn test_e2e_empty_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "\n\n").unwrap();

        for config in [DispatchConfig::best_effort(10), DispatchConfig::by_time(10, 1.0)] {
            let source = JsonlOpSource::open(&path).await.unwrap();
            let handle = create_dispatcher(source, &config).await.unwrap();
            assert!(handle.queue().recv().await.is_none());
            assert_eq!(handle.join().await.unwrap().ops_dispatched, 0);
        }
    }

    fn broken_recording(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("broken.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"ts\":\"2024-05-01T12:00:00Z\",\"payload\":{\"op\":\"find\"}}\n",
                "{\"ts\":\"2024-05-01T12:00:00.010Z\",\"payload\":{\"op\":\"insert\"}}\n",
                "{\"ts\":\"not a timestamp\"}\n",
            ),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_e2e_broken_recording_best_effort_fails_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonlOpSource::open(broken_recording(dir.path())).await.unwrap();

        let result = create_dispatcher(source, &DispatchConfig::best_effort(10)).await;
        assert!(matches!(
            result,
            Err(DispatchError::Source(ContractError::OpDecode { line: 3, .. }))
        ));
    }

    #[tokio::test]
    async fn test_e2e_broken_recording_by_time_reports_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonlOpSource::open(broken_recording(dir.path())).await.unwrap();

        let handle = create_dispatcher(source, &DispatchConfig::by_time(10, 100.0))
            .await
            .unwrap();

        let mut count = 0;
        while handle.queue().recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(matches!(
            handle.join().await,
            Err(DispatchError::Source(ContractError::OpDecode { line: 3, .. }))
        ));
    }

    #[tokio::test]
    async fn test_e2e_external_cancellation() {
        let source = SyntheticOpSource::every(Duration::from_secs(60), 10);
        let cancel = CancellationToken::new();
        let handle = DispatcherBuilder::new(DispatchConfig::by_time(10, 1.0))
            .with_cancellation(cancel.clone())
            .start(source)
            .await
            .unwrap();

        // the first op is immediate, the second is a minute away
        assert!(handle.queue().recv().await.is_some());
        cancel.cancel();

        let queue = handle.queue().clone();
        let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("cancellation should end the run promptly")
            .unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Cancelled);
        assert_eq!(report.ops_dispatched, 1);
        assert!(queue.recv().await.is_none());
    }
}
