//! Dispatcher - picks a delivery policy from configuration and starts it

use contracts::{DispatchConfig, DispatchPolicy, OpSource};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::best_effort::BestEffortDispatcher;
use crate::error::DispatchError;
use crate::handle::DispatchHandle;
use crate::paced::TimePacedDispatcher;

/// Builder for starting a dispatch run from a [`DispatchConfig`]
pub struct DispatcherBuilder {
    config: DispatchConfig,
    cancel: CancellationToken,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe an external cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start dispatching from `source`
    ///
    /// Best-effort runs preload before this returns; time-paced runs return
    /// as soon as the task is spawned.
    #[instrument(
        name = "dispatcher_builder_start",
        skip(self, source),
        fields(policy = %self.config.policy)
    )]
    pub async fn start<S>(self, source: S) -> Result<DispatchHandle, DispatchError>
    where
        S: OpSource + 'static,
    {
        let max_ops = u64::try_from(self.config.max_ops).unwrap_or(u64::MAX);
        let queue_capacity = self.config.effective_queue_capacity();
        info!(max_ops, queue_capacity, "Starting dispatcher");

        match self.config.policy {
            DispatchPolicy::BestEffort => {
                BestEffortDispatcher::new(max_ops)
                    .with_queue_capacity(queue_capacity)
                    .with_cancellation(self.cancel)
                    .start(source)
                    .await
            }
            DispatchPolicy::ByTime => TimePacedDispatcher::new(max_ops, self.config.speedup)
                .with_queue_capacity(queue_capacity)
                .with_cancellation(self.cancel)
                .start(source),
        }
    }
}

/// Convenience function to start a dispatcher from configuration
#[instrument(name = "dispatcher_create", skip(source, config))]
pub async fn create_dispatcher<S>(
    source: S,
    config: &DispatchConfig,
) -> Result<DispatchHandle, DispatchError>
where
    S: OpSource + 'static,
{
    DispatcherBuilder::new(config.clone()).start(source).await
}
